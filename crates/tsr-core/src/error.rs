//! Fault taxonomy for connection and configuration operations.
//!
//! `ConnectionError` is `Clone` and `Serialize` so a fault raised inside a
//! transport notification can travel to listeners as part of an `error`
//! event payload.

use serde::Serialize;
use thiserror::Error;

/// Errors raised by a connection, either returned from a direct call or
/// delivered through the `error` event.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ConnectionError {
    /// The transport could not be opened, or a send/close was issued
    /// against a transport that is not in the required state.
    #[error("Transport fault: {0}")]
    Transport(String),

    /// The transport closed after the handshake was sent but before it was
    /// accepted. The endpoint never sends an explicit rejection, so this is
    /// the only way a denied handshake becomes visible.
    #[error("Access to the remote apps API was denied or the API key is invalid")]
    AuthDenied,

    /// `close()` was called before the transport ever opened.
    #[error("Cannot close a connection that is still connecting")]
    CloseWhileConnecting,

    /// The handshake payload was already handed to the transport.
    #[error("Authentication request already sent on this connection")]
    AuthAlreadySent,

    /// The connection is closed, failed, or closing.
    #[error("Connection closed")]
    Closed,

    /// An inbound frame did not match the wire envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// The connection driver has shut down.
    #[error("Connection driver stopped")]
    ChannelClosed,
}

impl ConnectionError {
    /// Returns true for faults caused by the caller rather than the peer.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::CloseWhileConnecting | Self::AuthAlreadySent)
    }
}

impl From<serde_json::Error> for ConnectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Result type for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors that can occur while building a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value exists but has the wrong shape.
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// The parsed TOML could not be converted into a nested mapping.
    #[error("Failed to convert config: {0}")]
    Convert(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_denied_display() {
        let display = ConnectionError::AuthDenied.to_string();
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_transport_display() {
        let error = ConnectionError::Transport("connection refused".to_string());
        let display = format!("{error}");
        assert!(display.contains("Transport fault"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_misuse_classification() {
        assert!(ConnectionError::CloseWhileConnecting.is_misuse());
        assert!(ConnectionError::AuthAlreadySent.is_misuse());
        assert!(!ConnectionError::Closed.is_misuse());
        assert!(!ConnectionError::AuthDenied.is_misuse());
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(ConnectionError::Protocol("bad".to_string())).unwrap();
        assert_eq!(json["kind"], "protocol");
        assert_eq!(json["detail"], "bad");

        let json = serde_json::to_value(ConnectionError::AuthDenied).unwrap();
        assert_eq!(json["kind"], "auth_denied");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let error: ConnectionError = json_error.into();
        assert!(matches!(error, ConnectionError::Encode(_)));
    }
}
