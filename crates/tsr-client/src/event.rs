//! Semantic events published by a connection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use tsr_core::ConnectionError;
use tsr_protocol::{events, Envelope};

use crate::transport::{CloseInfo, TransportNotification};

/// Payload of the `error` event: the raw notification that triggered the
/// fault and the typed fault itself.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub notification: TransportNotification,
    pub fault: ConnectionError,
}

/// Events delivered to listeners.
///
/// Each variant maps to one public event name; see [`ConnectionEvent::name`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ConnectionEvent {
    /// `connectionOpen`
    ConnectionOpen { observed_at: DateTime<Utc> },

    /// `connectionClosed`
    ConnectionClosed {
        info: CloseInfo,
        observed_at: DateTime<Utc>,
    },

    /// `error`
    Error(ErrorEvent),

    /// `incomingMessage`, for every inbound JSON object.
    IncomingMessage { message: Value },

    /// `ready`, carrying the accepted handshake response.
    Ready { message: Envelope },

    /// Per-type event (`on<Type>`), carrying the full message.
    Message { name: String, message: Envelope },
}

impl ConnectionEvent {
    /// Event name listeners subscribe to.
    pub fn name(&self) -> &str {
        match self {
            Self::ConnectionOpen { .. } => events::CONNECTION_OPEN,
            Self::ConnectionClosed { .. } => events::CONNECTION_CLOSED,
            Self::Error(_) => events::ERROR,
            Self::IncomingMessage { .. } => events::INCOMING_MESSAGE,
            Self::Ready { .. } => events::READY,
            Self::Message { name, .. } => name,
        }
    }

    /// The fault carried by an `error` event.
    pub fn fault(&self) -> Option<&ConnectionError> {
        match self {
            Self::Error(error) => Some(&error.fault),
            _ => None,
        }
    }
}
