//! One-shot authentication handshake.
//!
//! The handshake payload is sent once per connection, directly to the
//! transport. Acceptance arrives as an `auth` message carrying the key to
//! use from now on. There is no rejection message: a denied handshake is
//! only visible as the transport closing while the request is outstanding.

use tracing::{debug, info};

use tsr_core::{Config, ConnectionError, Result};
use tsr_protocol::{AuthRequest, AuthResponse, Envelope};

use crate::transport::TransportSink;

/// Handshake progress for one connection.
#[derive(Debug, Default)]
pub struct AuthHandshake {
    request_sent: bool,
}

impl AuthHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the handshake payload was handed to the transport.
    pub fn request_sent(&self) -> bool {
        self.request_sent
    }

    /// Builds the handshake payload from the configured identity and key.
    pub fn build(config: &Config) -> AuthRequest {
        AuthRequest::new(&config.app_identity(), config.api_key())
    }

    /// Sends the handshake payload.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::AuthAlreadySent` on a second call
    /// - `ConnectionError::Encode` / `Transport` if the payload cannot be sent;
    ///   the request is then not considered sent
    pub fn send<S: TransportSink>(&mut self, config: &Config, sink: &mut S) -> Result<()> {
        if self.request_sent {
            return Err(ConnectionError::AuthAlreadySent);
        }

        let request = Self::build(config);
        sink.send(request.to_frame()?)?;
        self.request_sent = true;

        info!(
            identifier = %request.payload.identifier,
            has_key = !request.payload.content.api_key.is_empty(),
            "Authentication request sent"
        );
        Ok(())
    }

    /// Interprets an inbound `auth` message as acceptance of the outstanding
    /// request.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Protocol` if no request is outstanding or the
    ///   message has no string `payload.apiKey`
    pub fn accept(&self, message: &Envelope) -> Result<AuthResponse> {
        if !self.request_sent {
            return Err(ConnectionError::Protocol(
                "auth response without an outstanding request".to_string(),
            ));
        }

        let response = AuthResponse::from_envelope(message)?;
        debug!("Authentication response accepted");
        Ok(response)
    }
}
