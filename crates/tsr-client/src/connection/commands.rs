//! Connection actor commands.
//!
//! Every command carries a oneshot channel for its response, so handle
//! methods are plain request/response calls over the actor's mpsc channel.

use serde::Serialize;
use tokio::sync::oneshot;

use tsr_core::{Config, ConnectionState, Result};
use tsr_protocol::Envelope;

/// Commands sent to the connection actor.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Send a message, or queue it until the connection is ready.
    ///
    /// # Errors
    /// - `ConnectionError::Closed` after close, failure, or a close request
    /// - `ConnectionError::Transport` if the transport refused the frame
    Send {
        message: Envelope,
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Request transport shutdown.
    ///
    /// # Errors
    /// - `ConnectionError::CloseWhileConnecting` if the transport never opened
    Close {
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Snapshot of the lifecycle state.
    GetStatus {
        respond_to: oneshot::Sender<ConnectionStatus>,
    },

    /// Copy of the current configuration, including a rotated key.
    GetConfig {
        respond_to: oneshot::Sender<Config>,
    },
}

/// Point-in-time view of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub auth_request_sent: bool,
    /// Messages waiting for the connection to become ready.
    pub queued: usize,
}
