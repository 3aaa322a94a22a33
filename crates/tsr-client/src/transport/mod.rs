//! Transport adapter boundary.
//!
//! The state machine talks to the socket through two halves:
//! - a [`TransportSink`] it owns, used to send frames and request shutdown
//! - a stream of [`TransportNotification`]s, consumed by the connection
//!   driver and fed back into the state machine one at a time
//!
//! [`websocket::open`] provides both halves for a real WebSocket. Tests
//! substitute a scripted sink and feed notifications by hand.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tsr_core::Result;

pub mod websocket;

/// Outbound half of a transport.
pub trait TransportSink: Send + 'static {
    /// Hands one text frame to the socket. Frames are written in the order
    /// they are submitted.
    fn send(&mut self, frame: String) -> Result<()>;

    /// Requests shutdown. A `Closed` notification follows asynchronously.
    fn close(&mut self) -> Result<()>;
}

/// Close details reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseInfo {
    /// WebSocket close code, if the peer sent one.
    pub code: Option<u16>,
    /// Close reason, possibly empty.
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close without a close frame (dropped socket, failed open).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(None, reason)
    }
}

/// What the transport observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    Opened,
    Error { cause: String },
    Closed(CloseInfo),
    Message { text: String },
}

/// A single raw transport event, stamped with the time it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportNotification {
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub observed_at: DateTime<Utc>,
}

impl TransportNotification {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            observed_at: Utc::now(),
        }
    }

    pub fn opened() -> Self {
        Self::new(NotificationKind::Opened)
    }

    pub fn error(cause: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error {
            cause: cause.into(),
        })
    }

    pub fn closed(info: CloseInfo) -> Self {
        Self::new(NotificationKind::Closed(info))
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::new(NotificationKind::Message { text: text.into() })
    }
}
