//! Connection lifecycle states.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a single connection.
///
/// `Connecting` is initial. `Closed` and `Failed` are terminal, except that
/// `Failed` moves to `Closed` once the transport finishes tearing down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Authenticated,
    Closed,
    Failed,
}

impl ConnectionState {
    /// Returns true if no further transitions except `Failed -> Closed` can
    /// happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Returns true if the transport has opened and not yet gone away.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::Authenticated)
    }

    /// Short lowercase label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Authenticated => "authenticated",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
