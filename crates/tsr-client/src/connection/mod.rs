//! Connection driver using the actor pattern.
//!
//! ```text
//! ┌──────────────┐  ConnectionCommand  ┌─────────────────┐    frames     ┌───────────┐
//! │  Connection  │──────(mpsc)────────▶│ ConnectionActor │──────────────▶│ Transport │
//! │   (handle)   │                     │ (state machine) │◀──────────────│           │
//! └──────────────┘                     └─────────────────┘ notifications └───────────┘
//!        │ on/off                              │ emit
//!        ▼                                     ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                    EventDispatcher                    │
//! └───────────────────────────────────────────────────────┘
//! ```

mod actor;
mod builder;
mod commands;
mod handle;

pub use actor::ConnectionActor;
pub use builder::ConnectionBuilder;
pub use commands::{ConnectionCommand, ConnectionStatus};
pub use handle::{Connection, WeakConnection};
