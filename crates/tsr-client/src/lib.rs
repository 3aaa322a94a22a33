//! tsremote client - connection lifecycle for the remote-apps WebSocket API
//!
//! One [`Connection`] owns one socket to the local control endpoint. It
//! performs a one-shot authentication handshake, buffers outbound messages
//! until the connection is ready, and publishes typed events to listeners
//! registered by name.
//!
//! ```no_run
//! use tsr_client::{listener, Connection, ConnectionEvent};
//! use tsr_core::Config;
//! use tsr_protocol::Envelope;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsr_core::ConnectionError> {
//!     let connection = Connection::builder(Config::default())
//!         .on("ready", listener(|_: &ConnectionEvent| println!("authenticated")))
//!         .connect()?;
//!
//!     // Queued until the handshake is accepted
//!     connection.send(Envelope::new("ping")).await?;
//!     Ok(())
//! }
//! ```
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, or `todo!()` outside tests. Listener panics
//! are caught on the delivery task.

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod event;
pub mod machine;
pub mod queue;
pub mod transport;

pub use auth::AuthHandshake;
pub use connection::{Connection, ConnectionBuilder, ConnectionStatus, WeakConnection};
pub use dispatcher::{listener, EventDispatcher, Listener, WeakEventDispatcher};
pub use event::{ConnectionEvent, ErrorEvent};
pub use machine::{ConnectOptions, ConnectionStateMachine};
pub use queue::OutboundQueue;
pub use transport::{CloseInfo, NotificationKind, TransportNotification, TransportSink};
