//! Client interface for a running connection.
//!
//! `Connection` is a cheap-to-clone handle. Listener registration goes
//! straight to the shared dispatcher; everything that touches connection
//! state is a request to the actor.
//!
//! # Panic-Free Guarantees
//!
//! - Channel errors are mapped to `ConnectionError::ChannelClosed`
//! - No `.unwrap()` or `.expect()` outside tests

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use tsr_core::{Config, ConnectionError, ConnectionState, Result};
use tsr_protocol::Envelope;

use crate::dispatcher::{EventDispatcher, Listener, WeakEventDispatcher};
use crate::event::ConnectionEvent;

use super::builder::ConnectionBuilder;
use super::commands::{ConnectionCommand, ConnectionStatus};

/// Handle to one connection.
///
/// The connection stays up while at least one handle exists; dropping the
/// last handle closes it. A listener that needs the connection should
/// capture a [`WeakConnection`] from [`downgrade`](Self::downgrade), since
/// a captured `Connection` keeps the connection alive.
///
/// # Usage
///
/// ```ignore
/// let connection = Connection::builder(config)
///     .on("ready", listener(|_: &ConnectionEvent| println!("ready")))
///     .connect()?;
///
/// connection.send(Envelope::new("ping")).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Connection {
    sender: mpsc::Sender<ConnectionCommand>,
    dispatcher: EventDispatcher<ConnectionEvent>,
}

impl Connection {
    pub(crate) fn new(
        sender: mpsc::Sender<ConnectionCommand>,
        dispatcher: EventDispatcher<ConnectionEvent>,
    ) -> Self {
        Self { sender, dispatcher }
    }

    /// Starts configuring a connection.
    pub fn builder(config: Config) -> ConnectionBuilder {
        ConnectionBuilder::new(config)
    }

    /// Opens a WebSocket connection with default options.
    ///
    /// Listeners added after this returns may miss the earliest events; use
    /// [`Connection::builder`] to register them up front.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Transport` if the configured address is invalid
    pub fn connect(config: Config) -> Result<Self> {
        ConnectionBuilder::new(config).connect()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Registers `listener` for `event`.
    ///
    /// The listener lives as long as the connection. If it captures a
    /// `Connection` clone, that clone counts as a live handle and dropping
    /// every other handle no longer closes the connection. Capture a
    /// [`WeakConnection`] instead.
    pub fn on(&self, event: impl Into<String>, listener: Listener<ConnectionEvent>) {
        self.dispatcher.on(event, listener);
    }

    /// Removes every registration of `listener` for `event`.
    pub fn off(&self, event: &str, listener: &Listener<ConnectionEvent>) -> usize {
        self.dispatcher.off(event, listener)
    }

    /// Forwards every `event` into a channel. The returned listener can be
    /// passed to [`off`](Self::off) to stop forwarding.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
    ) -> (Listener<ConnectionEvent>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        self.dispatcher.subscribe(event)
    }

    /// A handle that does not keep the connection alive.
    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            sender: self.sender.downgrade(),
            dispatcher: self.dispatcher.downgrade(),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Sends `message`, or queues it until the connection is ready.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Closed` after close, failure, or a close request
    /// - `ConnectionError::Transport` if the transport refused the frame
    /// - `ConnectionError::ChannelClosed` if the actor has stopped
    pub async fn send(&self, message: Envelope) -> Result<()> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ConnectionCommand::Send {
                message,
                respond_to: tx,
            })
            .await
            .map_err(|_| ConnectionError::ChannelClosed)?;

        rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Sends a raw JSON value. It must be an object with a string `type`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Protocol` if `value` is not a typed object
    /// - everything [`send`](Self::send) returns
    pub async fn send_value(&self, value: Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(ConnectionError::Protocol(
                "message is not a JSON object".to_string(),
            ));
        };
        self.send(Envelope::from_map(map)?).await
    }

    /// Requests transport shutdown. `connectionClosed` follows.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::CloseWhileConnecting` if the transport never opened
    /// - `ConnectionError::ChannelClosed` if the actor has stopped
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ConnectionCommand::Close { respond_to: tx })
            .await
            .map_err(|_| ConnectionError::ChannelClosed)?;

        rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Current lifecycle snapshot.
    pub async fn status(&self) -> Result<ConnectionStatus> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ConnectionCommand::GetStatus { respond_to: tx })
            .await
            .map_err(|_| ConnectionError::ChannelClosed)?;

        rx.await.map_err(|_| ConnectionError::ChannelClosed)
    }

    pub async fn state(&self) -> Result<ConnectionState> {
        Ok(self.status().await?.state)
    }

    /// Whether the transport is open (authenticated or not).
    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, Ok(state) if state.is_open())
    }

    /// Current configuration, including a key rotated by the handshake.
    pub async fn config(&self) -> Result<Config> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ConnectionCommand::GetConfig { respond_to: tx })
            .await
            .map_err(|_| ConnectionError::ChannelClosed)?;

        rx.await.map_err(|_| ConnectionError::ChannelClosed)
    }

    /// The API key currently in effect.
    pub async fn api_key(&self) -> Result<String> {
        Ok(self.config().await?.api_key().to_string())
    }
}

/// Non-owning handle to a connection, for use inside listeners.
#[derive(Clone, Debug)]
pub struct WeakConnection {
    sender: mpsc::WeakSender<ConnectionCommand>,
    dispatcher: WeakEventDispatcher<ConnectionEvent>,
}

impl WeakConnection {
    /// The connection, unless every `Connection` handle has been dropped.
    pub fn upgrade(&self) -> Option<Connection> {
        Some(Connection {
            sender: self.sender.upgrade()?,
            dispatcher: self.dispatcher.upgrade()?,
        })
    }
}
