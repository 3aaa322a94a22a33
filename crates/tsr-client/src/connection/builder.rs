//! Connection setup.
//!
//! Listeners registered on the builder are in place before the driver
//! starts, so no event can be emitted before they exist.

use tokio::sync::mpsc;
use tracing::info;

use tsr_core::{Config, ConnectionError, Result};

use crate::dispatcher::{EventDispatcher, Listener};
use crate::event::ConnectionEvent;
use crate::machine::{ConnectOptions, ConnectionStateMachine};
use crate::transport::{websocket, TransportNotification, TransportSink};

use super::actor::ConnectionActor;
use super::handle::Connection;

/// Command channel buffer size.
const COMMAND_BUFFER: usize = 64;

/// Builder for a [`Connection`].
///
/// May be created anywhere; `connect` and `with_transport` must run inside
/// a Tokio runtime, which also hosts event delivery.
#[derive(Debug)]
pub struct ConnectionBuilder {
    config: Config,
    options: ConnectOptions,
    dispatcher: EventDispatcher<ConnectionEvent>,
}

impl ConnectionBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            options: ConnectOptions::default(),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Whether queued messages wait for the handshake (default) or only
    /// for the transport to open.
    pub fn auth_before_ready(mut self, enabled: bool) -> Self {
        self.options.auth_before_ready = enabled;
        self
    }

    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers `listener` for `event` before the connection starts.
    pub fn on(self, event: impl Into<String>, listener: Listener<ConnectionEvent>) -> Self {
        self.dispatcher.on(event, listener);
        self
    }

    /// Forwards every `event` into a channel, starting with the first one.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (_, receiver) = self.dispatcher.subscribe(event);
        receiver
    }

    /// Opens a WebSocket to `ws://<api.host>:<api.port>/` and starts the
    /// connection.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Transport` if the configured address is invalid
    pub fn connect(self) -> Result<Connection> {
        let url = self
            .config
            .socket_url()
            .map_err(|e| ConnectionError::Transport(format!("invalid address: {e}")))?;

        info!(url = %url, "Connecting");
        let (sink, notifications) = websocket::open(&url);
        Ok(self.with_transport(sink, notifications))
    }

    /// Starts the connection over a caller-provided transport.
    ///
    /// `notifications` must report the transport's events in order,
    /// starting with `Opened` or `Error`.
    pub fn with_transport<S: TransportSink>(
        self,
        sink: S,
        notifications: mpsc::UnboundedReceiver<TransportNotification>,
    ) -> Connection {
        self.dispatcher.start();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let machine =
            ConnectionStateMachine::new(self.config, self.options, sink, self.dispatcher.clone());
        let actor = ConnectionActor::new(command_rx, notifications, machine);
        tokio::spawn(actor.run());

        Connection::new(command_tx, self.dispatcher)
    }
}
