//! Connection state machine.
//!
//! The state machine owns the transport sink, the outbound queue and the
//! handshake. It is driven by two inputs, both processed on a single task:
//! transport notifications ([`handle_notification`]) and caller commands
//! ([`send`], [`close`]). It never blocks and never invokes a listener
//! directly; every observable effect goes through the event dispatcher.
//!
//! # Transitions
//!
//! ```text
//!              opened                  auth accepted
//! Connecting ─────────▶ Open ───────────────────────▶ Authenticated
//!     │                  │                                  │
//!     │ error            │ error                            │ error
//!     ▼                  ▼                                  ▼
//!   Failed ◀──────────────────────────────────────────────────
//!     │
//!     │ closed (from any state)
//!     ▼
//!   Closed
//! ```
//!
//! [`handle_notification`]: ConnectionStateMachine::handle_notification
//! [`send`]: ConnectionStateMachine::send
//! [`close`]: ConnectionStateMachine::close

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use tsr_core::{Config, ConnectionError, ConnectionState, Result};
use tsr_protocol::{parse_value, synthesized_event_name, Envelope};

use crate::auth::AuthHandshake;
use crate::dispatcher::EventDispatcher;
use crate::event::{ConnectionEvent, ErrorEvent};
use crate::queue::OutboundQueue;
use crate::transport::{CloseInfo, NotificationKind, TransportNotification, TransportSink};

/// Connection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// When true, queued messages are held until the handshake is accepted.
    /// When false, the transport opening alone makes the connection ready
    /// and the queue drains right after the handshake payload is sent.
    pub auth_before_ready: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            auth_before_ready: true,
        }
    }
}

/// Lifecycle manager for one connection.
pub struct ConnectionStateMachine<S> {
    config: Config,
    options: ConnectOptions,
    state: ConnectionState,
    handshake: AuthHandshake,
    queue: OutboundQueue,
    transport: S,
    dispatcher: EventDispatcher<ConnectionEvent>,
    transport_opened: bool,
    authenticated: bool,
    close_requested: bool,
}

impl<S: TransportSink> ConnectionStateMachine<S> {
    pub fn new(
        config: Config,
        options: ConnectOptions,
        transport: S,
        dispatcher: EventDispatcher<ConnectionEvent>,
    ) -> Self {
        Self {
            config,
            options,
            state: ConnectionState::Connecting,
            handshake: AuthHandshake::new(),
            queue: OutboundQueue::new(),
            transport,
            dispatcher,
            transport_opened: false,
            authenticated: false,
            close_requested: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn options(&self) -> ConnectOptions {
        self.options
    }

    /// Whether the handshake payload has been handed to the transport.
    pub fn auth_request_sent(&self) -> bool {
        self.handshake.request_sent()
    }

    /// Number of messages waiting for the connection to become ready.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether caller messages go straight to the transport.
    pub fn is_ready(&self) -> bool {
        match self.state {
            ConnectionState::Authenticated => true,
            ConnectionState::Open => !self.options.auth_before_ready,
            _ => false,
        }
    }

    // ========================================================================
    // Caller Commands
    // ========================================================================

    /// Sends a message, or queues it until the connection is ready.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Closed` after the connection closed, failed, or a
    ///   close was requested
    /// - `ConnectionError::Encode` if the message cannot be serialized
    /// - `ConnectionError::Transport` if the transport refused the frame
    pub fn send(&mut self, message: &Envelope) -> Result<()> {
        if self.close_requested || self.state.is_terminal() {
            return Err(ConnectionError::Closed);
        }

        let frame = serde_json::to_string(message)?;
        let ready = self.is_ready();
        debug!(message_type = %message.kind, ready, "Submitting message");
        self.queue.send(frame, ready, &mut self.transport)
    }

    /// Requests transport shutdown.
    ///
    /// Closing an already closed or failed connection is a no-op, as is a
    /// repeated close request.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::CloseWhileConnecting` if the transport never
    ///   opened
    /// - `ConnectionError::Transport` if the shutdown request failed
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => Err(ConnectionError::CloseWhileConnecting),
            ConnectionState::Closed => Ok(()),
            _ if self.close_requested || !self.transport_opened => Ok(()),
            _ => {
                info!(state = %self.state, "Closing connection");
                self.close_requested = true;
                self.transport.close()
            }
        }
    }

    // ========================================================================
    // Transport Notifications
    // ========================================================================

    /// Applies one transport notification.
    pub fn handle_notification(&mut self, notification: TransportNotification) {
        match &notification.kind {
            NotificationKind::Opened => self.on_open(&notification),
            NotificationKind::Error { cause } => {
                let fault = ConnectionError::Transport(cause.clone());
                self.on_error(&notification, fault);
            }
            NotificationKind::Closed(info) => {
                let info = info.clone();
                self.on_close(&notification, info);
            }
            NotificationKind::Message { text } => {
                let text = text.clone();
                self.on_message(&notification, &text);
            }
        }
    }

    /// Treats a transport that stopped reporting as closed.
    pub fn transport_stopped(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(state = %self.state, "Transport stopped without close notification");
            self.handle_notification(TransportNotification::closed(CloseInfo::abnormal(
                "transport stopped",
            )));
        }
    }

    fn on_open(&mut self, notification: &TransportNotification) {
        if self.state != ConnectionState::Connecting {
            warn!(state = %self.state, "Ignoring open notification");
            return;
        }

        self.state = ConnectionState::Open;
        self.transport_opened = true;
        info!(auth_before_ready = self.options.auth_before_ready, "Connection open");

        if let Err(fault) = self.handshake.send(&self.config, &mut self.transport) {
            self.fail(notification, fault);
            return;
        }

        if !self.options.auth_before_ready {
            self.drain_queue(notification);
            if self.state.is_terminal() {
                return;
            }
        }

        self.emit(ConnectionEvent::ConnectionOpen {
            observed_at: notification.observed_at,
        });
    }

    fn on_error(&mut self, notification: &TransportNotification, fault: ConnectionError) {
        if self.state.is_terminal() {
            debug!(state = %self.state, fault = %fault, "Ignoring transport error");
            return;
        }
        self.fail(notification, fault);
    }

    fn on_close(&mut self, notification: &TransportNotification, info: CloseInfo) {
        if self.state == ConnectionState::Closed {
            debug!("Ignoring duplicate close notification");
            return;
        }

        let denied = self.handshake.request_sent() && !self.authenticated;
        let previous = self.state;
        self.state = ConnectionState::Closed;
        self.queue.discard();

        info!(
            previous = %previous,
            code = ?info.code,
            reason = %info.reason,
            "Connection closed"
        );

        if denied {
            warn!("Connection closed before authentication completed");
            self.emit_error(notification, ConnectionError::AuthDenied);
        }

        self.emit(ConnectionEvent::ConnectionClosed {
            info,
            observed_at: notification.observed_at,
        });
    }

    fn on_message(&mut self, notification: &TransportNotification, text: &str) {
        if self.state.is_terminal() {
            debug!(state = %self.state, "Dropping message on inert connection");
            return;
        }

        let raw = match parse_value(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Malformed inbound frame");
                self.emit_error(notification, e.into());
                return;
            }
        };

        let envelope = match &raw {
            Value::Object(map) => Envelope::from_map(map.clone()).ok(),
            _ => None,
        };

        if let Some(message) = envelope.as_ref().filter(|m| m.is_auth()) {
            self.on_auth_response(notification, message);
        }

        self.emit(ConnectionEvent::IncomingMessage { message: raw });

        let Some(message) = envelope else {
            debug!("Inbound message is not a typed object");
            return;
        };

        if let Some(name) = synthesized_event_name(&message.kind) {
            if self.config.event_debug() {
                info!(event = %name, message = ?message, "Event received");
            }
            self.emit(ConnectionEvent::Message { name, message });
        }
    }

    fn on_auth_response(&mut self, notification: &TransportNotification, message: &Envelope) {
        if self.state != ConnectionState::Open {
            warn!(state = %self.state, "Ignoring auth message with no outstanding request");
            return;
        }

        let response = match self.handshake.accept(message) {
            Ok(response) => response,
            Err(fault) => {
                warn!(fault = %fault, "Rejected auth response");
                self.emit_error(notification, fault);
                return;
            }
        };

        self.config.set_api_key(&response.api_key);
        self.state = ConnectionState::Authenticated;
        self.authenticated = true;
        info!("Authenticated");

        self.drain_queue(notification);
        if self.state.is_terminal() {
            return;
        }

        self.emit(ConnectionEvent::Ready {
            message: message.clone(),
        });
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn drain_queue(&mut self, notification: &TransportNotification) {
        if let Err(fault) = self.queue.drain(&mut self.transport) {
            self.fail(notification, fault);
        }
    }

    fn fail(&mut self, notification: &TransportNotification, fault: ConnectionError) {
        warn!(previous = %self.state, fault = %fault, "Connection failed");
        self.state = ConnectionState::Failed;
        self.queue.discard();
        self.emit_error(notification, fault);
    }

    fn emit_error(&self, notification: &TransportNotification, fault: ConnectionError) {
        self.emit(ConnectionEvent::Error(ErrorEvent {
            notification: notification.clone(),
            fault,
        }));
    }

    fn emit(&self, event: ConnectionEvent) {
        let name = event.name().to_string();
        debug!(event = %name, at = %Utc::now(), "Emitting event");
        self.dispatcher.emit(&name, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::dispatcher::listener;
    use tsr_protocol::events;

    const WAIT: Duration = Duration::from_secs(1);

    /// Sink that records frames into shared storage.
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<String>>>,
        closes: Arc<Mutex<usize>>,
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| serde_json::from_str(f).unwrap())
                .collect()
        }
    }

    impl TransportSink for RecordingSink {
        fn send(&mut self, frame: String) -> Result<()> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct Harness {
        machine: ConnectionStateMachine<RecordingSink>,
        sink: RecordingSink,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
    }

    impl Harness {
        fn new(key: &str, auth_before_ready: bool) -> Self {
            let dispatcher = EventDispatcher::new();
            let (tx, events) = mpsc::unbounded_channel();
            for name in [
                events::CONNECTION_OPEN,
                events::CONNECTION_CLOSED,
                events::ERROR,
                events::INCOMING_MESSAGE,
                events::READY,
                "onAuth",
                "onPing",
            ] {
                let tx = tx.clone();
                dispatcher.on(
                    name,
                    listener(move |event: &ConnectionEvent| {
                        let _ = tx.send(event.clone());
                    }),
                );
            }

            let sink = RecordingSink::default();
            let machine = ConnectionStateMachine::new(
                Config::new(&json!({ "api": { "key": key } })),
                ConnectOptions { auth_before_ready },
                sink.clone(),
                dispatcher,
            );

            Self {
                machine,
                sink,
                events,
            }
        }

        async fn next_event(&mut self) -> ConnectionEvent {
            timeout(WAIT, self.events.recv()).await.unwrap().unwrap()
        }

        async fn next_names(&mut self, count: usize) -> Vec<String> {
            let mut names = Vec::new();
            for _ in 0..count {
                names.push(self.next_event().await.name().to_string());
            }
            names
        }

        fn auth_accept(&mut self, key: &str) {
            let text = json!({ "type": "auth", "payload": { "apiKey": key } }).to_string();
            self.machine
                .handle_notification(TransportNotification::message(text));
        }
    }

    fn ping() -> Envelope {
        Envelope::new("ping")
    }

    #[tokio::test]
    async fn test_handshake_scenario() {
        let mut h = Harness::new("ABC", true);
        assert_eq!(h.machine.state(), ConnectionState::Connecting);

        h.machine.handle_notification(TransportNotification::opened());
        assert_eq!(h.machine.state(), ConnectionState::Open);
        assert!(h.machine.auth_request_sent());

        let frames = h.sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "auth");
        assert_eq!(frames[0]["payload"]["content"]["apiKey"], "ABC");

        h.auth_accept("XYZ");
        assert_eq!(h.machine.state(), ConnectionState::Authenticated);
        assert_eq!(h.machine.config().api_key(), "XYZ");

        assert_eq!(
            h.next_names(4).await,
            vec!["connectionOpen", "ready", "incomingMessage", "onAuth"]
        );
    }

    #[tokio::test]
    async fn test_ready_carries_message() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.auth_accept("XYZ");
        match h.next_event().await {
            ConnectionEvent::Ready { message } => {
                assert_eq!(message.kind, "auth");
                assert_eq!(message.payload(), Some(&json!({ "apiKey": "XYZ" })));
            }
            other => panic!("Expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_queue_held_until_authenticated() {
        let mut h = Harness::new("ABC", true);
        h.machine.send(&ping()).unwrap();
        h.machine
            .send(&Envelope::with_payload("second", json!({ "n": 2 })))
            .unwrap();
        assert_eq!(h.machine.queued(), 2);

        h.machine.handle_notification(TransportNotification::opened());
        assert_eq!(h.sink.frames().len(), 1, "only the handshake before auth");

        // Sends while open but not yet authenticated still queue
        h.machine.send(&Envelope::new("third")).unwrap();
        assert_eq!(h.machine.queued(), 3);

        h.auth_accept("XYZ");
        let kinds: Vec<Value> = h.sink.frames().iter().map(|f| f["type"].clone()).collect();
        assert_eq!(kinds, vec!["auth", "ping", "second", "third"]);
        assert_eq!(h.machine.queued(), 0);

        h.machine.send(&Envelope::new("fourth")).unwrap();
        assert_eq!(h.sink.frames().len(), 5);
    }

    #[tokio::test]
    async fn test_independent_policy_drains_on_open() {
        let mut h = Harness::new("ABC", false);
        h.machine.send(&ping()).unwrap();
        assert!(h.sink.frames().is_empty());

        h.machine.handle_notification(TransportNotification::opened());
        let kinds: Vec<Value> = h.sink.frames().iter().map(|f| f["type"].clone()).collect();
        assert_eq!(kinds, vec!["auth", "ping"]);
        assert!(h.machine.is_ready());

        h.machine.send(&Envelope::new("direct")).unwrap();
        assert_eq!(h.sink.frames().len(), 3);

        h.auth_accept("XYZ");
        assert_eq!(h.machine.state(), ConnectionState::Authenticated);
        assert_eq!(h.sink.frames().len(), 3, "no second drain");
        assert_eq!(h.next_names(2).await, vec!["connectionOpen", "ready"]);
    }

    #[tokio::test]
    async fn test_close_before_auth_emits_denied_then_closed() {
        let mut h = Harness::new("BAD", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.machine
            .handle_notification(TransportNotification::closed(CloseInfo::new(Some(1000), "")));
        assert_eq!(h.machine.state(), ConnectionState::Closed);

        assert_eq!(h.next_event().await.name(), "connectionOpen");
        match h.next_event().await {
            ConnectionEvent::Error(error) => {
                assert_eq!(error.fault, ConnectionError::AuthDenied);
                assert_eq!(
                    error.notification.kind,
                    NotificationKind::Closed(CloseInfo::new(Some(1000), ""))
                );
            }
            other => panic!("Expected Error, got {other:?}"),
        }
        assert_eq!(h.next_event().await.name(), "connectionClosed");
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_after_auth_no_error() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.auth_accept("XYZ");
        h.machine
            .handle_notification(TransportNotification::closed(CloseInfo::new(Some(1000), "")));

        assert_eq!(
            h.next_names(5).await,
            vec!["connectionOpen", "ready", "incomingMessage", "onAuth", "connectionClosed"]
        );
    }

    #[tokio::test]
    async fn test_failure_after_auth_not_denied() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.auth_accept("XYZ");
        h.machine
            .handle_notification(TransportNotification::error("connection reset"));
        assert_eq!(h.machine.state(), ConnectionState::Failed);
        h.machine.handle_notification(TransportNotification::closed(CloseInfo::abnormal(
            "connection lost",
        )));

        let names = h.next_names(6).await;
        assert_eq!(
            names,
            vec![
                "connectionOpen",
                "ready",
                "incomingMessage",
                "onAuth",
                "error",
                "connectionClosed"
            ]
        );
    }

    #[tokio::test]
    async fn test_open_failure() {
        let mut h = Harness::new("ABC", true);
        h.machine.send(&ping()).unwrap();
        h.machine
            .handle_notification(TransportNotification::error("connection refused"));
        assert_eq!(h.machine.state(), ConnectionState::Failed);
        assert_eq!(h.machine.queued(), 0);

        h.machine.handle_notification(TransportNotification::closed(CloseInfo::abnormal(
            "connection failed",
        )));
        assert_eq!(h.machine.state(), ConnectionState::Closed);

        match h.next_event().await {
            ConnectionEvent::Error(error) => {
                assert!(matches!(error.fault, ConnectionError::Transport(_)));
                assert_eq!(
                    error.notification.kind,
                    NotificationKind::Error {
                        cause: "connection refused".to_string()
                    }
                );
            }
            other => panic!("Expected Error, got {other:?}"),
        }
        // No handshake was sent, so no auth-denied error precedes the close
        assert_eq!(h.next_event().await.name(), "connectionClosed");
        assert!(h.sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.machine
            .handle_notification(TransportNotification::closed(CloseInfo::new(Some(1000), "")));
        assert_eq!(h.machine.send(&ping()), Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_send_after_failure_fails() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::error("boom"));
        assert_eq!(h.machine.send(&ping()), Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_close_rules() {
        let mut h = Harness::new("ABC", true);
        assert_eq!(h.machine.close(), Err(ConnectionError::CloseWhileConnecting));

        h.machine.handle_notification(TransportNotification::opened());
        h.machine.close().unwrap();
        h.machine.close().unwrap();
        assert_eq!(*h.sink.closes.lock().unwrap(), 1);

        // Close requested: sends are refused even before the close lands
        assert_eq!(h.machine.send(&ping()), Err(ConnectionError::Closed));

        h.machine
            .handle_notification(TransportNotification::closed(CloseInfo::new(Some(1000), "")));
        h.machine.close().unwrap();
        assert_eq!(*h.sink.closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_handshake_sent_once() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.machine.handle_notification(TransportNotification::opened());
        let auth_frames = h
            .sink
            .frames()
            .iter()
            .filter(|f| f["type"] == "auth")
            .count();
        assert_eq!(auth_frames, 1);
    }

    #[tokio::test]
    async fn test_synthesized_event() {
        let mut h = Harness::new("ABC", false);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.machine.handle_notification(TransportNotification::message(
            r#"{"type":"ping","payload":{"seq":1}}"#,
        ));

        match h.next_event().await {
            ConnectionEvent::IncomingMessage { message } => assert_eq!(message["type"], "ping"),
            other => panic!("Expected IncomingMessage, got {other:?}"),
        }
        match h.next_event().await {
            ConnectionEvent::Message { name, message } => {
                assert_eq!(name, "onPing");
                assert_eq!(message.payload(), Some(&json!({ "seq": 1 })));
            }
            other => panic!("Expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_untyped_message_only_incoming() {
        let mut h = Harness::new("ABC", false);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.machine
            .handle_notification(TransportNotification::message(r#"{"status":"ok"}"#));
        assert_eq!(h.next_event().await.name(), "incomingMessage");
        assert_eq!(h.machine.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_malformed_frame_emits_protocol_error() {
        let mut h = Harness::new("ABC", false);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.machine
            .handle_notification(TransportNotification::message("not json"));
        let error = h.next_event().await;
        assert!(matches!(error.fault(), Some(ConnectionError::Protocol(_))));
        assert_eq!(h.machine.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_non_object_frame_is_incoming_message() {
        let mut h = Harness::new("ABC", false);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.machine
            .handle_notification(TransportNotification::message("[1,2]"));
        match h.next_event().await {
            ConnectionEvent::IncomingMessage { message } => assert_eq!(message, json!([1, 2])),
            other => panic!("Expected IncomingMessage, got {other:?}"),
        }
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.machine.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_malformed_auth_keeps_open() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        let _ = h.next_event().await;

        h.machine.handle_notification(TransportNotification::message(
            r#"{"type":"auth","payload":{}}"#,
        ));
        assert_eq!(h.machine.state(), ConnectionState::Open);
        assert_eq!(h.machine.config().api_key(), "ABC");

        let error = h.next_event().await;
        assert!(matches!(error.fault(), Some(ConnectionError::Protocol(_))));
        assert_eq!(h.next_event().await.name(), "incomingMessage");
    }

    #[tokio::test]
    async fn test_second_auth_message_ignored() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.auth_accept("XYZ");
        h.auth_accept("OTHER");
        assert_eq!(h.machine.config().api_key(), "XYZ");

        let names = h.next_names(6).await;
        assert_eq!(names.iter().filter(|n| *n == "ready").count(), 1);
    }

    #[tokio::test]
    async fn test_transport_stopped_closes() {
        let mut h = Harness::new("ABC", true);
        h.machine.handle_notification(TransportNotification::opened());
        h.auth_accept("XYZ");
        h.machine.transport_stopped();
        assert_eq!(h.machine.state(), ConnectionState::Closed);

        h.machine.transport_stopped();
        let names = h.next_names(5).await;
        assert_eq!(names.last().map(String::as_str), Some("connectionClosed"));
        assert!(h.events.try_recv().is_err());
    }
}
