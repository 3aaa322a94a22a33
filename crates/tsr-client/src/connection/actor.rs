//! Connection actor - owns the state machine and serializes its inputs.
//!
//! Caller commands and transport notifications are multiplexed on one task,
//! so the state machine never sees two inputs at once.
//!
//! # Shutdown
//!
//! - When every handle is dropped, an open transport is asked to close
//!   (a still-connecting one is closed as soon as it opens).
//! - When the transport stops reporting, the machine is moved to `Closed`
//!   and the actor keeps answering commands until the handles are gone.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::machine::ConnectionStateMachine;
use crate::transport::{TransportNotification, TransportSink};

use super::commands::{ConnectionCommand, ConnectionStatus};

/// The connection actor.
pub struct ConnectionActor<S> {
    receiver: mpsc::Receiver<ConnectionCommand>,
    notifications: mpsc::UnboundedReceiver<TransportNotification>,
    machine: ConnectionStateMachine<S>,
}

impl<S: TransportSink> ConnectionActor<S> {
    pub fn new(
        receiver: mpsc::Receiver<ConnectionCommand>,
        notifications: mpsc::UnboundedReceiver<TransportNotification>,
        machine: ConnectionStateMachine<S>,
    ) -> Self {
        Self {
            receiver,
            notifications,
            machine,
        }
    }

    /// Runs until both the handles and the transport are gone.
    pub async fn run(mut self) {
        info!(host = %self.machine.config().api_host(), "Connection actor starting");

        let mut handles_alive = true;
        let mut transport_alive = true;

        while handles_alive || transport_alive {
            tokio::select! {
                command = self.receiver.recv(), if handles_alive => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All connection handles dropped");
                        handles_alive = false;
                        self.release();
                    }
                },

                notification = self.notifications.recv(), if transport_alive => match notification {
                    Some(notification) => {
                        self.machine.handle_notification(notification);
                        if !handles_alive {
                            self.release();
                        }
                    }
                    None => {
                        transport_alive = false;
                        self.machine.transport_stopped();
                    }
                },
            }
        }

        info!(state = %self.machine.state(), "Connection actor stopped");
    }

    fn handle_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Send {
                message,
                respond_to,
            } => {
                let result = self.machine.send(&message);
                // Caller may have stopped waiting
                let _ = respond_to.send(result);
            }
            ConnectionCommand::Close { respond_to } => {
                let _ = respond_to.send(self.machine.close());
            }
            ConnectionCommand::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            ConnectionCommand::GetConfig { respond_to } => {
                let _ = respond_to.send(self.machine.config().clone());
            }
        }
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.machine.state(),
            auth_request_sent: self.machine.auth_request_sent(),
            queued: self.machine.queued(),
        }
    }

    /// Closes an open transport that nobody can reach anymore.
    fn release(&mut self) {
        if !self.machine.state().is_open() {
            return;
        }
        if let Err(e) = self.machine.close() {
            warn!(error = %e, "Failed to close unreferenced connection");
        }
    }
}
