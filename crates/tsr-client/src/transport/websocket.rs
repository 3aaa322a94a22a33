//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! [`open`] spawns one socket task that connects, then multiplexes outbound
//! frames from the sink with inbound frames from the peer. Every observed
//! event is pushed onto the notification channel in the order it happened.
//! A failed connect produces `Error` followed by `Closed`, matching how a
//! socket reports a refused connection.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use tsr_core::{ConnectionError, Result};

use super::{CloseInfo, TransportNotification, TransportSink};

/// Commands from the sink to the socket task.
#[derive(Debug)]
enum SocketCommand {
    Frame(String),
    Close,
}

/// Sink half of a WebSocket transport.
///
/// Dropping the sink closes the socket.
#[derive(Debug)]
pub struct WebSocketSink {
    commands: mpsc::UnboundedSender<SocketCommand>,
}

impl TransportSink for WebSocketSink {
    fn send(&mut self, frame: String) -> Result<()> {
        self.commands
            .send(SocketCommand::Frame(frame))
            .map_err(|_| ConnectionError::Transport("socket is not open".to_string()))
    }

    fn close(&mut self) -> Result<()> {
        self.commands
            .send(SocketCommand::Close)
            .map_err(|_| ConnectionError::Transport("socket is not open".to_string()))
    }
}

/// Opens a WebSocket to `url`.
///
/// Returns immediately; the outcome of the connect arrives as the first
/// notification (`Opened`, or `Error` then `Closed`). Must be called from
/// within a Tokio runtime.
pub fn open(url: &str) -> (WebSocketSink, mpsc::UnboundedReceiver<TransportNotification>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_socket(url.to_string(), command_rx, notify_tx));

    (
        WebSocketSink {
            commands: command_tx,
        },
        notify_rx,
    )
}

/// Socket task: connect, then pump frames both ways until the socket closes.
async fn run_socket(
    url: String,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    notify: mpsc::UnboundedSender<TransportNotification>,
) {
    debug!(url = %url, "Opening WebSocket");

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(url = %url, error = %e, "WebSocket connect failed");
            let _ = notify.send(TransportNotification::error(e.to_string()));
            let _ = notify.send(TransportNotification::closed(CloseInfo::abnormal(
                "connection failed",
            )));
            return;
        }
    };

    info!(url = %url, "WebSocket open");
    let _ = notify.send(TransportNotification::opened());

    let (mut writer, mut reader) = stream.split();
    let mut close_info: Option<CloseInfo> = None;
    let mut closing = false;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Frame(text)) => {
                    if let Err(e) = writer.send(Message::text(text)).await {
                        warn!(error = %e, "Failed to write frame");
                        let _ = notify.send(TransportNotification::error(e.to_string()));
                        break;
                    }
                }
                Some(SocketCommand::Close) => {
                    debug!("Sending close frame");
                    closing = true;
                    if let Err(e) = writer.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame not sent");
                        break;
                    }
                }
                None => {
                    // Sink dropped: close and stop without waiting for the peer
                    debug!("WebSocket sink dropped, closing");
                    let _ = writer.close().await;
                    break;
                }
            },

            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = notify.send(TransportNotification::message(text.as_str()));
                }
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        let _ = notify.send(TransportNotification::message(text));
                    }
                    Err(_) => {
                        warn!(len = data.len(), "Dropping non-UTF8 binary frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => {
                            CloseInfo::new(Some(u16::from(frame.code)), frame.reason.as_str())
                        }
                        None => CloseInfo::new(None, ""),
                    };
                    debug!(code = ?info.code, reason = %info.reason, "Peer sent close frame");
                    close_info = Some(info);
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    if close_info.is_none() && !closing {
                        warn!(error = %e, "WebSocket read failed");
                        let _ = notify.send(TransportNotification::error(e.to_string()));
                    } else {
                        debug!(error = %e, "WebSocket read ended during close");
                    }
                    break;
                }
                None => break,
            },
        }
    }

    let info = close_info.unwrap_or_else(|| {
        if closing {
            CloseInfo::abnormal("closed by client")
        } else {
            CloseInfo::abnormal("connection lost")
        }
    });
    info!(code = ?info.code, reason = %info.reason, "WebSocket closed");
    let _ = notify.send(TransportNotification::closed(info));
}
