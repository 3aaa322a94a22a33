//! tsr - command-line client for the remote-apps WebSocket API
//!
//! # Usage
//!
//! ```bash
//! # Print lifecycle events (every inbound message arrives as incomingMessage)
//! # as lines of JSON until the socket closes
//! tsr listen
//!
//! # Send one message once authenticated, print the rotated key, then close
//! tsr send '{"type":"ping"}'
//!
//! # Override the configured endpoint and key
//! tsr --host 127.0.0.1 --port 5899 --key ABC listen
//! ```
//!
//! Configuration is read from `<config dir>/tsremote/config.toml` unless
//! `--config` is given. Command-line flags win over the file.

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tsr_client::{listener, Connection, ConnectionBuilder, ConnectionEvent};
use tsr_core::{Config, ConnectionError, ConnectionState};
use tsr_protocol::events as event_names;

/// Events every command listens to.
const LIFECYCLE_EVENTS: [&str; 5] = [
    event_names::CONNECTION_OPEN,
    event_names::CONNECTION_CLOSED,
    event_names::ERROR,
    event_names::INCOMING_MESSAGE,
    event_names::READY,
];

/// Remote-apps API client
#[derive(Parser, Debug)]
#[command(name = "tsr", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML with [api] and [app] tables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API host
    #[arg(long, global = true)]
    host: Option<String>,

    /// API port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// API key to authenticate with
    #[arg(long, global = true)]
    key: Option<String>,

    /// Flush queued messages as soon as the socket opens instead of after
    /// authentication
    #[arg(long, global = true)]
    no_auth_wait: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print lifecycle events, including every inbound message, as JSON lines
    /// until the connection closes
    Listen,
    /// Send one JSON message and print the key in effect afterwards
    Send {
        /// Message object with a string "type" field
        message: String,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("tsr: {e:#}");
        process::exit(1);
    }
}

#[tokio::main]
async fn run(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tsr=info".parse()?)
                .add_directive("tsr_client=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.api_host(),
        "tsr starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        shutdown_token.cancel();
    });

    let builder = Connection::builder(config).auth_before_ready(!args.no_auth_wait);

    match args.command {
        Command::Listen => listen(builder, cancel_token).await,
        Command::Send { message } => {
            let message: Value =
                serde_json::from_str(&message).context("Message is not valid JSON")?;
            send(builder, message, cancel_token).await
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tsremote").join("config.toml"))
}

/// File (if any) first, then command-line flags.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match default_config_path() {
            Some(path) if path.exists() => Config::from_toml_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            _ => {
                debug!("No config file, using defaults");
                Config::default()
            }
        },
    };

    let mut api = Map::new();
    if let Some(host) = &args.host {
        api.insert("host".to_string(), json!(host));
    }
    if let Some(port) = args.port {
        api.insert("port".to_string(), json!(port));
    }
    if let Some(key) = &args.key {
        api.insert("key".to_string(), json!(key));
    }
    if !api.is_empty() {
        config.set(&json!({ "api": api }));
    }

    Ok(config)
}

// ============================================================================
// Commands
// ============================================================================

/// Routes the lifecycle events into one ordered stream.
fn event_stream(
    mut builder: ConnectionBuilder,
) -> (ConnectionBuilder, mpsc::UnboundedReceiver<ConnectionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in LIFECYCLE_EVENTS {
        let tx = tx.clone();
        builder = builder.on(
            name,
            listener(move |event: &ConnectionEvent| {
                // Receiver lives until the command returns
                let _ = tx.send(event.clone());
            }),
        );
    }
    (builder, rx)
}

async fn listen(builder: ConnectionBuilder, cancel_token: CancellationToken) -> Result<()> {
    let (builder, mut events) = event_stream(builder);
    let connection = builder.connect()?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", serde_json::to_string(&event)?);
                if event.name() == event_names::CONNECTION_CLOSED {
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Interrupted, closing connection");
                shutdown(&connection, &mut events).await;
                break;
            }
        }
    }

    Ok(())
}

async fn send(
    builder: ConnectionBuilder,
    message: Value,
    cancel_token: CancellationToken,
) -> Result<()> {
    let (builder, mut events) = event_stream(builder);
    let connection = builder.connect()?;

    connection
        .send_value(message)
        .await
        .context("Message rejected")?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("Connection stopped unexpectedly");
                };
                match &event {
                    ConnectionEvent::Ready { .. } => {
                        println!("{}", connection.api_key().await?);
                        shutdown(&connection, &mut events).await;
                        return Ok(());
                    }
                    ConnectionEvent::Error(error) => {
                        if error.fault == ConnectionError::AuthDenied {
                            bail!(
                                "Authentication denied; check the API key and allow the app \
                                 in the client"
                            );
                        }
                        warn!(fault = %error.fault, "Connection error");
                    }
                    ConnectionEvent::ConnectionClosed { info, .. } => {
                        bail!(
                            "Connection closed before the message was delivered ({})",
                            info.reason
                        );
                    }
                    _ => debug!(event = %event.name(), "Event"),
                }
            }
            _ = cancel_token.cancelled() => {
                shutdown(&connection, &mut events).await;
                bail!("Interrupted");
            }
        }
    }
}

/// Requests a close and waits for `connectionClosed`.
async fn shutdown(connection: &Connection, events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) {
    if matches!(connection.state().await, Ok(ConnectionState::Closed) | Err(_)) {
        return;
    }

    match connection.close().await {
        Ok(()) => {}
        Err(ConnectionError::CloseWhileConnecting) => {
            debug!("Connection still opening; dropping it");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Close failed");
            return;
        }
    }

    while let Some(event) = events.recv().await {
        if event.name() == event_names::CONNECTION_CLOSED {
            break;
        }
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[api]\nhost = \"10.0.0.2\"\nport = 6000\nkey = \"FROM_FILE\"\n\n[app]\nname = \"Deck\""
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from(["tsr", "--config", &path, "--key", "FROM_FLAG", "listen"]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.api_host(), "10.0.0.2");
        assert_eq!(config.api_port().unwrap(), 6000);
        assert_eq!(config.api_key(), "FROM_FLAG");
        assert_eq!(config.app_identity().name, "Deck");
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let args = Args::parse_from(["tsr", "--config", path.to_str().unwrap(), "listen"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_listen_events_cover_inbound_messages() {
        assert!(LIFECYCLE_EVENTS.contains(&event_names::INCOMING_MESSAGE));
        assert!(LIFECYCLE_EVENTS.iter().all(|name| !name.starts_with("on")));
    }

    #[test]
    fn test_send_subcommand() {
        let args = Args::parse_from(["tsr", "--port", "1234", "send", r#"{"type":"ping"}"#]);
        assert_eq!(args.port, Some(1234));
        assert!(matches!(args.command, Command::Send { ref message } if message.contains("ping")));
    }
}
