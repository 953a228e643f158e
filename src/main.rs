//! papad: track playback daemon
//!
//! Runs a track manager and exposes it through a local control socket:
//! - One plaintext command per connection (`play <id>`, `stop <id>`, ...)
//! - One `OK:`/`ERROR:` status line back, then the connection closes
//! - Configuration via CLI arguments or TOML file
//!
//! `papad send <command>` acts as a client for a running daemon.

mod client;
mod config;
mod connection;
mod error;
mod protocol;
mod server;
mod signal;
mod tracks;

use config::{Command, Config};
use server::{ControlServer, ServerOptions};
use signal::ShutdownSignals;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracks::PlaybackTable;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match config.command.clone() {
        Command::Serve => run_daemon(config),
        Command::Send { words } => run_send(&config, &words.join(" ")),
    }
}

fn run_daemon(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        socket = %config.socket_path.display(),
        backlog = config.backlog,
        io_timeout = ?config.io_timeout,
        catalog = config.catalog.len(),
        "Starting papad"
    );

    // Must precede the worker spawn so it inherits the mask
    let signals = ShutdownSignals::block()?;

    let tracks = Arc::new(PlaybackTable::new(config.catalog));
    let options = ServerOptions {
        backlog: config.backlog,
        socket_mode: config.socket_mode,
        io_timeout: config.io_timeout,
    };

    let mut server = ControlServer::init(config.socket_path, tracks, options)?;
    if let Err(e) = server.start() {
        server.cleanup();
        return Err(e.into());
    }

    let signal = signals.wait();
    info!(signal = ?signal, "Shutting down");

    server.cleanup();
    signal?;
    Ok(())
}

fn run_send(config: &Config, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response = client::send_command(&config.socket_path, line, config.io_timeout)?;
    println!("{response}");
    if response.starts_with("OK:") {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
