//! Error types for control socket setup and lifecycle.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to set up or drive the control socket listener
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Socket path '{}' exceeds {max} bytes", path.display())]
    PathTooLong { path: PathBuf, max: usize },

    #[error("Failed to create socket directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Another instance is already listening on '{}'", path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("Failed to remove stale socket '{}': {source}", path.display())]
    RemoveStale { path: PathBuf, source: io::Error },

    #[error("Socket creation failed: {0}")]
    Socket(#[source] io::Error),

    #[error("Socket bind to '{}' failed: {source}", path.display())]
    Bind { path: PathBuf, source: io::Error },

    #[error("Socket listen failed: {0}")]
    Listen(#[source] io::Error),

    #[error("Failed to set permissions on '{}': {source}", path.display())]
    Permissions { path: PathBuf, source: io::Error },

    #[error("Failed to spawn socket server thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Cannot {action} control socket in state {state:?}")]
    InvalidState {
        action: &'static str,
        state: crate::server::ServerState,
    },
}
