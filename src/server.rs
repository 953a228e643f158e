//! Control socket listener.
//!
//! Owns the Unix socket the daemon is controlled through. The lifecycle is
//! explicit: [`ControlServer::init`] binds, [`ControlServer::start`] spawns
//! the accept worker and [`ControlServer::cleanup`] tears everything down.
//!
//! The worker blocks in `accept(2)` with no timeout, so cleanup wakes it by
//! connecting to its own socket after raising the shutdown flag. The worker
//! re-checks the flag after every accept and exits without serving the
//! wakeup connection.

use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::tracks::TrackManager;
use socket2::{Domain, SockAddr, Socket, Type};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-user runtime directory base
pub const RUNTIME_BASE: &str = "/var/run/user";

/// Directory under the runtime base holding the daemon's files
pub const APP_NAMESPACE: &str = "papa";

/// Socket file stem
pub const DAEMON_NAME: &str = "papad";

/// Default listen backlog
pub const DEFAULT_BACKLOG: i32 = 5;

/// Default socket file mode, lets any local user connect
pub const DEFAULT_SOCKET_MODE: u32 = 0o666;

/// Default bound on a client's read and write
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket path for the invoking user: `/var/run/user/<uid>/papa/papad.sock`.
pub fn default_socket_path() -> PathBuf {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    Path::new(RUNTIME_BASE)
        .join(uid.to_string())
        .join(APP_NAMESPACE)
        .join(format!("{DAEMON_NAME}.sock"))
}

/// Longest socket path that fits in `sun_path` with its terminator.
pub fn max_socket_path_len() -> usize {
    // SAFETY: sockaddr_un is plain old data; all-zero is a valid value.
    let addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_path.len() - 1
}

/// Tunables applied when binding and serving
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Pending connection queue length
    pub backlog: i32,
    /// Mode applied to the socket file after bind
    pub socket_mode: u32,
    /// Read/write timeout per client connection (None = block forever)
    pub io_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            socket_mode: DEFAULT_SOCKET_MODE,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

/// Lifecycle state of a [`ControlServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Bound,
    Running,
    Stopping,
    Stopped,
}

/// Cancellation signal handed to the worker at spawn.
///
/// Set once by the owner, observed by the worker before and after each
/// accept.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A bound control socket and its accept worker.
pub struct ControlServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    tracks: Arc<dyn TrackManager>,
    options: ServerOptions,
    state: ServerState,
    shutdown: Shutdown,
    worker: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind the control socket at `socket_path`.
    ///
    /// Creates the parent directory if needed and clears a stale socket
    /// left by an unclean shutdown. Fails with
    /// [`ServerError::AlreadyRunning`] if a live listener answers on the path.
    /// On any failure no socket is left bound.
    pub fn init(
        socket_path: impl Into<PathBuf>,
        tracks: Arc<dyn TrackManager>,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let socket_path = socket_path.into();

        let max = max_socket_path_len();
        if socket_path.as_os_str().len() > max {
            return Err(ServerError::PathTooLong {
                path: socket_path,
                max,
            });
        }

        if let Some(parent) = socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ServerError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        remove_stale_socket(&socket_path)?;

        let listener = bind_listener(&socket_path, options.backlog)?;

        let perms = fs::Permissions::from_mode(options.socket_mode);
        if let Err(source) = fs::set_permissions(&socket_path, perms) {
            drop(listener);
            let _ = fs::remove_file(&socket_path);
            return Err(ServerError::Permissions {
                path: socket_path,
                source,
            });
        }

        info!(
            path = %socket_path.display(),
            backlog = options.backlog,
            mode = %format!("{:o}", options.socket_mode),
            "Socket server initialized"
        );

        Ok(Self {
            socket_path,
            listener: Some(listener),
            tracks,
            options,
            state: ServerState::Bound,
            shutdown: Shutdown::new(),
            worker: None,
        })
    }

    /// Spawn the accept worker. Only valid once, from the bound state.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let listener = match (self.state, &self.listener) {
            (ServerState::Bound, Some(listener)) => listener,
            (state, _) => {
                return Err(ServerError::InvalidState {
                    action: "start",
                    state,
                })
            }
        };

        // The worker gets its own handle; ours is closed only after the join
        let worker_listener = listener.try_clone().map_err(ServerError::Socket)?;
        let tracks = Arc::clone(&self.tracks);
        let shutdown = self.shutdown.clone();
        let io_timeout = self.options.io_timeout;

        let handle = thread::Builder::new()
            .name("control-socket".to_string())
            .spawn(move || accept_loop(worker_listener, tracks.as_ref(), &shutdown, io_timeout))
            .map_err(|e| {
                error!(error = %e, "Failed to create socket server thread");
                ServerError::Spawn(e)
            })?;

        self.worker = Some(handle);
        self.state = ServerState::Running;
        Ok(())
    }

    /// Stop the worker, close the socket and remove the socket file.
    ///
    /// Waits for an in-flight connection to finish. Calling this on a
    /// stopped server does nothing.
    pub fn cleanup(&mut self) {
        if self.state == ServerState::Stopped {
            debug!("Socket server already stopped");
            return;
        }
        self.state = ServerState::Stopping;

        self.shutdown.trigger();

        if let Some(worker) = self.worker.take() {
            self.wake_worker();
            if worker.join().is_err() {
                error!("Socket server thread panicked");
            }
        }

        // Join-before-close: the worker no longer touches the listener
        self.listener = None;

        match fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.socket_path.display(), error = %e, "Failed to remove socket file"),
        }

        self.state = ServerState::Stopped;
        info!("Socket server cleaned up");
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Unblock the worker's pending accept.
    fn wake_worker(&self) {
        match UnixStream::connect(&self.socket_path) {
            Ok(stream) => drop(stream),
            Err(e) => {
                // Socket file gone or refused: shut the listening socket
                // down directly so accept returns an error
                warn!(error = %e, "Wakeup connect failed, shutting down listener");
                if let Some(listener) = &self.listener {
                    // SAFETY: the descriptor is owned by `listener` and still open.
                    unsafe {
                        libc::shutdown(listener.as_raw_fd(), libc::SHUT_RDWR);
                    }
                }
            }
        }
    }
}

/// Remove a leftover socket file, refusing if a live listener answers.
fn remove_stale_socket(path: &Path) -> Result<(), ServerError> {
    if let Err(e) = fs::symlink_metadata(path) {
        if e.kind() == io::ErrorKind::NotFound {
            return Ok(());
        }
    }

    if UnixStream::connect(path).is_ok() {
        return Err(ServerError::AlreadyRunning {
            path: path.to_path_buf(),
        });
    }

    match fs::remove_file(path) {
        Ok(()) => {
            warn!(path = %path.display(), "Removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ServerError::RemoveStale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn bind_listener(path: &Path, backlog: i32) -> Result<UnixListener, ServerError> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(ServerError::Socket)?;

    let addr = SockAddr::unix(path).map_err(|source| ServerError::Bind {
        path: path.to_path_buf(),
        source,
    })?;
    socket.bind(&addr).map_err(|source| ServerError::Bind {
        path: path.to_path_buf(),
        source,
    })?;

    if let Err(e) = socket.listen(backlog) {
        drop(socket);
        let _ = fs::remove_file(path);
        return Err(ServerError::Listen(e));
    }

    Ok(socket.into())
}

fn accept_loop(
    listener: UnixListener,
    tracks: &dyn TrackManager,
    shutdown: &Shutdown,
    io_timeout: Option<Duration>,
) {
    info!("Socket server thread started");

    while !shutdown.is_triggered() {
        let mut stream = match listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(e) => {
                if !shutdown.is_triggered() {
                    error!(error = %e, "Socket accept failed");
                }
                continue;
            }
        };

        // Wakeup connection, or a client that raced it
        if shutdown.is_triggered() {
            debug!("Dropping connection accepted during shutdown");
            break;
        }

        if let Err(e) = stream
            .set_read_timeout(io_timeout)
            .and_then(|()| stream.set_write_timeout(io_timeout))
        {
            warn!(error = %e, "Failed to set client timeout");
        }

        if let Err(e) = handle_connection(&mut stream, tracks) {
            debug!(error = %e, "Connection error");
        }
    }

    info!("Socket server thread stopped");
}
