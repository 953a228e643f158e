//! Control protocol: command table, request parsing and dispatch.
//!
//! A request is a single line of text: a command name optionally followed by
//! one argument. Every request produces exactly one response line starting
//! with `OK:` or `ERROR:`.
//!
//! ```text
//! Request:  play track42
//! Response: OK: Playing track track42
//!
//! Request:  bogus
//! Response: ERROR: Unknown command 'bogus'
//! ```

use crate::tracks::TrackManager;
use std::fmt;

/// Maximum request length considered by the dispatcher, in bytes
pub const MAX_REQUEST_LENGTH: usize = 255;

/// Maximum response length, in bytes
pub const MAX_RESPONSE_LENGTH: usize = 1023;

/// Response status prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// A single status line sent back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Encode the response for the wire, bounded to [`MAX_RESPONSE_LENGTH`].
    pub fn to_line(&self) -> String {
        let mut line = self.to_string();
        line.truncate(floor_char_boundary(&line, MAX_RESPONSE_LENGTH));
        line
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Status::Ok => write!(f, "OK: {}", self.message),
            Status::Error => write!(f, "ERROR: {}", self.message),
        }
    }
}

/// Handler attached to a command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Play,
    Stop,
    StopAll,
    /// Placeholder: does not consult the track manager yet.
    List,
    /// Placeholder: does not consult the track manager yet.
    Status,
    /// Placeholder: does not signal the track manager yet.
    Reload,
}

impl Handler {
    /// Run the handler with its (possibly absent) argument.
    pub fn invoke(self, arg: Option<&str>, tracks: &dyn TrackManager) -> Response {
        match self {
            Handler::Play => {
                let Some(id) = arg.filter(|a| !a.is_empty()) else {
                    return Response::error("Missing track ID");
                };
                if tracks.play(id) {
                    Response::ok(format!("Playing track {id}"))
                } else {
                    Response::error(format!("Failed to play track {id}"))
                }
            }
            Handler::Stop => {
                let Some(id) = arg.filter(|a| !a.is_empty()) else {
                    return Response::error("Missing track ID");
                };
                if tracks.stop(id) {
                    Response::ok(format!("Stopped track {id}"))
                } else {
                    Response::error(format!("Failed to stop track {id}"))
                }
            }
            Handler::StopAll => {
                if tracks.stop_all() {
                    Response::ok("Stopped all tracks")
                } else {
                    Response::error("Failed to stop all tracks")
                }
            }
            Handler::List => Response::ok("Track listing not yet implemented"),
            Handler::Status => Response::ok("Status not yet implemented"),
            Handler::Reload => Response::ok("Reload signal sent"),
        }
    }
}

/// One row of the command table
#[derive(Debug, Clone, Copy)]
pub struct CommandEntry {
    pub name: &'static str,
    pub handler: Handler,
}

/// Command table. Names are case-sensitive; the first matching entry wins.
pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry { name: "play", handler: Handler::Play },
    CommandEntry { name: "stop", handler: Handler::Stop },
    CommandEntry { name: "stop-all", handler: Handler::StopAll },
    CommandEntry { name: "list", handler: Handler::List },
    CommandEntry { name: "status", handler: Handler::Status },
    CommandEntry { name: "reload", handler: Handler::Reload },
];

/// Resolve a command name to its handler.
pub fn lookup(name: &str) -> Option<Handler> {
    COMMANDS
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.handler)
}

/// A request split into command token and optional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub command: &'a str,
    pub arg: Option<&'a str>,
}

impl<'a> Request<'a> {
    /// Parse a raw request line.
    ///
    /// The input is bounded to [`MAX_REQUEST_LENGTH`] bytes first. Returns
    /// None when no command token is present.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let bounded = &raw[..floor_char_boundary(raw, MAX_REQUEST_LENGTH)];
        let line = bounded.trim_start();
        if line.is_empty() {
            return None;
        }

        let (command, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim()),
            None => (line, ""),
        };

        Some(Request {
            command,
            arg: (!rest.is_empty()).then_some(rest),
        })
    }
}

/// Parse a request line, run the matching handler and build the response.
pub fn dispatch(raw: &str, tracks: &dyn TrackManager) -> Response {
    let Some(request) = Request::parse(raw) else {
        return Response::error("Empty command");
    };

    match lookup(request.command) {
        Some(handler) => handler.invoke(request.arg, tracks),
        None => Response::error(format!("Unknown command '{}'", request.command)),
    }
}

/// Largest index `<= max` that falls on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
