//! Per-connection request handling.
//!
//! Each accepted connection gets exactly one read, one dispatch and one
//! write. The caller closes the stream by dropping it afterwards.

use crate::protocol::{dispatch, Response};
use crate::tracks::TrackManager;
use std::io::{self, Read, Write};
use tracing::{debug, trace};

/// Read buffer size; one byte is kept back to mirror a NUL-terminated read
pub const BUFFER_SIZE: usize = 1024;

/// Serve a single request on `stream`.
///
/// Returns `Ok(None)` when the peer sent nothing before closing, in which
/// case no response is written.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    tracks: &dyn TrackManager,
) -> io::Result<Option<Response>> {
    let mut buffer = [0u8; BUFFER_SIZE];

    let n = stream.read(&mut buffer[..BUFFER_SIZE - 1])?;
    if n == 0 {
        trace!("Connection closed without a request");
        return Ok(None);
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    debug!(request = %request.trim_end(), "Received command");

    let response = dispatch(&request, tracks);
    stream.write_all(response.to_line().as_bytes())?;
    stream.flush()?;

    debug!(ok = response.is_ok(), response = %response, "Sent response");
    Ok(Some(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::testing::RecordingTracks;
    use std::io::Cursor;

    /// In-memory duplex stream: reads from `input`, collects writes.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            // Accept at most 4 bytes per call to exercise write_all
            let n = buf.len().min(4);
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_single_request() {
        let tracks = RecordingTracks::new(true);
        let mut stream = MockStream::new(b"play track42\n");

        let response = handle_connection(&mut stream, &tracks).unwrap().unwrap();
        assert!(response.is_ok());
        assert_eq!(stream.output, b"OK: Playing track track42");
        assert_eq!(tracks.calls(), vec!["play track42"]);
    }

    #[test]
    fn test_empty_read_writes_nothing() {
        let tracks = RecordingTracks::new(true);
        let mut stream = MockStream::new(b"");

        assert!(handle_connection(&mut stream, &tracks).unwrap().is_none());
        assert!(stream.output.is_empty());
        assert!(tracks.calls().is_empty());
    }

    #[test]
    fn test_failed_command_is_not_an_error() {
        let tracks = RecordingTracks::new(false);
        let mut stream = MockStream::new(b"stop track42");

        let response = handle_connection(&mut stream, &tracks).unwrap().unwrap();
        assert!(!response.is_ok());
        assert_eq!(stream.output, b"ERROR: Failed to stop track track42");
    }

    #[test]
    fn test_read_bounded_by_buffer() {
        let tracks = RecordingTracks::new(true);
        let mut input = b"bogus ".to_vec();
        input.extend(std::iter::repeat(b'z').take(4096));
        let mut stream = MockStream::new(&input);

        handle_connection(&mut stream, &tracks).unwrap();
        assert_eq!(stream.output, b"ERROR: Unknown command 'bogus'");
        // Only one read was performed
        assert_eq!(stream.input.position() as usize, BUFFER_SIZE - 1);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let tracks = RecordingTracks::new(true);
        let mut stream = MockStream::new(b"\xff\xfe");

        handle_connection(&mut stream, &tracks).unwrap();
        let output = String::from_utf8(stream.output).unwrap();
        assert!(output.starts_with("ERROR: Unknown command '"));
    }
}
