//! Shutdown signal handling.
//!
//! SIGINT and SIGTERM are blocked before any thread is spawned so every
//! thread inherits the mask, then the owner thread collects them
//! synchronously with `sigwait`.

use std::io;

/// Set of blocked shutdown signals.
pub struct ShutdownSignals {
    set: libc::sigset_t,
}

impl ShutdownSignals {
    /// Block SIGINT and SIGTERM for the calling thread and its future children.
    pub fn block() -> io::Result<Self> {
        // SAFETY: the set is initialised by sigemptyset before use.
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGINT);
            libc::sigaddset(&mut set, libc::SIGTERM);

            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }

            Ok(Self { set })
        }
    }

    /// Wait until one of the blocked signals arrives; returns its number.
    pub fn wait(&self) -> io::Result<i32> {
        let mut signal: libc::c_int = 0;
        // SAFETY: `self.set` is a valid, initialised signal set.
        let rc = unsafe { libc::sigwait(&self.set, &mut signal) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(signal)
    }
}
