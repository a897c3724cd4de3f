//! Socket readiness helper
//!
//! The session layer never blocks or retries internally: a would-block
//! status travels back to the caller, whose I/O loop decides when to try
//! again. This module provides the poll primitive for that loop.

use socket2::Socket;
use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Events to wait for on a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Wait until the socket is ready for the requested events
///
/// Returns `Ok(true)` when ready, `Ok(false)` on timeout. A timeout of
/// `None` waits indefinitely.
pub fn poll(socket: &Socket, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd: socket.as_raw_fd(),
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout.map(|d| d.as_millis() as i32).unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(result > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Type};
    use std::io::Write;

    #[test]
    fn test_poll_read_ready_after_write() {
        let (mut a, b) = Socket::pair(Domain::UNIX, Type::STREAM, None).unwrap();

        // Nothing written yet: a short poll on the peer times out.
        assert!(!poll(&b, PollEvents::Read, Some(Duration::from_millis(20))).unwrap());

        a.write_all(b"x").unwrap();
        assert!(poll(&b, PollEvents::Read, Some(Duration::from_secs(1))).unwrap());
    }

    #[test]
    fn test_poll_write_ready_on_fresh_socket() {
        let (a, _b) = Socket::pair(Domain::UNIX, Type::STREAM, None).unwrap();
        assert!(poll(&a, PollEvents::Write, Some(Duration::from_secs(1))).unwrap());
    }
}
