//! Backend TLS engine contract
//!
//! The session layer never talks to a TLS library directly: everything
//! goes through the [`Engine`] and [`EngineSession`] traits, so backends
//! can be swapped without touching callers. [`openssl::OpensslEngine`] is
//! the linked default; [`mock::MockEngine`] is a scriptable engine for
//! tests and embedders.
//!
//! Engine ops receive the [`Session`](crate::session::Session) itself:
//! the engine reads the bound configuration, socket and hostname from it
//! and keeps the negotiation sub-state current so a retried handshake
//! resumes where the record layer stopped.

pub mod mock;
pub mod openssl;

use crate::config::TlsConfig;
use crate::error::Result;
use crate::session::Session;

pub use self::mock::MockEngine;
pub use self::openssl::OpensslEngine;

/// Identifies the concrete TLS engine behind the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    OpenSsl,
    Mock,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::OpenSsl => "openssl",
            EngineKind::Mock => "mock",
        }
    }
}

/// Process-wide operations a backend TLS engine must provide
pub trait Engine: Send + Sync {
    /// Which engine this is
    fn kind(&self) -> EngineKind;

    /// One-time process-wide setup (RNG seeding, algorithm registration)
    fn init(&self, config: &TlsConfig) -> Result<()>;

    /// Process-wide teardown, called once when the last runtime reference
    /// goes away
    fn deinit(&self);

    /// Allocate engine-private state for a new session
    ///
    /// The returned value is opaque to the session layer; only the engine
    /// interprets it.
    fn session_init(&self) -> Result<Box<dyn EngineSession>>;

    /// Format the engine name/version into `buf`, returning the number of
    /// bytes written (truncated to the buffer size)
    fn version_string(&self, buf: &mut [u8]) -> usize;

    /// MD5 digest of `input` into `output`; returns the digest length
    ///
    /// Exposed because callers use it for cache-key computation; it is not
    /// part of the handshake.
    fn digest(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Whether the engine supports the certificate status (OCSP)
    /// request extension
    fn supports_status_request(&self) -> bool;
}

/// Per-session operations on the engine-private state
///
/// `Ok(0)` from `read` is clean EOF; [`Error::WouldBlock`](crate::Error)
/// from any op means the caller's non-blocking socket wasn't ready and the
/// same call must be retried.
pub trait EngineSession: Send {
    /// Run (or resume) the handshake for the session
    fn connect(&mut self, sess: &mut Session) -> Result<()>;

    /// Record-layer read
    fn read(&mut self, sess: &mut Session, buf: &mut [u8]) -> Result<usize>;

    /// Record-layer write
    fn write(&mut self, sess: &mut Session, buf: &[u8]) -> Result<usize>;

    /// Protocol-level close (close-notify)
    fn shutdown(&mut self, sess: &mut Session) -> Result<()>;

    /// Release engine I/O resources without a graceful shutdown
    fn close(&mut self, sess: &mut Session);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_names() {
        assert_eq!(EngineKind::OpenSsl.as_str(), "openssl");
        assert_eq!(EngineKind::Mock.as_str(), "mock");
        assert_ne!(EngineKind::OpenSsl, EngineKind::Mock);
    }
}
