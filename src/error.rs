//! Error types for TLS session operations

/// Result type for vtls operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the configuration, session and engine layers
///
/// `WouldBlock` is a retry signal rather than a failure: it surfaces from a
/// non-blocking socket and the caller is expected to poll and call the same
/// operation again. All other variants are real failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown configuration key: {0}")]
    UnknownOption(String),

    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    #[error("TLS negotiation failed: {0}")]
    Negotiation(String),

    #[error("operation would block")]
    WouldBlock,

    #[error("TLS shutdown failed: {0}")]
    ShutdownFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

impl Error {
    /// True for the non-fatal retry signal from a non-blocking socket
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_is_not_a_failure_message() {
        assert!(Error::WouldBlock.is_would_block());
        assert!(!Error::UnknownOption("x".to_string()).is_would_block());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
