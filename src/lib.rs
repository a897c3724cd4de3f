//! vtls - backend-agnostic TLS session layer
//!
//! This crate presents one stable API for TLS client connections
//! (configuration, session lifecycle, connect/read/write/shutdown) and
//! delegates the actual handshake, record encryption and certificate
//! validation to a pluggable engine. OpenSSL is the engine linked by
//! default; a scriptable mock engine ships for tests and embedders.
//!
//! # Architecture
//!
//! 1. [`TlsConfig`] holds the TLS policy (verification, trust material,
//!    timeouts, diagnostic callbacks) and is shared read-only by sessions
//! 2. [`Session`] owns the per-connection state machine: negotiation
//!    state, bound socket and hostname, operation timestamps
//! 3. The [`engine`] traits are the fixed contract every backend
//!    implements; the session layer forwards to them and never interprets
//!    engine-private state
//! 4. [`runtime`] carries the reference-counted process-wide
//!    initialization and the default configuration
//!
//! The model is synchronous and caller-driven: on a non-blocking socket
//! any operation can report [`Error::WouldBlock`], and the caller polls
//! (see [`net::poll`]) and calls the same operation again.
//!
//! # Example
//!
//! ```no_run
//! use socket2::{Domain, Protocol, Socket, Type};
//! use vtls::{Session, TlsConfig, TlsVersion};
//!
//! let config = TlsConfig::builder()
//!     .version(TlsVersion::Tls12)
//!     .verify_peer(true)
//!     .verify_host(true)
//!     .ca_path("/etc/ssl/certs")
//!     .build();
//!
//! vtls::global_init(Some(&config)).unwrap();
//!
//! let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
//! socket.connect(&"93.184.216.34:443".parse::<std::net::SocketAddr>().unwrap().into()).unwrap();
//!
//! let mut sess = Session::new(None).unwrap();
//! sess.connect(&socket, "example.com").unwrap();
//! sess.write(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//!
//! let mut buf = [0u8; 2048];
//! while let Ok(n) = sess.read(&mut buf) {
//!     if n == 0 {
//!         break;
//!     }
//!     print!("{}", String::from_utf8_lossy(&buf[..n]));
//! }
//!
//! sess.shutdown().unwrap();
//! drop(sess);
//! vtls::global_deinit();
//! ```

pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod net;
pub mod runtime;
pub mod session;

pub use config::{AuthType, CertFormat, TlsConfig, TlsConfigBuilder, TlsVersion};
pub use diag::{DiagCallback, LockCallback};
pub use engine::{Engine, EngineKind, EngineSession};
pub use error::{Error, Result};
pub use runtime::{global_deinit, global_init, global_init_with, InitStatus};
pub use session::{ConnectionState, HandshakeState, Session};
