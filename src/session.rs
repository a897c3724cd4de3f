//! TLS session lifecycle and connection state machine
//!
//! A [`Session`] binds one configuration for its entire life, owns the
//! engine-private state, and tracks negotiation progress and per-operation
//! timing. It never blocks or retries on its own: engine statuses,
//! would-block included, travel back to the caller verbatim, and the
//! caller's I/O loop drives any retries.

use crate::config::TlsConfig;
use crate::engine::{Engine, EngineSession};
use crate::error::{Error, Result};
use crate::runtime;
use socket2::Socket;
use std::sync::Arc;
use std::time::Instant;

/// Connection state of a session
///
/// `Connected` is entered when a connect call returns success; `None` is
/// restored only by a successful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    None,
    Negotiating,
    Connected,
}

/// Negotiation sub-state, kept current by the engine so a handshake that
/// returned would-block resumes where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

/// A connection-bound TLS session
pub struct Session {
    // Engine state must drop before the owned hostname: field order is
    // load-bearing for Drop.
    backend: Option<Box<dyn EngineSession>>,
    hostname: Option<String>,
    engine: Arc<dyn Engine>,
    config: Arc<TlsConfig>,
    socket: Option<Socket>,
    in_use: bool,
    state: ConnectionState,
    handshake: HandshakeState,
    connect_start: Option<Instant>,
    read_start: Option<Instant>,
    write_start: Option<Instant>,
}

impl Session {
    /// Create a session against the process-wide runtime
    ///
    /// With `None` the process-wide default configuration is bound; the
    /// binding happens now, by reference, so a later change of the default
    /// never affects this session. Fails if
    /// [`global_init`](crate::runtime::global_init) has not run.
    pub fn new(config: Option<Arc<TlsConfig>>) -> Result<Session> {
        let (engine, default_config) = runtime::current().ok_or_else(|| {
            Error::InvalidArgument("global_init() has not been called".to_string())
        })?;
        Session::with_engine(engine, config.unwrap_or(default_config))
    }

    /// Create a session against an explicit engine and configuration
    ///
    /// If the engine fails to allocate its per-session state nothing of
    /// the session survives; the error propagates as-is.
    pub fn with_engine(engine: Arc<dyn Engine>, config: Arc<TlsConfig>) -> Result<Session> {
        let backend = engine.session_init()?;
        Ok(Session {
            backend: Some(backend),
            hostname: None,
            engine,
            config,
            socket: None,
            in_use: false,
            state: ConnectionState::None,
            handshake: HandshakeState::NotStarted,
            connect_start: None,
            read_start: None,
            write_start: None,
        })
    }

    /// Start (or resume) the TLS handshake over the caller's socket
    ///
    /// The session is marked in use and negotiating, the socket handle and
    /// hostname are bound (first call only; the hostname is set once for
    /// the session's life), and the connect-start timestamp is stamped
    /// before the engine runs. A non-blocking socket surfaces
    /// [`Error::WouldBlock`]; call again once the socket is ready.
    pub fn connect(&mut self, socket: &Socket, hostname: &str) -> Result<()> {
        self.in_use = true;
        self.state = ConnectionState::Negotiating;
        if self.socket.is_none() {
            self.socket = Some(socket.try_clone()?);
        }
        if self.hostname.is_none() {
            self.hostname = Some(hostname.to_string());
        }
        self.connect_start = Some(Instant::now());

        let mut backend = self.take_backend()?;
        let ret = backend.connect(self);
        self.backend = Some(backend);

        if ret.is_ok() {
            self.state = ConnectionState::Connected;
        }
        ret
    }

    /// Record-layer read; `Ok(0)` is clean EOF
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_start = Some(Instant::now());
        let mut backend = self.take_backend()?;
        let ret = backend.read(self, buf);
        self.backend = Some(backend);
        ret
    }

    /// Record-layer write
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_start = Some(Instant::now());
        let mut backend = self.take_backend()?;
        let ret = backend.write(self, buf);
        self.backend = Some(backend);
        ret
    }

    /// Graceful protocol close
    ///
    /// Only on success is the session no longer considered in use and its
    /// state reset; after a failure it stays marked in use so the caller
    /// can retry or tear it down knowingly.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut backend = self.take_backend()?;
        let ret = backend.shutdown(self);
        self.backend = Some(backend);

        if ret.is_ok() {
            self.in_use = false;
            self.state = ConnectionState::None;
        }
        ret
    }

    /// Release engine I/O resources without a graceful shutdown
    ///
    /// Leaves the usage flag and connection state untouched; the session
    /// itself is released by dropping it.
    pub fn close(&mut self) {
        if let Ok(mut backend) = self.take_backend() {
            backend.close(self);
            self.backend = Some(backend);
        }
    }

    /// The configuration this session was bound to at creation
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    /// The engine driving this session
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// SNI hostname bound at connect time
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// The bound socket handle
    pub fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    /// Whether the session carries (or carried) TLS traffic
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake
    }

    /// Update the negotiation sub-state (engines call this)
    pub fn set_handshake_state(&mut self, state: HandshakeState) {
        self.handshake = state;
    }

    pub fn connect_start(&self) -> Option<Instant> {
        self.connect_start
    }

    pub fn read_start(&self) -> Option<Instant> {
        self.read_start
    }

    pub fn write_start(&self) -> Option<Instant> {
        self.write_start
    }

    fn take_backend(&mut self) -> Result<Box<dyn EngineSession>> {
        self.backend
            .take()
            .ok_or_else(|| Error::InvalidArgument("session has no engine state".to_string()))
    }
}
