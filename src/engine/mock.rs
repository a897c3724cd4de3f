//! Scriptable mock engine
//!
//! A TLS engine that performs no cryptography: connect outcomes, read
//! replies and shutdown results are scripted by the test, and every
//! operation is journaled together with the session state the engine
//! observed on entry. That journal is what lets tests assert ordering
//! guarantees such as "the session was already negotiating when the
//! engine first saw it".

use crate::config::TlsConfig;
use crate::engine::{Engine, EngineKind, EngineSession};
use crate::error::{Error, Result};
use crate::session::{ConnectionState, HandshakeState, Session};
use bytes::{Buf, Bytes};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Operation recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    Connect,
    Read,
    Write,
    Shutdown,
    Close,
}

/// One journal entry: the op plus the session state seen on entry
#[derive(Debug, Clone)]
pub struct OpRecord {
    pub op: MockOp,
    pub state: ConnectionState,
    pub in_use: bool,
    /// Whether the timestamp belonging to this op had been stamped before
    /// the engine was called
    pub stamped: bool,
    pub hostname: Option<String>,
}

#[derive(Default)]
struct MockState {
    connect_script: VecDeque<Result<()>>,
    shutdown_script: VecDeque<Result<()>>,
    read_replies: VecDeque<Bytes>,
    journal: Vec<OpRecord>,
    init_count: usize,
    deinit_count: usize,
    fail_session_init: Option<String>,
    fail_init: Option<String>,
}

/// Scriptable engine handle
///
/// Clones share the same script and journal, so a test keeps one handle
/// and hands a clone (as `Arc<dyn Engine>`) to the session layer.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the outcome of the next connect call. With an empty queue
    /// connect succeeds.
    pub fn enqueue_connect(&self, outcome: Result<()>) {
        self.lock().connect_script.push_back(outcome);
    }

    /// Queue the outcome of the next shutdown call. With an empty queue
    /// shutdown succeeds.
    pub fn enqueue_shutdown(&self, outcome: Result<()>) {
        self.lock().shutdown_script.push_back(outcome);
    }

    /// Queue bytes for the next read call. With an empty queue read
    /// reports clean EOF.
    pub fn enqueue_read(&self, reply: impl Into<Bytes>) {
        self.lock().read_replies.push_back(reply.into());
    }

    /// Make the next `session_init` fail
    pub fn fail_next_session_init(&self, msg: impl Into<String>) {
        self.lock().fail_session_init = Some(msg.into());
    }

    /// Make the next process-wide `init` fail
    pub fn fail_next_init(&self, msg: impl Into<String>) {
        self.lock().fail_init = Some(msg.into());
    }

    /// Snapshot of the op journal
    pub fn records(&self) -> Vec<OpRecord> {
        self.lock().journal.clone()
    }

    /// Number of process-wide init calls the engine has seen
    pub fn init_count(&self) -> usize {
        self.lock().init_count
    }

    /// Number of process-wide deinit calls the engine has seen
    pub fn deinit_count(&self) -> usize {
        self.lock().deinit_count
    }
}

impl Engine for MockEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Mock
    }

    fn init(&self, _config: &TlsConfig) -> Result<()> {
        let mut state = self.lock();
        if let Some(msg) = state.fail_init.take() {
            return Err(Error::EngineInit(msg));
        }
        state.init_count += 1;
        Ok(())
    }

    fn deinit(&self) {
        self.lock().deinit_count += 1;
    }

    fn session_init(&self) -> Result<Box<dyn EngineSession>> {
        let mut state = self.lock();
        if let Some(msg) = state.fail_session_init.take() {
            return Err(Error::EngineInit(msg));
        }
        Ok(Box::new(MockSession {
            engine: self.clone(),
        }))
    }

    fn version_string(&self, buf: &mut [u8]) -> usize {
        let version = b"MockTLS/0.0";
        let n = version.len().min(buf.len());
        buf[..n].copy_from_slice(&version[..n]);
        n
    }

    fn digest(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.len() < 16 {
            return Err(Error::InvalidArgument(format!(
                "digest output buffer holds {} bytes, 16 required",
                output.len()
            )));
        }
        // Not a real digest: position-salted byte fold, deterministic and
        // good enough for cache-key tests.
        output[..16].fill(0);
        for (i, byte) in input.iter().enumerate() {
            output[i % 16] = output[i % 16].wrapping_add(byte.wrapping_mul(i as u8 | 1));
        }
        Ok(16)
    }

    fn supports_status_request(&self) -> bool {
        false
    }
}

struct MockSession {
    engine: MockEngine,
}

impl MockSession {
    fn record(&self, op: MockOp, sess: &Session) {
        let stamped = match op {
            MockOp::Connect => sess.connect_start().is_some(),
            MockOp::Read => sess.read_start().is_some(),
            MockOp::Write => sess.write_start().is_some(),
            MockOp::Shutdown | MockOp::Close => true,
        };
        self.engine.lock().journal.push(OpRecord {
            op,
            state: sess.state(),
            in_use: sess.in_use(),
            stamped,
            hostname: sess.hostname().map(str::to_string),
        });
    }
}

impl EngineSession for MockSession {
    fn connect(&mut self, sess: &mut Session) -> Result<()> {
        self.record(MockOp::Connect, sess);
        let outcome = self
            .engine
            .lock()
            .connect_script
            .pop_front()
            .unwrap_or(Ok(()));
        sess.set_handshake_state(match &outcome {
            Ok(()) => HandshakeState::Done,
            Err(_) => HandshakeState::InProgress,
        });
        outcome
    }

    fn read(&mut self, sess: &mut Session, buf: &mut [u8]) -> Result<usize> {
        self.record(MockOp::Read, sess);
        let mut state = self.engine.lock();
        let Some(reply) = state.read_replies.front_mut() else {
            return Ok(0);
        };
        let n = reply.len().min(buf.len());
        reply.copy_to_slice(&mut buf[..n]);
        if reply.is_empty() {
            state.read_replies.pop_front();
        }
        Ok(n)
    }

    fn write(&mut self, sess: &mut Session, buf: &[u8]) -> Result<usize> {
        self.record(MockOp::Write, sess);
        Ok(buf.len())
    }

    fn shutdown(&mut self, sess: &mut Session) -> Result<()> {
        self.record(MockOp::Shutdown, sess);
        self.engine
            .lock()
            .shutdown_script
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn close(&mut self, sess: &mut Session) {
        self.record(MockOp::Close, sess);
    }
}
