//! Process-wide runtime state
//!
//! The engine and the default configuration live behind explicit paired
//! lifecycle calls: nothing initializes at load time, [`global_init`]
//! counts references, and only the call that brings the count back to
//! zero tears the engine down. Callers that init/deinit from multiple
//! threads are expected to serialize externally; the serialization hook
//! is the configuration's lock callback, which is honored around the whole
//! init sequence and released on every exit path. The internal mutex
//! exists for memory safety, not as a concurrency guarantee.

use crate::config::TlsConfig;
use crate::diag::LockCallback;
use crate::engine::{Engine, EngineKind, OpensslEngine};
use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of [`global_init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// This call performed the one-time engine initialization
    Initialized,
    /// The runtime was already initialized; only the reference count grew
    AlreadyInitialized,
}

struct GlobalState {
    inits: usize,
    engine: Option<Arc<dyn Engine>>,
    default_config: Option<Arc<TlsConfig>>,
}

static STATE: Mutex<GlobalState> = Mutex::new(GlobalState {
    inits: 0,
    engine: None,
    default_config: None,
});

fn state() -> MutexGuard<'static, GlobalState> {
    STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Calls the lock callback with `true` now and `false` on drop, so every
/// exit path releases it.
struct CallbackLock<'a>(&'a LockCallback);

impl<'a> CallbackLock<'a> {
    fn acquire(cb: &'a LockCallback) -> Self {
        cb(true);
        CallbackLock(cb)
    }
}

impl Drop for CallbackLock<'_> {
    fn drop(&mut self) {
        (self.0)(false);
    }
}

/// Initialize the runtime with the default (OpenSSL) engine
///
/// The supplied configuration (or the static default when `None`) is
/// cloned into the process-wide default that sessions created without an
/// explicit configuration bind to. Only the first call does engine work;
/// later calls just grow the reference count and report
/// [`InitStatus::AlreadyInitialized`]. An engine failure rolls the count
/// back so a retry is possible.
pub fn global_init(config: Option<&TlsConfig>) -> Result<InitStatus> {
    global_init_with(Arc::new(OpensslEngine), config)
}

/// Initialize the runtime with a caller-supplied engine
pub fn global_init_with(engine: Arc<dyn Engine>, config: Option<&TlsConfig>) -> Result<InitStatus> {
    let _serialized = config
        .and_then(TlsConfig::lock_callback)
        .map(CallbackLock::acquire);

    let mut state = state();
    state.inits += 1;
    if state.inits > 1 {
        return Ok(InitStatus::AlreadyInitialized);
    }

    let default = config.cloned().unwrap_or_default();
    if let Err(err) = engine.init(&default) {
        // Allow a later retry.
        state.inits = 0;
        return Err(err);
    }
    state.default_config = Some(Arc::new(default));
    state.engine = Some(engine);
    Ok(InitStatus::Initialized)
}

/// Drop one runtime reference; the last one tears the engine down and
/// releases the process-wide default configuration
///
/// Calling this more often than [`global_init`] is a no-op.
pub fn global_deinit() {
    let mut state = state();
    match state.inits {
        0 => {}
        1 => {
            state.inits = 0;
            if let Some(engine) = state.engine.take() {
                engine.deinit();
            }
            state.default_config = None;
        }
        _ => state.inits -= 1,
    }
}

/// Identity of the engine sessions will be driven by
///
/// Before initialization this is the linked default.
pub fn engine_kind() -> EngineKind {
    state()
        .engine
        .as_ref()
        .map(|e| e.kind())
        .unwrap_or(EngineKind::OpenSsl)
}

/// Format the engine name/version into `buf`, returning the bytes written
pub fn version_string(buf: &mut [u8]) -> usize {
    match state().engine.as_ref() {
        Some(engine) => engine.version_string(buf),
        None => OpensslEngine.version_string(buf),
    }
}

/// Engine digest primitive (MD5), for cache-key computation
pub fn digest(input: &[u8], output: &mut [u8]) -> Result<usize> {
    match state().engine.as_ref() {
        Some(engine) => engine.digest(input, output),
        None => OpensslEngine.digest(input, output),
    }
}

/// Whether the engine supports the certificate status (OCSP) extension
pub fn supports_status_request() -> bool {
    state()
        .engine
        .as_ref()
        .map(|e| e.supports_status_request())
        .unwrap_or_else(|| OpensslEngine.supports_status_request())
}

/// The active engine and default configuration, if initialized
pub(crate) fn current() -> Option<(Arc<dyn Engine>, Arc<TlsConfig>)> {
    let state = state();
    match (&state.engine, &state.default_config) {
        (Some(engine), Some(config)) => Some((Arc::clone(engine), Arc::clone(config))),
        _ => None,
    }
}

/// The process-wide default configuration, if initialized
pub(crate) fn default_config() -> Option<Arc<TlsConfig>> {
    state().default_config.clone()
}
