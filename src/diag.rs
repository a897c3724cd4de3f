//! Diagnostic message dispatch
//!
//! Error and debug messages are routed to caller-supplied callbacks stored
//! in a [`TlsConfig`](crate::config::TlsConfig). When no configuration is
//! given, the process-wide default configuration's callbacks are used. A
//! missing callback means the message is dropped; diagnostics are a side
//! channel and never influence control flow.
//!
//! The caller context that a C API would pass alongside the function
//! pointer is captured by the closure itself.

use crate::config::TlsConfig;
use crate::runtime;
use std::sync::Arc;

/// Callback receiving formatted error or debug messages
pub type DiagCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Serialization callback: invoked with `true` to acquire and `false` to
/// release the caller's lock around process-wide initialization
pub type LockCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Deliver an error message through `config`, or through the process-wide
/// default configuration when `config` is `None`
pub fn error(config: Option<&TlsConfig>, msg: &str) {
    match config {
        Some(config) => {
            if let Some(cb) = config.error_callback() {
                cb(msg);
            }
        }
        None => {
            if let Some(default) = runtime::default_config() {
                if let Some(cb) = default.error_callback() {
                    cb(msg);
                }
            }
        }
    }
}

/// Deliver a debug message; same resolution rules as [`error`]
pub fn debug(config: Option<&TlsConfig>, msg: &str) {
    match config {
        Some(config) => {
            if let Some(cb) = config.debug_callback() {
                cb(msg);
            }
        }
        None => {
            if let Some(default) = runtime::default_config() {
                if let Some(cb) = default.debug_callback() {
                    cb(msg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_error_callback_receives_message() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = TlsConfig::builder()
            .error_callback(Arc::new(move |msg: &str| {
                sink.lock().unwrap().push(msg.to_string());
            }))
            .build();

        error(Some(&config), "handshake rejected");
        assert_eq!(seen.lock().unwrap().as_slice(), ["handshake rejected"]);
    }

    #[test]
    fn test_missing_callback_is_silent() {
        let config = TlsConfig::default();
        // Nothing to assert beyond "does not panic": no callback, no dispatch.
        error(Some(&config), "dropped");
        debug(Some(&config), "dropped");
    }

    #[test]
    fn test_context_captured_by_closure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::clone(&counter);
        let config = TlsConfig::builder()
            .debug_callback(Arc::new(move |_msg: &str| {
                ctx.fetch_add(1, Ordering::SeqCst);
            }))
            .build();

        debug(Some(&config), "one");
        debug(Some(&config), "two");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_callback_not_used_for_errors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::clone(&counter);
        let config = TlsConfig::builder()
            .debug_callback(Arc::new(move |_msg: &str| {
                ctx.fetch_add(1, Ordering::SeqCst);
            }))
            .build();

        error(Some(&config), "not for the debug channel");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
