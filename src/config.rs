//! TLS configuration
//!
//! A [`TlsConfig`] is an immutable bag of policy settings: verification
//! toggles, trust material paths, timeouts and diagnostic callbacks. It is
//! built once and then shared read-only by any number of sessions, so
//! every string field owns its storage and cloning is a deep copy.
//!
//! Two construction paths exist: the typed [`TlsConfigBuilder`] and
//! [`TlsConfig::from_pairs`], which applies an ordered list of string
//! `(key, value)` pairs and rejects the whole construction on the first
//! unrecognized key.

use crate::diag::{self, DiagCallback, LockCallback};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Lowest TLS protocol version the client will accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// SSL 3.0 (deprecated, rarely used)
    Ssl3,
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl FromStr for TlsVersion {
    type Err = Error;

    /// Parse TLS version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "SSLV3" | "SSL3" => Ok(TlsVersion::Ssl3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(Error::InvalidArgument(format!("invalid TLS version: {s}"))),
        }
    }
}

/// Authentication scheme for connections that don't use certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// Certificate-based (or anonymous) authentication
    #[default]
    None,
    /// TLS-SRP username/password authentication
    Srp,
}

/// On-disk encoding of the client certificate and key files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertFormat {
    #[default]
    Pem,
    Der,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30 * 1000);

/// TLS policy settings (immutable after construction)
///
/// Sessions hold a shared reference to their configuration for their whole
/// life; nothing in this type can be mutated after `build()`.
#[derive(Clone)]
pub struct TlsConfig {
    version: TlsVersion,
    verify_peer: bool,
    verify_host: bool,
    verify_status: bool,
    ca_path: Option<String>,
    ca_file: Option<String>,
    crl_file: Option<String>,
    cert_file: Option<String>,
    key_file: Option<String>,
    issuer_file: Option<String>,
    random_file: Option<String>,
    egd_socket: Option<String>,
    cipher_list: Option<String>,
    username: Option<String>,
    password: Option<String>,
    auth_type: AuthType,
    cert_format: CertFormat,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    lock_callback: Option<LockCallback>,
    error_callback: Option<DiagCallback>,
    debug_callback: Option<DiagCallback>,
}

impl Default for TlsConfig {
    /// The static default: TLSv1.0 floor, full verification, 30 s timeouts
    fn default() -> Self {
        TlsConfig {
            version: TlsVersion::Tls10,
            verify_peer: true,
            verify_host: true,
            verify_status: true,
            ca_path: None,
            ca_file: None,
            crl_file: None,
            cert_file: None,
            key_file: None,
            issuer_file: None,
            random_file: None,
            egd_socket: None,
            cipher_list: None,
            username: None,
            password: None,
            auth_type: AuthType::None,
            cert_format: CertFormat::Pem,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            lock_callback: None,
            error_callback: None,
            debug_callback: None,
        }
    }
}

impl TlsConfig {
    /// Create a new configuration builder seeded from the defaults
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::new()
    }

    /// Build a configuration from an ordered list of `(key, value)` pairs
    ///
    /// Recognized keys: `tls-version`, `verify-peer`, `verify-host`,
    /// `verify-status`, `ca-path`, `ca-file`, `crl-file`, `issuer-file`,
    /// `random-file`, `egd-socket`, `cipher-list`, `connect-timeout-ms`,
    /// `read-timeout-ms`, `write-timeout-ms`. A `None` value unsets a
    /// string option. The first unrecognized key aborts the whole
    /// construction with [`Error::UnknownOption`] and reports a diagnostic
    /// naming the key.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<TlsConfig>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut builder = TlsConfigBuilder::new();
        for (key, value) in pairs {
            builder.apply(key, value)?;
        }
        Ok(builder.build())
    }

    /// Structural equality over the fields that determine handshake identity
    ///
    /// Compares the version floor, the three verify flags, and
    /// (ASCII-case-insensitively) the nine path/string fields. Timeouts,
    /// auth settings and callbacks are deliberately excluded: two
    /// configurations that match here will negotiate identical sessions,
    /// which is the equivalence that matters for session reuse.
    pub fn matches(&self, other: &TlsConfig) -> bool {
        self.version == other.version
            && self.verify_peer == other.verify_peer
            && self.verify_host == other.verify_host
            && self.verify_status == other.verify_status
            && ascii_eq(self.ca_path.as_deref(), other.ca_path.as_deref())
            && ascii_eq(self.ca_file.as_deref(), other.ca_file.as_deref())
            && ascii_eq(self.crl_file.as_deref(), other.crl_file.as_deref())
            && ascii_eq(self.cert_file.as_deref(), other.cert_file.as_deref())
            && ascii_eq(self.key_file.as_deref(), other.key_file.as_deref())
            && ascii_eq(self.issuer_file.as_deref(), other.issuer_file.as_deref())
            && ascii_eq(self.random_file.as_deref(), other.random_file.as_deref())
            && ascii_eq(self.egd_socket.as_deref(), other.egd_socket.as_deref())
            && ascii_eq(self.cipher_list.as_deref(), other.cipher_list.as_deref())
    }

    pub fn version(&self) -> TlsVersion {
        self.version
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn verify_host(&self) -> bool {
        self.verify_host
    }

    pub fn verify_status(&self) -> bool {
        self.verify_status
    }

    pub fn ca_path(&self) -> Option<&str> {
        self.ca_path.as_deref()
    }

    pub fn ca_file(&self) -> Option<&str> {
        self.ca_file.as_deref()
    }

    pub fn crl_file(&self) -> Option<&str> {
        self.crl_file.as_deref()
    }

    pub fn cert_file(&self) -> Option<&str> {
        self.cert_file.as_deref()
    }

    pub fn key_file(&self) -> Option<&str> {
        self.key_file.as_deref()
    }

    pub fn issuer_file(&self) -> Option<&str> {
        self.issuer_file.as_deref()
    }

    pub fn random_file(&self) -> Option<&str> {
        self.random_file.as_deref()
    }

    pub fn egd_socket(&self) -> Option<&str> {
        self.egd_socket.as_deref()
    }

    pub fn cipher_list(&self) -> Option<&str> {
        self.cipher_list.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    pub fn cert_format(&self) -> CertFormat {
        self.cert_format
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn lock_callback(&self) -> Option<&LockCallback> {
        self.lock_callback.as_ref()
    }

    pub fn error_callback(&self) -> Option<&DiagCallback> {
        self.error_callback.as_ref()
    }

    pub fn debug_callback(&self) -> Option<&DiagCallback> {
        self.debug_callback.as_ref()
    }
}

fn ascii_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("version", &self.version)
            .field("verify_peer", &self.verify_peer)
            .field("verify_host", &self.verify_host)
            .field("verify_status", &self.verify_status)
            .field("ca_path", &self.ca_path)
            .field("ca_file", &self.ca_file)
            .field("crl_file", &self.crl_file)
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("issuer_file", &self.issuer_file)
            .field("random_file", &self.random_file)
            .field("egd_socket", &self.egd_socket)
            .field("cipher_list", &self.cipher_list)
            .field("auth_type", &self.auth_type)
            .field("cert_format", &self.cert_format)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("lock_callback", &self.lock_callback.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .field("debug_callback", &self.debug_callback.is_some())
            .finish()
    }
}

/// Configuration builder
///
/// Starts from the defaults; every setter overrides one field. String
/// options can be unset again through the keyed [`set`](Self::set) path.
pub struct TlsConfigBuilder {
    cfg: TlsConfig,
}

impl TlsConfigBuilder {
    fn new() -> Self {
        TlsConfigBuilder {
            cfg: TlsConfig::default(),
        }
    }

    /// Set the TLS protocol version floor
    pub fn version(mut self, version: TlsVersion) -> Self {
        self.cfg.version = version;
        self
    }

    /// Enable/disable peer certificate verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.cfg.verify_peer = verify;
        self
    }

    /// Enable/disable hostname matching against the peer certificate
    pub fn verify_host(mut self, verify: bool) -> Self {
        self.cfg.verify_host = verify;
        self
    }

    /// Enable/disable certificate status (OCSP) checking
    pub fn verify_status(mut self, verify: bool) -> Self {
        self.cfg.verify_status = verify;
        self
    }

    /// Directory of trusted CA certificates
    pub fn ca_path(mut self, path: impl Into<String>) -> Self {
        self.cfg.ca_path = Some(path.into());
        self
    }

    /// File of trusted CA certificates to verify the peer against
    pub fn ca_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.ca_file = Some(path.into());
        self
    }

    /// CRL file for certificate revocation checks
    pub fn crl_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.crl_file = Some(path.into());
        self
    }

    /// Client certificate file
    pub fn cert_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.cert_file = Some(path.into());
        self
    }

    /// Client private key file (defaults to the certificate file)
    pub fn key_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.key_file = Some(path.into());
        self
    }

    /// Expected issuer certificate of the peer
    pub fn issuer_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.issuer_file = Some(path.into());
        self
    }

    /// File containing seed data for the engine RNG
    pub fn random_file(mut self, path: impl Into<String>) -> Self {
        self.cfg.random_file = Some(path.into());
        self
    }

    /// Path to an entropy-gathering daemon socket
    pub fn egd_socket(mut self, path: impl Into<String>) -> Self {
        self.cfg.egd_socket = Some(path.into());
        self
    }

    /// Cipher list handed to the engine
    pub fn cipher_list(mut self, ciphers: impl Into<String>) -> Self {
        self.cfg.cipher_list = Some(ciphers.into());
        self
    }

    /// Username for non-certificate (SRP) authentication
    pub fn username(mut self, name: impl Into<String>) -> Self {
        self.cfg.username = Some(name.into());
        self
    }

    /// Password for non-certificate (SRP) authentication
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.cfg.password = Some(password.into());
        self
    }

    /// Authentication scheme
    pub fn auth_type(mut self, auth: AuthType) -> Self {
        self.cfg.auth_type = auth;
        self
    }

    /// Encoding of the certificate and key files
    pub fn cert_format(mut self, format: CertFormat) -> Self {
        self.cfg.cert_format = format;
        self
    }

    /// Handshake timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.connect_timeout = timeout;
        self
    }

    /// Record-read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.read_timeout = timeout;
        self
    }

    /// Record-write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.write_timeout = timeout;
        self
    }

    /// Serialization callback invoked around process-wide init/deinit
    pub fn lock_callback(mut self, cb: LockCallback) -> Self {
        self.cfg.lock_callback = Some(cb);
        self
    }

    /// Callback receiving error messages (context captured by the closure)
    pub fn error_callback(mut self, cb: DiagCallback) -> Self {
        self.cfg.error_callback = Some(cb);
        self
    }

    /// Callback receiving debug messages (context captured by the closure)
    pub fn debug_callback(mut self, cb: DiagCallback) -> Self {
        self.cfg.debug_callback = Some(cb);
        self
    }

    /// Apply one string-keyed option
    ///
    /// See [`TlsConfig::from_pairs`] for the recognized keys. Callbacks
    /// have no string form and are set through the typed methods.
    pub fn set(mut self, key: &str, value: Option<&str>) -> Result<Self> {
        self.apply(key, value)?;
        Ok(self)
    }

    fn apply(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str> {
            value.ok_or_else(|| Error::InvalidArgument(format!("option {key} requires a value")))
        }

        fn parse_bool(key: &str, value: Option<&str>) -> Result<bool> {
            match required(key, value)? {
                "1" | "true" | "TRUE" | "True" => Ok(true),
                "0" | "false" | "FALSE" | "False" => Ok(false),
                other => Err(Error::InvalidArgument(format!(
                    "option {key} expects a boolean, got {other:?}"
                ))),
            }
        }

        fn parse_ms(key: &str, value: Option<&str>) -> Result<Duration> {
            let raw = required(key, value)?;
            let ms: u64 = raw.parse().map_err(|_| {
                Error::InvalidArgument(format!("option {key} expects milliseconds, got {raw:?}"))
            })?;
            Ok(Duration::from_millis(ms))
        }

        match key {
            "tls-version" => self.cfg.version = required(key, value)?.parse()?,
            "verify-peer" => self.cfg.verify_peer = parse_bool(key, value)?,
            "verify-host" => self.cfg.verify_host = parse_bool(key, value)?,
            "verify-status" => self.cfg.verify_status = parse_bool(key, value)?,
            "ca-path" => self.cfg.ca_path = value.map(str::to_string),
            "ca-file" => self.cfg.ca_file = value.map(str::to_string),
            "crl-file" => self.cfg.crl_file = value.map(str::to_string),
            "issuer-file" => self.cfg.issuer_file = value.map(str::to_string),
            "random-file" => self.cfg.random_file = value.map(str::to_string),
            "egd-socket" => self.cfg.egd_socket = value.map(str::to_string),
            "cipher-list" => self.cfg.cipher_list = value.map(str::to_string),
            "connect-timeout-ms" => self.cfg.connect_timeout = parse_ms(key, value)?,
            "read-timeout-ms" => self.cfg.read_timeout = parse_ms(key, value)?,
            "write-timeout-ms" => self.cfg.write_timeout = parse_ms(key, value)?,
            _ => {
                let msg = format!("unknown configuration key: {key}");
                if self.cfg.error_callback.is_some() {
                    diag::error(Some(&self.cfg), &msg);
                } else {
                    diag::error(None, &msg);
                }
                return Err(Error::UnknownOption(key.to_string()));
            }
        }
        Ok(())
    }

    /// Build the configuration
    pub fn build(self) -> TlsConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_tls_version_parsing() {
        assert_eq!("TLSv1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("tlsv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert_eq!("TLS1.0".parse::<TlsVersion>().unwrap(), TlsVersion::Tls10);
        assert!("invalid".parse::<TlsVersion>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = TlsConfig::default();
        assert_eq!(config.version(), TlsVersion::Tls10);
        assert!(config.verify_peer());
        assert!(config.verify_host());
        assert!(config.verify_status());
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.ca_path(), None);
        assert_eq!(config.auth_type(), AuthType::None);
        assert_eq!(config.cert_format(), CertFormat::Pem);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = TlsConfig::builder()
            .version(TlsVersion::Tls12)
            .verify_peer(false)
            .ca_file("/etc/ssl/ca.pem")
            .cipher_list("DEFAULT")
            .connect_timeout(Duration::from_millis(5000))
            .build();

        assert_eq!(config.version(), TlsVersion::Tls12);
        assert!(!config.verify_peer());
        assert_eq!(config.ca_file(), Some("/etc/ssl/ca.pem"));
        assert_eq!(config.cipher_list(), Some("DEFAULT"));
        assert_eq!(config.connect_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_from_pairs_applies_in_order() {
        let config = TlsConfig::from_pairs([
            ("tls-version", Some("TLSv1.2")),
            ("verify-peer", Some("1")),
            ("verify-host", Some("0")),
            ("ca-path", Some("/etc/ssl/certs")),
            ("ca-path", None), // later pair unsets the earlier one
            ("connect-timeout-ms", Some("15000")),
        ])
        .unwrap();

        assert_eq!(config.version(), TlsVersion::Tls12);
        assert!(config.verify_peer());
        assert!(!config.verify_host());
        assert_eq!(config.ca_path(), None);
        assert_eq!(config.connect_timeout(), Duration::from_millis(15000));
    }

    #[test]
    fn test_from_pairs_unknown_key_aborts() {
        let result = TlsConfig::from_pairs([
            ("verify-peer", Some("1")),
            ("no-such-option", Some("x")),
        ]);
        match result {
            Err(Error::UnknownOption(key)) => assert_eq!(key, "no-such-option"),
            other => panic!("expected UnknownOption, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_key_reported_to_own_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result = TlsConfig::builder()
            .error_callback(Arc::new(move |msg: &str| {
                sink.lock().unwrap().push(msg.to_string());
            }))
            .set("bogus-key", Some("1"));

        assert!(matches!(result, Err(Error::UnknownOption(_))));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("bogus-key"));
    }

    #[test]
    fn test_from_pairs_bad_values() {
        assert!(matches!(
            TlsConfig::from_pairs([("verify-peer", Some("maybe"))]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TlsConfig::from_pairs([("connect-timeout-ms", Some("soon"))]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TlsConfig::from_pairs([("verify-peer", None)]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clone_matches_source() {
        let config = TlsConfig::builder()
            .version(TlsVersion::Tls13)
            .ca_file("/ca.pem")
            .cipher_list("HIGH")
            .build();
        let copy = config.clone();
        assert!(config.matches(&copy));
        assert!(copy.matches(&config));
    }

    #[test]
    fn test_clone_is_storage_independent() {
        let config = TlsConfig::builder().ca_file("/ca.pem").build();
        let copy = config.clone();
        // Owned heap copies, not shared storage.
        assert_ne!(
            config.ca_file().unwrap().as_ptr(),
            copy.ca_file().unwrap().as_ptr()
        );
        assert_eq!(copy.ca_file(), Some("/ca.pem"));
    }

    #[test]
    fn test_matches_is_reflexive() {
        let config = TlsConfig::builder().ca_file("/ca.pem").build();
        assert!(config.matches(&config));
    }

    #[test]
    fn test_matches_string_fields_case_insensitive() {
        let a = TlsConfig::builder().ca_file("/CA.PEM").build();
        let b = TlsConfig::builder().ca_file("/ca.pem").build();
        assert!(a.matches(&b));
        assert!(b.matches(&a));
    }

    #[test]
    fn test_matches_none_vs_some_is_false() {
        let a = TlsConfig::builder().ca_file("/ca.pem").build();
        let b = TlsConfig::default();
        assert!(!a.matches(&b));
        assert!(!b.matches(&a));
        // Both unset compares equal.
        assert!(TlsConfig::default().matches(&TlsConfig::default()));
    }

    #[test]
    fn test_matches_differs_on_verify_flags() {
        let a = TlsConfig::builder().verify_status(true).build();
        let b = TlsConfig::builder().verify_status(false).build();
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_matches_ignores_timeouts_and_auth() {
        // The comparison is handshake identity only; timeout and auth
        // fields are excluded on purpose. This test pins that narrowness.
        let a = TlsConfig::builder()
            .connect_timeout(Duration::from_secs(1))
            .username("alice")
            .auth_type(AuthType::Srp)
            .build();
        let b = TlsConfig::default();
        assert!(a.matches(&b));
    }
}
