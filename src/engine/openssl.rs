//! OpenSSL-backed TLS engine
//!
//! The default engine. Each session builds its `SslContext` from the bound
//! configuration at connect time, so many sessions can share one
//! configuration without coordination. The handshake runs synchronously on
//! a duplicate of the session's socket handle; on a non-blocking socket the
//! mid-handshake stream is parked between `WouldBlock` returns and the next
//! connect call resumes it.

use crate::config::{AuthType, CertFormat, TlsConfig, TlsVersion};
use crate::diag;
use crate::engine::{Engine, EngineKind, EngineSession};
use crate::error::{Error, Result};
use crate::session::{HandshakeState, Session};
use openssl::hash::{hash, MessageDigest};
use openssl::ssl::{
    ErrorCode, HandshakeError, MidHandshakeSslStream, Ssl, SslContextBuilder, SslFiletype,
    SslMethod, SslStream, SslVerifyMode, SslVersion, StatusType,
};
use openssl::x509::store::{X509Lookup, X509StoreBuilder};
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509VerifyResult, X509};
use socket2::Socket;
use std::io::ErrorKind;
use std::time::Duration;

/// MD5 digest length in bytes
const DIGEST_LEN: usize = 16;

/// The OpenSSL engine
pub struct OpensslEngine;

impl Engine for OpensslEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::OpenSsl
    }

    fn init(&self, config: &TlsConfig) -> Result<()> {
        openssl::init();
        if config.random_file().is_some() {
            // OpenSSL 1.1+ seeds its RNG itself; an explicit seed file is
            // accepted for configuration compatibility but not consumed.
            diag::debug(Some(config), "random-file ignored: engine RNG is self-seeding");
        }
        if config.egd_socket().is_some() {
            diag::debug(Some(config), "egd-socket not supported by this engine");
        }
        Ok(())
    }

    fn deinit(&self) {
        // OpenSSL 1.1+ deinitializes itself at process exit.
    }

    fn session_init(&self) -> Result<Box<dyn EngineSession>> {
        Ok(Box::new(OpensslSession {
            stream: StreamState::Idle,
        }))
    }

    fn version_string(&self, buf: &mut [u8]) -> usize {
        let version = openssl::version::version();
        let n = version.len().min(buf.len());
        buf[..n].copy_from_slice(&version.as_bytes()[..n]);
        n
    }

    fn digest(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.len() < DIGEST_LEN {
            return Err(Error::InvalidArgument(format!(
                "digest output buffer holds {} bytes, {DIGEST_LEN} required",
                output.len()
            )));
        }
        let sum = hash(MessageDigest::md5(), input)?;
        output[..DIGEST_LEN].copy_from_slice(&sum);
        Ok(DIGEST_LEN)
    }

    fn supports_status_request(&self) -> bool {
        true
    }
}

enum StreamState {
    Idle,
    Handshaking(MidHandshakeSslStream<Socket>),
    Active(SslStream<Socket>),
    Closed,
}

/// Engine-private per-session state
pub struct OpensslSession {
    stream: StreamState,
}

impl EngineSession for OpensslSession {
    fn connect(&mut self, sess: &mut Session) -> Result<()> {
        match std::mem::replace(&mut self.stream, StreamState::Closed) {
            StreamState::Idle => {
                let ssl = new_ssl(sess)?;
                let socket = handshake_socket(sess)?;
                sess.set_handshake_state(HandshakeState::InProgress);
                self.finish_handshake(sess, ssl.connect(socket))
            }
            StreamState::Handshaking(mid) => self.finish_handshake(sess, mid.handshake()),
            StreamState::Active(stream) => {
                // Connect on an established session is a no-op.
                self.stream = StreamState::Active(stream);
                Ok(())
            }
            StreamState::Closed => Err(Error::InvalidArgument(
                "connect on a closed TLS session".to_string(),
            )),
        }
    }

    fn read(&mut self, sess: &mut Session, buf: &mut [u8]) -> Result<usize> {
        let StreamState::Active(stream) = &mut self.stream else {
            return Err(Error::InvalidArgument(
                "read on a session that is not connected".to_string(),
            ));
        };
        match stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(err) => match err.code() {
                ErrorCode::ZERO_RETURN => Ok(0), // clean close-notify from the peer
                ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Err(Error::WouldBlock),
                _ => {
                    let err = map_stream_error(err);
                    diag::error(Some(sess.config()), &format!("TLS read failed: {err}"));
                    Err(err)
                }
            },
        }
    }

    fn write(&mut self, sess: &mut Session, buf: &[u8]) -> Result<usize> {
        let StreamState::Active(stream) = &mut self.stream else {
            return Err(Error::InvalidArgument(
                "write on a session that is not connected".to_string(),
            ));
        };
        match stream.ssl_write(buf) {
            Ok(n) => Ok(n),
            Err(err) => match err.code() {
                ErrorCode::ZERO_RETURN => Err(Error::Negotiation(
                    "peer closed the TLS connection".to_string(),
                )),
                ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Err(Error::WouldBlock),
                _ => {
                    let err = map_stream_error(err);
                    diag::error(Some(sess.config()), &format!("TLS write failed: {err}"));
                    Err(err)
                }
            },
        }
    }

    fn shutdown(&mut self, sess: &mut Session) -> Result<()> {
        let StreamState::Active(stream) = &mut self.stream else {
            return Err(Error::ShutdownFailed(
                "shutdown on a session that is not connected".to_string(),
            ));
        };
        match stream.shutdown() {
            Ok(_) => {
                diag::debug(Some(sess.config()), "close-notify sent");
                Ok(())
            }
            Err(err) => match err.code() {
                ErrorCode::ZERO_RETURN => Ok(()),
                ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Err(Error::WouldBlock),
                _ => Err(Error::ShutdownFailed(err.to_string())),
            },
        }
    }

    fn close(&mut self, _sess: &mut Session) {
        // Drops the stream and with it the duplicated socket handle; the
        // caller's own descriptor stays open.
        self.stream = StreamState::Closed;
    }
}

impl OpensslSession {
    fn finish_handshake(
        &mut self,
        sess: &mut Session,
        res: std::result::Result<SslStream<Socket>, HandshakeError<Socket>>,
    ) -> Result<()> {
        match res {
            Ok(stream) => {
                check_issuer(sess.config(), &stream)?;
                apply_io_timeouts(sess.config(), stream.get_ref());
                sess.set_handshake_state(HandshakeState::Done);
                let cipher = stream
                    .ssl()
                    .current_cipher()
                    .map(|c| c.name())
                    .unwrap_or("<none>");
                diag::debug(
                    Some(sess.config()),
                    &format!("negotiated {} with {cipher}", stream.ssl().version_str()),
                );
                self.stream = StreamState::Active(stream);
                Ok(())
            }
            Err(HandshakeError::WouldBlock(mid)) => {
                self.stream = StreamState::Handshaking(mid);
                Err(Error::WouldBlock)
            }
            Err(HandshakeError::SetupFailure(err)) => {
                self.stream = StreamState::Closed;
                Err(Error::from(err))
            }
            Err(HandshakeError::Failure(mid)) => {
                self.stream = StreamState::Closed;
                let msg = mid.error().to_string();
                diag::error(Some(sess.config()), &format!("TLS handshake failed: {msg}"));
                Err(Error::Negotiation(msg))
            }
        }
    }
}

/// Build an `Ssl` handle from the session's configuration
fn new_ssl(sess: &Session) -> Result<Ssl> {
    let config = sess.config();
    let mut builder = SslContextBuilder::new(SslMethod::tls_client())?;
    builder.set_min_proto_version(Some(min_proto(config.version())))?;

    if config.verify_peer() {
        builder.set_verify(SslVerifyMode::PEER);
        install_trust_material(&mut builder, config)?;
    } else {
        builder.set_verify(SslVerifyMode::NONE);
    }

    if let Some(ciphers) = config.cipher_list() {
        builder.set_cipher_list(ciphers)?;
    }

    if config.auth_type() == AuthType::Srp {
        diag::debug(Some(config), "TLS-SRP is not supported by this engine");
    }

    if let Some(cert) = config.cert_file() {
        let filetype = match config.cert_format() {
            CertFormat::Pem => SslFiletype::PEM,
            CertFormat::Der => SslFiletype::ASN1,
        };
        builder.set_certificate_file(cert, filetype)?;
        // A missing key file means the key lives in the certificate file.
        builder.set_private_key_file(config.key_file().unwrap_or(cert), filetype)?;
        builder.check_private_key()?;
    }

    let ctx = builder.build();
    let mut ssl = Ssl::new(&ctx)?;

    if let Some(hostname) = sess.hostname() {
        ssl.set_hostname(hostname)?;
        if config.verify_peer() && config.verify_host() {
            ssl.param_mut().set_host(hostname)?;
        }
    }
    if config.verify_status() {
        ssl.set_status_type(StatusType::OCSP)?;
    }

    Ok(ssl)
}

/// Load CA file/path and CRL settings into the context
fn install_trust_material(builder: &mut SslContextBuilder, config: &TlsConfig) -> Result<()> {
    if config.ca_path().is_some() || config.crl_file().is_some() {
        let mut store = X509StoreBuilder::new()?;
        if let Some(dir) = config.ca_path() {
            let lookup = store.add_lookup(X509Lookup::hash_dir())?;
            lookup.add_dir(dir, SslFiletype::PEM)?;
        }
        if let Some(crl) = config.crl_file() {
            let lookup = store.add_lookup(X509Lookup::file())?;
            lookup.load_crl_file(crl, SslFiletype::PEM)?;
            store.set_flags(X509VerifyFlags::CRL_CHECK | X509VerifyFlags::CRL_CHECK_ALL)?;
        }
        builder.set_cert_store(store.build());
    }

    if let Some(file) = config.ca_file() {
        builder.set_ca_file(file)?;
    } else if config.ca_path().is_none() {
        builder.set_default_verify_paths()?;
    }

    Ok(())
}

/// Enforce the configured issuer certificate against the negotiated peer
fn check_issuer(config: &TlsConfig, stream: &SslStream<Socket>) -> Result<()> {
    let Some(issuer_file) = config.issuer_file() else {
        return Ok(());
    };
    let pem = std::fs::read(issuer_file)?;
    let issuer = X509::from_pem(&pem).or_else(|_| X509::from_der(&pem))?;
    let peer = stream.ssl().peer_certificate().ok_or_else(|| {
        Error::Negotiation("peer presented no certificate to check the issuer of".to_string())
    })?;
    if issuer.issued(&peer) != X509VerifyResult::OK {
        return Err(Error::Negotiation(format!(
            "peer certificate was not issued by {issuer_file}"
        )));
    }
    Ok(())
}

/// Duplicate the session's socket handle for the handshake
fn handshake_socket(sess: &Session) -> Result<Socket> {
    let socket = sess
        .socket()
        .ok_or_else(|| Error::InvalidArgument("no socket bound to the session".to_string()))?;
    let socket = socket.try_clone()?;
    // The whole handshake runs under the connect timeout; read/write
    // timeouts take over once the session is established. Timeouts only
    // matter on blocking sockets; a zero timeout means unlimited.
    let t = sock_timeout(sess.config().connect_timeout());
    socket.set_read_timeout(t)?;
    socket.set_write_timeout(t)?;
    Ok(socket)
}

fn apply_io_timeouts(config: &TlsConfig, socket: &Socket) {
    let _ = socket.set_read_timeout(sock_timeout(config.read_timeout()));
    let _ = socket.set_write_timeout(sock_timeout(config.write_timeout()));
}

fn sock_timeout(t: Duration) -> Option<Duration> {
    (!t.is_zero()).then_some(t)
}

fn min_proto(version: TlsVersion) -> SslVersion {
    match version {
        TlsVersion::Ssl3 => SslVersion::SSL3,
        TlsVersion::Tls10 => SslVersion::TLS1,
        TlsVersion::Tls11 => SslVersion::TLS1_1,
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

fn map_stream_error(err: openssl::ssl::Error) -> Error {
    match err.into_io_error() {
        Ok(io) if io.kind() == ErrorKind::WouldBlock || io.kind() == ErrorKind::TimedOut => {
            Error::WouldBlock
        }
        Ok(io) => Error::Io(io),
        Err(err) => Error::Negotiation(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(OpensslEngine.kind(), EngineKind::OpenSsl);
    }

    #[test]
    fn test_md5_digest_vector() {
        let mut out = [0u8; DIGEST_LEN];
        let n = OpensslEngine.digest(b"hello", &mut out).unwrap();
        assert_eq!(n, DIGEST_LEN);
        let hex: String = out.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_digest_rejects_short_buffer() {
        let mut out = [0u8; 8];
        assert!(matches!(
            OpensslEngine.digest(b"hello", &mut out),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_version_string_bounded() {
        let mut big = [0u8; 256];
        let n = OpensslEngine.version_string(&mut big);
        assert!(n > 0);
        assert!(std::str::from_utf8(&big[..n]).unwrap().contains("OpenSSL"));

        let mut small = [0u8; 4];
        assert_eq!(OpensslEngine.version_string(&mut small), 4);
    }

    #[test]
    fn test_status_request_supported() {
        assert!(OpensslEngine.supports_status_request());
    }

    #[test]
    fn test_proto_floor_mapping() {
        assert_eq!(min_proto(TlsVersion::Tls12), SslVersion::TLS1_2);
        assert_eq!(min_proto(TlsVersion::Tls13), SslVersion::TLS1_3);
    }
}
