//! SSH session setup: TCP connect with timeout, handshake, host-key
//! pinning and authentication.
//!
//! Everything here blocks; callers run it off the async executor.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use shotlift_core::{ConnectionInfo, TransferError, TransferResult};
use ssh2::{HashType, Session};
use std::net::{TcpStream, ToSocketAddrs};

/// Open an authenticated SSH session.
///
/// Every failure is a connection error carrying the hostname.
pub fn open_session(info: &ConnectionInfo) -> TransferResult<Session> {
    let host = info.host();
    let addr = (host, info.port())
        .to_socket_addrs()
        .map_err(|e| TransferError::connection_failed(host, format!("Cannot resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| TransferError::connection_failed(host, format!("No address for {}", host)))?;

    info!("SFTP connecting to {}", addr);
    let tcp = TcpStream::connect_timeout(&addr, info.timeout())
        .map_err(|e| TransferError::connection_failed(host, format!("TCP connection to {} failed: {}", addr, e)))?;

    let mut session = Session::new()
        .map_err(|e| TransferError::connection_failed(host, format!("Failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(info.timeout().as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| TransferError::connection_failed(host, format!("SSH handshake failed: {}", e)))?;

    if let Some(expected) = info.host_key_fingerprint() {
        verify_host_key(&session, host, expected)?;
    }

    authenticate(&mut session, info)?;
    Ok(session)
}

// ── Host key ────────────────────────────────────────────────────────────────

/// OpenSSH-style `SHA256:<base64>` fingerprint of the server's host key.
pub fn host_key_fingerprint(session: &Session) -> Option<String> {
    session
        .host_key_hash(HashType::Sha256)
        .map(|hash| format!("SHA256:{}", STANDARD.encode(hash)))
}

/// Compare fingerprints ignoring the `SHA256:` prefix and base64 padding.
pub fn fingerprints_match(expected: &str, actual: &str) -> bool {
    fn normalize(fp: &str) -> &str {
        let fp = fp.trim();
        fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
    }
    !normalize(expected).is_empty() && normalize(expected) == normalize(actual)
}

fn verify_host_key(session: &Session, host: &str, expected: &str) -> TransferResult<()> {
    let actual = host_key_fingerprint(session)
        .ok_or_else(|| TransferError::connection_failed(host, "Server offered no host key"))?;
    if !fingerprints_match(expected, &actual) {
        return Err(TransferError::connection_failed(
            host,
            format!("Host key mismatch: expected {}, server presented {}", expected, actual),
        ));
    }
    debug!("Host key for {} verified: {}", host, actual);
    Ok(())
}

// ── Authentication ──────────────────────────────────────────────────────────

/// Private key first, password second.
///
/// A key that cannot be used is logged and the password is tried; only
/// when nothing authenticates does this fail.
fn authenticate(session: &mut Session, info: &ConnectionInfo) -> TransferResult<()> {
    let user = info.username();

    if let Some(key_path) = info.private_key_path() {
        match session.userauth_pubkey_file(user, None, key_path, None) {
            Ok(()) if session.authenticated() => {
                info!("SFTP authenticated as {} via publickey", user);
                return Ok(());
            }
            Ok(()) => warn!("Key {} was not accepted, trying password", key_path.display()),
            Err(e) => warn!("Key authentication with {} failed, trying password: {}", key_path.display(), e),
        }
    }

    if let Some(password) = info.password() {
        if session.userauth_password(user, password).is_ok() && session.authenticated() {
            info!("SFTP authenticated as {} via password", user);
            return Ok(());
        }
    }

    Err(TransferError::auth_failed(format!("No authentication method succeeded for {}", user))
        .with_host(info.host()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_comparison_ignores_prefix_and_padding() {
        let actual = "SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8=";
        assert!(fingerprints_match("SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8", actual));
        assert!(fingerprints_match("nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8=", actual));
        assert!(!fingerprints_match("SHA256:AAAA", actual));
        assert!(!fingerprints_match("", actual));
    }

    #[test]
    fn unresolvable_host_is_a_connection_error() {
        let info = ConnectionInfo::new("host.invalid", 22, "bob").with_timeout_ms(500);
        let err = open_session(&info).err().unwrap();
        assert!(err.is_connection_error());
        assert_eq!(err.host.as_deref(), Some("host.invalid"));
    }
}
