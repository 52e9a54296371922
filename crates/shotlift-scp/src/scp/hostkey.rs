//! Host-key pinning for the OpenSSH tools.
//!
//! `ssh-keyscan` output is filtered down to the key whose SHA-256
//! fingerprint matches the configured one, and written to a private
//! known-hosts file that `ssh`/`scp` then check strictly.

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};
use sha2::{Digest, Sha256};

/// OpenSSH `SHA256:` fingerprint of a base64 public-key blob.
pub fn openssh_fingerprint(key_b64: &str) -> Option<String> {
    let blob = STANDARD.decode(key_b64.trim()).ok()?;
    Some(format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(&blob))))
}

fn normalize(fp: &str) -> &str {
    let fp = fp.trim();
    fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
}

/// Known-hosts lines from `ssh-keyscan` output whose key matches `expected`.
pub fn matching_known_hosts(keyscan_output: &str, expected: &str) -> Vec<String> {
    let expected = normalize(expected);
    if expected.is_empty() {
        return Vec::new();
    }
    keyscan_output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(_), Some(_), Some(key)) => {
                    openssh_fingerprint(key).map_or(false, |fp| normalize(&fp) == expected)
                }
                _ => false,
            }
        })
        .map(str::to_string)
        .collect()
}
