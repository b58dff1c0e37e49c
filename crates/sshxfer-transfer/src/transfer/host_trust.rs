// ── Host trust policy ─────────────────────────────────────────────────────────
//
// Decides whether the key presented by a remote host during the handshake is
// acceptable. Checked before any credential is sent.

use base64::Engine;
use log::{debug, warn};
use ssh2::{CheckResult, HashType, KnownHostFileKind, Session};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostTrust {
    /// Accept whatever key the host presents. Must be chosen explicitly.
    AcceptAny,
    /// Accept only a host whose SHA-256 key fingerprint matches.
    FixedFingerprint(String),
    /// Look the host up in an OpenSSH known_hosts file.
    KnownHosts(PathBuf),
}

impl Default for HostTrust {
    fn default() -> Self {
        HostTrust::KnownHosts(default_known_hosts_path())
    }
}

pub fn default_known_hosts_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("known_hosts"))
        .unwrap_or_else(|| PathBuf::from("/dev/null"))
}

#[derive(Debug, Error)]
#[error("invalid host trust policy '{0}' (expected accept-any, known-hosts[:<path>] or fingerprint:SHA256:<base64>)")]
pub struct HostTrustParseError(String);

impl FromStr for HostTrust {
    type Err = HostTrustParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "accept-any" => return Ok(HostTrust::AcceptAny),
            "known-hosts" => return Ok(HostTrust::default()),
            _ => {}
        }
        if let Some(path) = s.strip_prefix("known-hosts:") {
            if !path.is_empty() {
                return Ok(HostTrust::KnownHosts(PathBuf::from(path)));
            }
        }
        if let Some(fp) = s.strip_prefix("fingerprint:") {
            let normalized = normalize_fingerprint(fp);
            if !normalized.is_empty() {
                return Ok(HostTrust::FixedFingerprint(format!("SHA256:{}", normalized)));
            }
        }
        Err(HostTrustParseError(s.to_string()))
    }
}

impl fmt::Display for HostTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostTrust::AcceptAny => f.write_str("accept-any"),
            HostTrust::FixedFingerprint(fp) => write!(f, "fingerprint:{}", fp),
            HostTrust::KnownHosts(path) => write!(f, "known-hosts:{}", path.display()),
        }
    }
}

impl HostTrust {
    /// Verify the host key of a session that has completed its handshake.
    pub fn verify(&self, session: &Session, host: &str, port: u16) -> io::Result<()> {
        match self {
            HostTrust::AcceptAny => {
                warn!(
                    "Host key verification disabled; accepting {}:{} as {}",
                    host,
                    port,
                    session_fingerprint(session).unwrap_or_else(|| "(unknown key)".into())
                );
                Ok(())
            }
            HostTrust::FixedFingerprint(expected) => {
                let actual = session_fingerprint(session)
                    .ok_or_else(|| rejected(host, "server presented no host key"))?;
                if fingerprints_match(expected, &actual) {
                    debug!("Host key for {}:{} matches pinned fingerprint", host, port);
                    Ok(())
                } else {
                    Err(rejected(
                        host,
                        &format!("fingerprint {} does not match pinned {}", actual, expected),
                    ))
                }
            }
            HostTrust::KnownHosts(path) => verify_known_hosts(session, host, port, path),
        }
    }
}

fn verify_known_hosts(session: &Session, host: &str, port: u16, path: &Path) -> io::Result<()> {
    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| rejected(host, "server presented no host key"))?;

    let mut known_hosts = session.known_hosts()?;
    known_hosts
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| rejected(host, &format!("cannot read {}: {}", path.display(), e)))?;

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => {
            debug!("Host key for {}:{} found in {}", host, port, path.display());
            Ok(())
        }
        CheckResult::Mismatch => Err(rejected(
            host,
            &format!("host key does not match the entry in {}", path.display()),
        )),
        CheckResult::NotFound => Err(rejected(
            host,
            &format!("host is not listed in {}", path.display()),
        )),
        CheckResult::Failure => Err(rejected(host, "known_hosts lookup failed")),
    }
}

fn rejected(host: &str, reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("host key for '{}' rejected: {}", host, reason),
    )
}

fn session_fingerprint(session: &Session) -> Option<String> {
    session.host_key_hash(HashType::Sha256).map(format_fingerprint)
}

/// OpenSSH style `SHA256:<unpadded base64>`.
pub fn format_fingerprint(sha256: &[u8]) -> String {
    format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(sha256)
    )
}

fn normalize_fingerprint(fp: &str) -> &str {
    fp.trim()
        .trim_start_matches("SHA256:")
        .trim_end_matches('=')
}

fn fingerprints_match(expected: &str, actual: &str) -> bool {
    normalize_fingerprint(expected) == normalize_fingerprint(actual)
}
