// ── Session factory – authentication config without network I/O ─────────────

use crate::transfer::error::AuthError;
use crate::transfer::host_trust::HostTrust;
use crate::transfer::types::{non_empty, TransferRequest};
use log::{debug, warn};
use pkcs8::{PrivateKeyInfo, SecretDocument};
use rsa::pkcs1::DecodeRsaPrivateKey;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bound applied to TCP connect, handshake and authentication.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum AuthMethod {
    Password(SecretString),
    PublicKey { private_key_path: PathBuf },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PublicKey { .. } => "publickey",
        }
    }
}

/// Everything needed to open an authenticated SSH connection.
#[derive(Debug)]
pub struct SessionConfig {
    pub username: String,
    pub auth: AuthMethod,
    pub host_trust: HostTrust,
    pub timeout: Duration,
}

// ── Factory ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionFactory {
    host_trust: HostTrust,
    timeout: Duration,
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self::new(HostTrust::default())
    }
}

impl SessionFactory {
    pub fn new(host_trust: HostTrust) -> Self {
        Self {
            host_trust,
            timeout: SESSION_TIMEOUT,
        }
    }

    /// Build a session config. A password wins over a key path; the key file
    /// is read and parsed here so a bad key never reaches the network.
    pub fn build(
        &self,
        username: &str,
        password: Option<&str>,
        key_path: Option<&str>,
    ) -> Result<SessionConfig, AuthError> {
        let password = password.filter(|p| !p.is_empty());
        let key_path = key_path.filter(|k| !k.is_empty());

        let auth = match (password, key_path) {
            (Some(password), _) => AuthMethod::Password(SecretString::new(password.to_string())),
            (None, Some(key_path)) => {
                let path = PathBuf::from(key_path);
                load_private_key(&path)?;
                AuthMethod::PublicKey {
                    private_key_path: path,
                }
            }
            (None, None) => return Err(AuthError::NoCredential),
        };

        if username.is_empty() {
            warn!("Session config built with an empty username");
        }
        debug!("Session config for '{}' via {}", username, auth.name());

        Ok(SessionConfig {
            username: username.to_string(),
            auth,
            host_trust: self.host_trust.clone(),
            timeout: self.timeout,
        })
    }
}

// ── Private key checks ───────────────────────────────────────────────────────

fn load_private_key(path: &Path) -> Result<(), AuthError> {
    let data = std::fs::read(path).map_err(|source| AuthError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_private_key(&data).map_err(|reason| AuthError::KeyParse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Accepts unencrypted OpenSSH, PKCS#1 (RSA), PKCS#8 and SEC1 (P-256/P-384)
/// keys. Each format is decoded in full, not just its armour.
fn parse_private_key(data: &[u8]) -> Result<(), String> {
    let text = std::str::from_utf8(data)
        .map_err(|_| "key file is not valid UTF-8".to_string())?
        .trim();
    let label = pem_label(text).ok_or_else(|| "no private key block found".to_string())?;

    if text.contains("ENCRYPTED") && label != "OPENSSH PRIVATE KEY" {
        return Err("passphrase-protected keys are not supported".into());
    }

    match label {
        "OPENSSH PRIVATE KEY" => {
            let key = ssh_key::PrivateKey::from_openssh(text).map_err(|e| e.to_string())?;
            if key.is_encrypted() {
                return Err("passphrase-protected keys are not supported".into());
            }
        }
        "RSA PRIVATE KEY" => {
            rsa::RsaPrivateKey::from_pkcs1_pem(text)
                .map_err(|e| format!("invalid PKCS#1 key: {}", e))?;
        }
        "PRIVATE KEY" => {
            let (_, doc) =
                SecretDocument::from_pem(text).map_err(|e| format!("invalid PKCS#8 key: {}", e))?;
            PrivateKeyInfo::try_from(doc.as_bytes())
                .map_err(|e| format!("invalid PKCS#8 key: {}", e))?;
        }
        "EC PRIVATE KEY" => {
            if p256::SecretKey::from_sec1_pem(text).is_err()
                && p384::SecretKey::from_sec1_pem(text).is_err()
            {
                return Err("invalid SEC1 key (P-256 and P-384 are supported)".into());
            }
        }
        other => return Err(format!("unsupported key type '{}'", other)),
    }
    Ok(())
}

fn pem_label(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|l| l.trim().strip_prefix("-----BEGIN "))
        .and_then(|rest| rest.strip_suffix("-----"))
}

// ── Credential resolution ────────────────────────────────────────────────────

/// Service-wide fallback credentials, read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct CredentialDefaults {
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
}

impl CredentialDefaults {
    /// Resolve the session config for one request.
    ///
    /// The union of request and default values must contain a password or a
    /// key path. When the request carries any credential field the config is
    /// built from the request's values alone; the defaults are not blended in.
    pub fn resolve(
        &self,
        factory: &SessionFactory,
        request: &TransferRequest,
    ) -> Result<SessionConfig, AuthError> {
        let merged_password = request.password().or(non_empty(&self.password));
        let merged_key = request.private_key_path().or(non_empty(&self.private_key_path));
        if merged_password.is_none() && merged_key.is_none() {
            return Err(AuthError::NoCredential);
        }

        if request.overrides_credentials() {
            debug!("Request supplies its own credentials; service defaults ignored");
            return factory.build(
                request.username().unwrap_or_default(),
                request.password(),
                request.private_key_path(),
            );
        }

        factory.build(
            non_empty(&self.username).unwrap_or_default(),
            non_empty(&self.password),
            non_empty(&self.private_key_path),
        )
    }
}
