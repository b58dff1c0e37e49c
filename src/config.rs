//! Service configuration
//!
//! Every setting is a command-line flag that falls back to an environment
//! variable of the same name, then to a built-in default.

use crate::logging::LogFormat;
use clap::Parser;
use sshxfer_transfer::transfer::{CredentialDefaults, HostTrust, SessionFactory};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either SSH_KEY_PATH or SSH_PASSWORD must be provided")]
    MissingCredential,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// SSH file transfer API server
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServiceConfig {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds allowed for reading a request body (0 disables)
    #[arg(long, env = "READ_TIMEOUT", default_value_t = 10)]
    pub read_timeout: u64,

    /// Seconds allowed for health and status responses (0 disables)
    #[arg(long, env = "WRITE_TIMEOUT", default_value_t = 10)]
    pub write_timeout: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_REQUEST_SIZE", default_value_t = DEFAULT_MAX_REQUEST_SIZE)]
    pub max_request_size: usize,

    /// Requests allowed per client address per window (0 = unlimited)
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 100)]
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_DURATION", default_value_t = 60)]
    pub rate_limit_duration: u64,

    /// Default SSH username for requests that do not supply one
    #[arg(long, env = "SSH_USERNAME")]
    pub ssh_username: Option<String>,

    /// Default SSH password
    #[arg(long, env = "SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// Default SSH private key file
    #[arg(long, env = "SSH_KEY_PATH")]
    pub ssh_key_path: Option<String>,

    /// Host key policy: known-hosts[:<path>], fingerprint:SHA256:<b64> or accept-any
    #[arg(long, env = "SSH_HOST_TRUST", default_value = "known-hosts")]
    pub ssh_host_trust: HostTrust,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let defaults = self.credential_defaults();
        if defaults.password.is_none() && defaults.private_key_path.is_none() {
            return Err(ConfigError::MissingCredential);
        }
        if self.rate_limit_duration == 0 {
            return Err(ConfigError::Zero("RATE_LIMIT_DURATION"));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::Zero("MAX_REQUEST_SIZE"));
        }
        if defaults.username.is_none() {
            tracing::warn!("SSH_USERNAME is not set; every request must supply its own username");
        }
        if self.ssh_host_trust == HostTrust::AcceptAny {
            tracing::warn!("SSH_HOST_TRUST=accept-any: remote host keys will not be verified");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Empty values are treated as unset.
    pub fn credential_defaults(&self) -> CredentialDefaults {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        CredentialDefaults {
            username: non_empty(&self.ssh_username),
            password: non_empty(&self.ssh_password),
            private_key_path: non_empty(&self.ssh_key_path),
        }
    }

    pub fn session_factory(&self) -> SessionFactory {
        SessionFactory::new(self.ssh_host_trust.clone())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_duration)
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
