// ── sshxfer-transfer / transfer module ───────────────────────────────────────
//
// Single-shot file push over SSH/SFTP:
//   • Credential resolution and session configuration (password / key auth)
//   • Pluggable host-key trust policy
//   • Remote seam (dial, SFTP session, mkdir -p, truncate-create)
//   • Stage-ordered orchestration with an exact byte count on failure

pub mod error;
pub mod host_trust;
pub mod orchestrator;
pub mod remote;
pub mod session;
pub mod types;

pub use error::*;
pub use host_trust::HostTrust;
pub use orchestrator::TransferOrchestrator;
pub use remote::{Connector, RemoteFs, RemoteShell, Ssh2Connector};
pub use session::{AuthMethod, CredentialDefaults, SessionConfig, SessionFactory, SESSION_TIMEOUT};
pub use types::*;
