// ── Types ─────────────────────────────────────────────────────────────────────

use crate::transfer::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_SSH_PORT: u16 = 22;

// ── Request ──────────────────────────────────────────────────────────────────

/// One whole-file push from the local filesystem to a remote SFTP host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub target_host: String,
    #[serde(default)]
    pub target_port: u16,
    #[serde(default)]
    pub source_file_path: String,
    #[serde(default)]
    pub target_file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

impl TransferRequest {
    /// Pre-flight check run before any credential or network work.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("target_host", &self.target_host),
            ("source_file_path", &self.source_file_path),
            ("target_file_path", &self.target_file_path),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        if self.target_port == 0 {
            DEFAULT_SSH_PORT
        } else {
            self.target_port
        }
    }

    pub fn username(&self) -> Option<&str> {
        non_empty(&self.username)
    }

    pub fn password(&self) -> Option<&str> {
        non_empty(&self.password)
    }

    pub fn private_key_path(&self) -> Option<&str> {
        non_empty(&self.private_key_path)
    }

    /// True when the request carries any credential field of its own.
    pub fn overrides_credentials(&self) -> bool {
        self.username().is_some() || self.password().is_some() || self.private_key_path().is_some()
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Credentials,
    Dial,
    SessionOpen,
    SourceOpen,
    RemoteMkdir,
    DestCreate,
    Copy,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Credentials => "credentials",
            TransferStage::Dial => "dial",
            TransferStage::SessionOpen => "session_open",
            TransferStage::SourceOpen => "source_open",
            TransferStage::RemoteMkdir => "remote_mkdir",
            TransferStage::DestCreate => "dest_create",
            TransferStage::Copy => "copy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub id: String,
    pub status: TransferStatus,
    pub source_file: String,
    pub target_file: String,
    pub target_host: String,
    pub bytes_written: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<TransferStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

/// `transfer-<unix nanos>-<8 hex>`; the random suffix keeps ids distinct
/// when two attempts finish within the same clock tick.
pub fn transfer_id(at: DateTime<Utc>) -> String {
    let nanos = at.timestamp_nanos_opt().unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("transfer-{}-{}", nanos, &suffix[..8])
}

/// Human readable elapsed time, e.g. `1.5s` or `312.4µs`.
pub fn format_duration(elapsed: Duration) -> String {
    let std = elapsed.to_std().unwrap_or_default();
    format!("{:?}", std)
}

// ── Status stub ──────────────────────────────────────────────────────────────

/// Response body of the status lookup. No transfer history is kept, so the
/// report is always synthetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatusReport {
    pub id: String,
    pub status: TransferStatus,
    pub percent_complete: f64,
    pub bytes_transferred: u64,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferStatusReport {
    pub fn synthetic(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TransferStatus::Completed,
            percent_complete: 100.0,
            bytes_transferred: 1024,
            start_time: now - Duration::minutes(1),
            last_updated: now,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransferRequest {
        TransferRequest {
            target_host: "h".into(),
            target_port: 22,
            source_file_path: "/tmp/a.txt".into(),
            target_file_path: "/remote/dir/a.txt".into(),
            ..Default::default()
        }
    }

    #[test]
    fn port_zero_defaults_to_ssh() {
        let mut req = request();
        req.target_port = 0;
        assert_eq!(req.effective_port(), 22);
        req.target_port = 2222;
        assert_eq!(req.effective_port(), 2222);
    }

    #[test]
    fn omitted_port_deserializes_to_default() {
        let req: TransferRequest = serde_json::from_str(
            r#"{"target_host":"h","source_file_path":"/a","target_file_path":"/b"}"#,
        )
        .unwrap();
        assert_eq!(req.target_port, 0);
        assert_eq!(req.effective_port(), DEFAULT_SSH_PORT);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_names_first_missing_field() {
        let mut req = request();
        req.source_file_path.clear();
        match req.validate() {
            Err(ValidationError::MissingField(field)) => assert_eq!(field, "source_file_path"),
            other => panic!("unexpected {:?}", other),
        }

        let req = TransferRequest::default();
        match req.validate() {
            Err(ValidationError::MissingField(field)) => assert_eq!(field, "target_host"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn whitespace_only_fields_are_present() {
        let mut req = request();
        req.target_host = " ".into();
        req.target_file_path = "\t".into();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_credential_fields_are_not_overrides() {
        let mut req = request();
        req.username = Some(String::new());
        req.password = Some(String::new());
        assert!(!req.overrides_credentials());

        req.password = Some("secret".into());
        assert!(req.overrides_credentials());
        assert_eq!(req.password(), Some("secret"));
        assert_eq!(req.username(), None);
    }

    #[test]
    fn password_is_never_echoed_back() {
        let mut req = request();
        req.password = Some("hunter2".into());
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn transfer_ids_are_distinct_for_same_instant() {
        let at = Utc::now();
        let a = transfer_id(at);
        let b = transfer_id(at);
        assert!(a.starts_with("transfer-"));
        assert_ne!(a, b);
    }

    #[test]
    fn status_and_stage_wire_names() {
        assert_eq!(serde_json::to_string(&TransferStatus::Completed).unwrap(), "\"completed\"");
        assert_eq!(serde_json::to_string(&TransferStage::RemoteMkdir).unwrap(), "\"remote_mkdir\"");
        assert_eq!(TransferStage::DestCreate.to_string(), "dest_create");
    }

    #[test]
    fn synthetic_report_is_complete() {
        let report = TransferStatusReport::synthetic("abc");
        assert_eq!(report.id, "abc");
        assert_eq!(report.status, TransferStatus::Completed);
        assert_eq!(report.percent_complete, 100.0);
        assert!(report.start_time < report.last_updated);
    }
}
