// ── Errors ────────────────────────────────────────────────────────────────────

use crate::transfer::types::{TransferResult, TransferStage};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected before any credential or network work; surfaced as HTTP 400.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("either password or private key path must be provided")]
    NoCredential,
    #[error("unable to read private key '{}': {source}", path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse private key '{}': {reason}", path.display())]
    KeyParse { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to connect to SSH server {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create SFTP client: {0}")]
    Session(#[source] io::Error),
    #[error("failed to open source file '{path}': {source}")]
    SourceOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create target directory '{path}': {source}")]
    RemoteMkdir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create target file '{path}': {source}")]
    DestCreate {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy file contents after {bytes_written} bytes: {source}")]
    Copy {
        bytes_written: u64,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    pub fn stage(&self) -> TransferStage {
        match self {
            TransferError::Auth(_) => TransferStage::Credentials,
            TransferError::Connect { .. } => TransferStage::Dial,
            TransferError::Session(_) => TransferStage::SessionOpen,
            TransferError::SourceOpen { .. } => TransferStage::SourceOpen,
            TransferError::RemoteMkdir { .. } => TransferStage::RemoteMkdir,
            TransferError::DestCreate { .. } => TransferStage::DestCreate,
            TransferError::Copy { .. } => TransferStage::Copy,
        }
    }

    /// Bytes that reached the destination before the failure.
    pub fn bytes_written(&self) -> u64 {
        match self {
            TransferError::Copy { bytes_written, .. } => *bytes_written,
            _ => 0,
        }
    }
}

/// A failed attempt: the fully populated result plus the typed cause.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TransferFailure {
    pub result: TransferResult,
    pub error: TransferError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_variants() {
        let io_err = || io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(TransferError::from(AuthError::NoCredential).stage(), TransferStage::Credentials);
        assert_eq!(
            TransferError::Connect { addr: "h:22".into(), source: io_err() }.stage(),
            TransferStage::Dial
        );
        assert_eq!(TransferError::Session(io_err()).stage(), TransferStage::SessionOpen);
        assert_eq!(
            TransferError::Copy { bytes_written: 7, source: io_err() }.stage(),
            TransferStage::Copy
        );
    }

    #[test]
    fn copy_error_reports_partial_count() {
        let err = TransferError::Copy {
            bytes_written: 4096,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        assert_eq!(err.bytes_written(), 4096);
        assert_eq!(
            err.to_string(),
            "failed to copy file contents after 4096 bytes: pipe closed"
        );
    }

    #[test]
    fn key_errors_name_the_path() {
        let err = AuthError::KeyParse { path: PathBuf::from("/keys/id"), reason: "bad armour".into() };
        assert_eq!(err.to_string(), "unable to parse private key '/keys/id': bad armour");
    }
}
