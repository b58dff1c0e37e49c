// ── Transfer orchestrator – one whole-file push, stage by stage ──────────────

use crate::transfer::error::{TransferError, TransferFailure};
use crate::transfer::remote::{remote_parent, Connector};
use crate::transfer::session::{CredentialDefaults, SessionFactory};
use crate::transfer::types::{
    format_duration, transfer_id, TransferRequest, TransferResult, TransferStatus,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::Arc;

const COPY_BUFFER_SIZE: usize = 32 * 1024;

pub struct TransferOrchestrator {
    connector: Arc<dyn Connector>,
    defaults: CredentialDefaults,
    factory: SessionFactory,
}

impl TransferOrchestrator {
    pub fn new(
        connector: Arc<dyn Connector>,
        defaults: CredentialDefaults,
        factory: SessionFactory,
    ) -> Self {
        Self {
            connector,
            defaults,
            factory,
        }
    }

    /// Push `request.source_file_path` to the remote host.
    ///
    /// Every stage runs once; the first failure short-circuits. Both arms
    /// carry a fully populated [`TransferResult`]. Remote handles are
    /// released when they go out of scope, on every path.
    pub fn transfer(&self, request: &TransferRequest) -> Result<TransferResult, TransferFailure> {
        let started = Utc::now();
        match self.run(request) {
            Ok(bytes_written) => {
                let result = finish(request, started, bytes_written, None);
                info!(
                    "Transfer {} completed: {} -> {}:{} ({} bytes in {})",
                    result.id,
                    request.source_file_path,
                    request.target_host,
                    request.target_file_path,
                    bytes_written,
                    result.duration
                );
                Ok(result)
            }
            Err(error) => {
                let result = finish(request, started, error.bytes_written(), Some(&error));
                warn!(
                    "Transfer {} failed at {}: {}",
                    result.id,
                    error.stage(),
                    error
                );
                Err(TransferFailure { result, error })
            }
        }
    }

    fn run(&self, request: &TransferRequest) -> Result<u64, TransferError> {
        let config = self.defaults.resolve(&self.factory, request)?;

        let host = request.target_host.as_str();
        let port = request.effective_port();
        debug!("Dialing {}:{}", host, port);
        let mut shell = self
            .connector
            .dial(host, port, &config)
            .map_err(|source| TransferError::Connect {
                addr: format!("{}:{}", host, port),
                source,
            })?;

        let mut fs = shell.open_sftp().map_err(TransferError::Session)?;

        let mut source = File::open(&request.source_file_path).map_err(|source| {
            TransferError::SourceOpen {
                path: request.source_file_path.clone(),
                source,
            }
        })?;

        let parent = remote_parent(&request.target_file_path);
        debug!("Ensuring remote directory {}", parent);
        fs.mkdir_all(&parent)
            .map_err(|source| TransferError::RemoteMkdir {
                path: parent.clone(),
                source,
            })?;

        let mut dest = fs
            .create(&request.target_file_path)
            .map_err(|source| TransferError::DestCreate {
                path: request.target_file_path.clone(),
                source,
            })?;

        let mut written = 0u64;
        copy_counted(&mut source, &mut dest, &mut written).map_err(|source| {
            TransferError::Copy {
                bytes_written: written,
                source,
            }
        })?;
        Ok(written)
    }
}

/// Copy `reader` into `writer`, keeping `written` equal to the number of
/// bytes the writer has accepted so far. The writer is flushed at the end.
fn copy_counted<R, W>(reader: &mut R, writer: &mut W, written: &mut u64) -> io::Result<()>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let mut chunk = &buf[..n];
        while !chunk.is_empty() {
            match writer.write(chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "destination accepted no bytes",
                    ))
                }
                Ok(m) => {
                    *written += m as u64;
                    chunk = &chunk[m..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    writer.flush()
}

fn finish(
    request: &TransferRequest,
    started: DateTime<Utc>,
    bytes_written: u64,
    error: Option<&TransferError>,
) -> TransferResult {
    let ended = Utc::now();
    let elapsed = ended - started;
    TransferResult {
        id: transfer_id(ended),
        status: if error.is_some() {
            TransferStatus::Failed
        } else {
            TransferStatus::Completed
        },
        source_file: request.source_file_path.clone(),
        target_file: request.target_file_path.clone(),
        target_host: request.target_host.clone(),
        bytes_written,
        start_time: started,
        end_time: ended,
        duration: format_duration(elapsed),
        duration_ms: elapsed.num_milliseconds().max(0) as u64,
        failed_stage: error.map(TransferError::stage),
        error: error.map(ToString::to_string),
    }
}
