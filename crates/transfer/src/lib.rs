//! Single-file transfer: quota checks, path safety, byte sources and the
//! session driver that runs one upload against a [`RemoteStore`].
//!
//! A session goes `uninitialized → initializing → (direct | chunked) →
//! finalizing → completed`; `failed` and `aborted` are reachable from any
//! non-terminal state. Parts upload strictly in order, each with bounded
//! linear-backoff retries. Nothing is resumable across restarts.
//!
//! [`RemoteStore`]: filedeck_store::RemoteStore

mod chunked;
mod driver;
mod progress;
mod quota;
mod retry;
mod settings;
mod source;
mod timeout;
mod types;
mod validation;

pub use chunked::{checksum_bytes, plan_parts};
pub use driver::SessionDriver;
pub use progress::{SpeedCalculator, TransferProgress, format_bytes};
pub use quota::{QuotaCandidate, QuotaExceeded, QuotaLimit, QuotaLimits};
pub use retry::{RetryError, RetryPolicy};
pub use settings::TransferSettings;
pub use source::{LocalFile, MemoryFile, SourceFuture, TransferSource, resolve_mime_type};
pub use timeout::TimeoutPolicy;
pub use types::{FilePart, SessionSnapshot, SessionState, TransferSession};
pub use validation::{join_storage_key, normalize_relative_path, validate_upload_path};

use filedeck_store::StoreError;

/// Errors produced while transferring one file.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{filename}: read failed at byte {offset}: {source}")]
    SourceReadFailed {
        filename: String,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open upload session for {filename}: {source}")]
    SessionInitFailed {
        filename: String,
        #[source]
        source: StoreError,
    },

    #[error("{filename}: direct upload failed after {attempts} attempts: {source}")]
    DirectUploadFailed {
        filename: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error(
        "{filename}: part {part_number} failed after {attempts} attempts at byte {offset}: {source}"
    )]
    PartUploadFailed {
        filename: String,
        part_number: u32,
        attempts: u32,
        offset: u64,
        #[source]
        source: StoreError,
    },

    #[error("{filename}: finalize failed at byte {offset}: {source}")]
    FinalizeFailed {
        filename: String,
        offset: u64,
        #[source]
        source: StoreError,
    },

    #[error("{filename}: timed out at byte {offset}")]
    Timeout { filename: String, offset: u64 },

    #[error("{filename}: aborted at byte {offset}")]
    Aborted { filename: String, offset: u64 },

    #[error("{filename}: protocol violation: {reason}")]
    Protocol { filename: String, reason: String },
}

impl TransferError {
    /// Byte offset confirmed by the backend when the failure happened.
    pub fn offset(&self) -> Option<u64> {
        match self {
            TransferError::PartUploadFailed { offset, .. }
            | TransferError::SourceReadFailed { offset, .. }
            | TransferError::FinalizeFailed { offset, .. }
            | TransferError::Timeout { offset, .. }
            | TransferError::Aborted { offset, .. } => Some(*offset),
            TransferError::SessionInitFailed { .. } | TransferError::DirectUploadFailed { .. } => {
                Some(0)
            }
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, TransferError::Aborted { .. })
    }
}
