//! Submission error types.

use filedeck_transfer::QuotaExceeded;

use crate::types::ScanWarning;

/// Reasons a submission is refused before any byte is sent.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error("identical upload already submitted to this folder")]
    DuplicateSubmission,

    #[error("nothing to upload ({} warnings)", warnings.len())]
    EmptySelection { warnings: Vec<ScanWarning> },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("scan failed: {0}")]
    Scan(String),
}
