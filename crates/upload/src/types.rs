//! Data types for the upload flow.

use filedeck_protocol::ObjectDescriptor;
use filedeck_transfer::{TransferProgress, join_storage_key, normalize_relative_path};

/// Where a submission lands. `customer_scope` and `category` are opaque
/// routing strings passed through to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationContext {
    pub customer_scope: String,
    pub category: String,
    /// Folder inside the category the upload goes to ("" = root).
    pub base_path: String,
}

impl DestinationContext {
    pub fn new(
        customer_scope: impl Into<String>,
        category: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            customer_scope: customer_scope.into(),
            category: category.into(),
            base_path: normalize_relative_path(&base_path.into()),
        }
    }

    /// Key used by the upload guard: one logical target per destination.
    pub fn guard_target(&self) -> String {
        format!("{}|{}|{}", self.customer_scope, self.category, self.base_path)
    }

    /// Storage key for a scanned relative path.
    pub fn storage_key(&self, relative_path: &str) -> String {
        join_storage_key(&self.base_path, relative_path)
    }
}

/// Non-fatal problem found while scanning input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: String,
    pub reason: String,
}

/// Per-file status within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Uploading,
    Succeeded,
    Failed,
}

/// State of one file of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    /// Path below the destination folder, folder root first.
    pub relative_path: String,
    pub storage_key: String,
    pub size: u64,
    pub status: FileStatus,
    pub error: Option<String>,
    pub object: Option<ObjectDescriptor>,
}

/// A file that did not make it, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub relative_path: String,
    pub reason: String,
    /// Bytes acknowledged before the failure.
    pub offset: Option<u64>,
}

/// Final report of a submission. Always delivered, even when every file
/// failed or the transfer was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSummary {
    pub destination: DestinationContext,
    pub folder_root: Option<String>,
    pub succeeded: usize,
    pub failed: Vec<FileFailure>,
    /// Files never started because the transfer was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub warnings: Vec<ScanWarning>,
    pub files: Vec<FileOutcome>,
}

impl TransferSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// True when every file landed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0 && !self.cancelled
    }
}

/// Event emitted while a submission runs.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    FileStarted {
        index: usize,
        relative_path: String,
        size: u64,
    },
    Progress {
        relative_path: String,
        file_bytes: u64,
        file_total: u64,
        overall: TransferProgress,
    },
    FileCompleted {
        index: usize,
        relative_path: String,
        object: ObjectDescriptor,
    },
    FileFailed {
        index: usize,
        relative_path: String,
        error: String,
        offset: Option<u64>,
    },
    Finished(TransferSummary),
}
