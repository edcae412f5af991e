//! Remote file store abstraction.
//!
//! [`RemoteStore`] is the seam between the transfer/browser logic and the
//! backend. [`HttpStore`] implements it over `reqwest`; tests implement it
//! with in-memory recording mocks.

mod http;

use std::future::Future;
use std::pin::Pin;

use filedeck_protocol::{
    BatchDeleteResponse, CompleteUploadRequest, EnvelopeError, FileListing, FileQuery,
    InitUploadRequest, InitUploadResponse, ObjectDescriptor, PartReceipt, RenameRequest,
    TreeListing, TreeQuery, UploadPartRequest,
};

pub use http::{HttpStore, StoreConfig};

/// Boxed future returned by every [`RemoteStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors from a remote store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("response carried no {0}")]
    MissingData(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,
}

impl StoreError {
    /// Returns `true` for failures worth retrying: transport errors,
    /// timeouts and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(_) | StoreError::Timeout => true,
            StoreError::Api { status, .. } => *status >= 500,
            StoreError::Rejected(_) | StoreError::MissingData(_) | StoreError::Json(_) => false,
        }
    }
}

impl From<EnvelopeError> for StoreError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Rejected(msg) => StoreError::Rejected(msg),
            EnvelopeError::MissingData(what) => StoreError::MissingData(what),
        }
    }
}

/// Backend operations used by the engine.
///
/// Implementations must be shareable across tasks; the engine holds one
/// `Arc<dyn RemoteStore>` for uploads and browsing alike.
pub trait RemoteStore: Send + Sync {
    /// Opens an upload session. The backend picks direct or chunked mode.
    fn init_upload(&self, req: &InitUploadRequest) -> StoreFuture<'_, InitUploadResponse>;

    /// Uploads one part of a chunked session.
    fn upload_part(&self, req: &UploadPartRequest, body: Vec<u8>) -> StoreFuture<'_, PartReceipt>;

    /// Uploads the whole payload of a direct session.
    fn upload_direct(
        &self,
        transfer_id: &str,
        filename: &str,
        mime_type: &str,
        body: Vec<u8>,
    ) -> StoreFuture<'_, ObjectDescriptor>;

    /// Finalizes a session and returns the stored object.
    fn complete_upload(&self, req: &CompleteUploadRequest) -> StoreFuture<'_, ObjectDescriptor>;

    /// Lists the direct subfolders of `query.parent_path`.
    fn list_tree(&self, query: &TreeQuery) -> StoreFuture<'_, TreeListing>;

    /// Lists one page of files.
    fn list_files(&self, query: &FileQuery) -> StoreFuture<'_, FileListing>;

    fn delete_file(&self, file_id: i64) -> StoreFuture<'_, ()>;

    fn batch_delete(&self, ids: &[i64]) -> StoreFuture<'_, BatchDeleteResponse>;

    fn rename(&self, req: &RenameRequest) -> StoreFuture<'_, ()>;
}
