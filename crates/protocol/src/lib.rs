//! Wire types for the remote hierarchical file store.
//!
//! Every backend endpoint answers with the same `{success, message, data}`
//! envelope ([`envelope::ApiResponse`]). Field names are snake_case to match
//! the backend.

pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::{ApiResponse, EnvelopeError};
pub use messages::{
    CompleteUploadRequest, CompletedPart, InitUploadRequest, InitUploadResponse, ObjectDescriptor,
    PartReceipt, UploadMode, UploadPartRequest,
};
pub use types::{
    BatchDeleteRequest, BatchDeleteResponse, Breadcrumb, DeleteRequest, FileListing, FileQuery,
    FileRecord, FolderStats, Pagination, RenameRequest, RenameTarget, TreeChild, TreeListing,
    TreeNodeInfo, TreeQuery,
};

/// MIME type used when a source declares none and sniffing finds nothing.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
