use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload session
// ---------------------------------------------------------------------------

/// Transfer strategy chosen by the backend at session init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Whole payload in one request.
    Direct,
    /// Multi-part upload, one request per part.
    Chunked,
}

/// Opens an upload session for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub filesize: u64,
    pub storage_key: String,
    pub mime_type: String,
}

/// Backend answer to [`InitUploadRequest`].
///
/// `upload_id`, `part_size` and `total_parts` are only present in chunked
/// mode. `transfer_id` identifies the session in both modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub transfer_id: String,
    pub mode: UploadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<u32>,
}

/// Addresses one part of a chunked session. The part bytes travel as the
/// request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPartRequest {
    pub upload_id: String,
    pub storage_key: String,
    pub part_number: u32,
    /// SHA-256 hex digest of the part body (empty means unverified).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Backend answer to a successful part upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartReceipt {
    pub etag: String,
}

/// One `{part_number, etag}` pair submitted at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Finalizes a session.
///
/// For direct sessions `upload_id` is absent and `parts` is empty; the call
/// is a confirmation of the already-stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub transfer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<CompletedPart>,
}

/// Final stored-object descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub storage_key: String,
    pub filename: String,
    pub filesize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
