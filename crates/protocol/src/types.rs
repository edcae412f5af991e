use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Folder tree
// ---------------------------------------------------------------------------

/// One breadcrumb step from the tree root to a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub label: String,
    pub full_path: String,
}

/// File and byte counts of a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub total_bytes: u64,
}

/// Summary of the folder a tree listing was requested for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeInfo {
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub stats: FolderStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<Vec<Breadcrumb>>,
}

/// One direct subfolder in a tree listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeChild {
    pub full_path: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub stats: FolderStats,
}

/// Response of `list_tree`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeListing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<TreeNodeInfo>,
    #[serde(default)]
    pub children: Vec<TreeChild>,
}

/// Query for `list_tree`. `scope` and `category` are opaque routing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeQuery {
    #[serde(rename = "customer_id")]
    pub scope: String,
    pub category: String,
    pub parent_path: String,
}

// ---------------------------------------------------------------------------
// File listing
// ---------------------------------------------------------------------------

/// Query for `list_files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQuery {
    #[serde(rename = "customer_id")]
    pub scope: String,
    pub category: String,
    pub folder_path: String,
    #[serde(with = "flag")]
    pub include_children: bool,
    pub keyword: String,
    pub page: u32,
    pub page_size: u32,
}

/// One stored file as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    /// Upload time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<i64>,
}

/// Pagination block of a file listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Response of `list_files`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub items: Vec<FileRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Deletes one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub file_id: i64,
}

/// Deletes several files at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<i64>,
}

/// Backend answer to [`BatchDeleteRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    #[serde(default)]
    pub deleted_count: u64,
}

/// What a rename applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameTarget {
    #[serde(rename = "file_id")]
    File(i64),
    #[serde(rename = "folder_path")]
    Folder(String),
}

/// Renames a file or a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    #[serde(flatten)]
    pub target: RenameTarget,
    pub new_name: String,
}

/// Booleans travel as `"1"` / `"0"` in query strings.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Num(u8),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Num(n) => n != 0,
            Raw::Str(s) => matches!(s.as_str(), "1" | "true"),
        })
    }
}
