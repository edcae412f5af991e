use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a relative upload path cannot escape its destination.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (`/tmp/x`, `\\server\share`)
/// - Parent directory traversal (`..`)
/// - Drive prefixes (`C:`), on every platform
pub fn validate_upload_path(file_path: &str) -> Result<(), TransferError> {
    if file_path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let normalized = file_path.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {file_path}"
        )));
    }
    if has_drive_prefix(&normalized) {
        return Err(TransferError::InvalidPath(format!(
            "path prefix not allowed: {file_path}"
        )));
    }

    for component in Path::new(&normalized).components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(TransferError::InvalidPath(format!(
                    "path prefix not allowed: {file_path}"
                )));
            }
            Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {file_path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalizes a relative path to forward slashes with no leading `./` or
/// `/` and no empty segments.
pub fn normalize_relative_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a destination base folder and a relative path into a storage key.
pub fn join_storage_key(base: &str, relative: &str) -> String {
    let base = normalize_relative_path(base);
    let relative = normalize_relative_path(relative);
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative,
        (false, true) => base,
        (false, false) => format!("{base}/{relative}"),
    }
}
