//! Input normalization.
//!
//! Turns a drop event, a directory-picker selection or clipboard items into
//! one ordered list of [`ScannedEntry`] with forward-slash relative paths.
//! Paths are relative to the top-level folder the file came from; that
//! folder's name is kept on the entry and reported as the scan's folder
//! root. Dropped directories are walked depth-first; each directory listing
//! is pulled in batches until an empty batch comes back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use filedeck_transfer::{LocalFile, TransferSource, normalize_relative_path};
use tracing::{debug, warn};

use crate::types::ScanWarning;

/// Entries returned per directory batch by [`FsDirectory`].
const FS_BATCH_SIZE: usize = 100;

/// Raw upload input.
pub enum ScanSource {
    /// Items dropped onto the upload zone: files and whole directories.
    DropEvent(Vec<DropItem>),
    /// Directory-picker selection; every file carries its relative path
    /// with the picked folder as first segment.
    PickerInput(Vec<PickedFile>),
    /// Loose files, e.g. pasted from the clipboard.
    ClipboardItems(Vec<Arc<dyn TransferSource>>),
}

/// One dropped item.
pub enum DropItem {
    File(Arc<dyn TransferSource>),
    Directory(Box<dyn DirectoryHandle>),
    /// An entry that could not be opened.
    Unreadable { name: String, reason: String },
}

/// A file from a directory picker.
pub struct PickedFile {
    pub source: Arc<dyn TransferSource>,
    /// Slash- or backslash-separated path, picked folder first.
    pub relative_path: String,
}

/// A dropped directory.
pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a batched reader over the directory's entries.
    fn reader(&self) -> std::io::Result<Box<dyn DirectoryReader>>;
}

/// Pulls directory entries in batches. An empty batch means the listing is
/// exhausted.
pub trait DirectoryReader: Send {
    fn read_batch(&mut self) -> std::io::Result<Vec<DropItem>>;
}

/// A file ready for upload.
#[derive(Clone)]
pub struct ScannedEntry {
    pub source: Arc<dyn TransferSource>,
    /// Top-level folder the file was found in; `None` for loose files.
    pub folder: Option<String>,
    /// Posix path below `folder`, no leading slash.
    pub relative_path: String,
    pub size: u64,
    /// Declared MIME type; sniffed at upload time when absent.
    pub mime_type: Option<String>,
}

impl std::fmt::Debug for ScannedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannedEntry")
            .field("folder", &self.folder)
            .field("relative_path", &self.relative_path)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ScannedEntry {
    /// Path below the destination folder: `folder/relative_path`.
    pub fn upload_path(&self) -> String {
        match &self.folder {
            Some(folder) => join(folder, &self.relative_path),
            None => self.relative_path.clone(),
        }
    }
}

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub entries: Vec<ScannedEntry>,
    /// Folder of the first entry that came from a folder.
    pub folder_root: Option<String>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanOutput {
    pub fn is_folder_upload(&self) -> bool {
        self.folder_root.is_some()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    fn push(&mut self, source: Arc<dyn TransferSource>, folder: Option<&str>, raw_path: &str) {
        let relative_path = normalize_relative_path(raw_path);
        let shown = match folder {
            Some(folder) => join(folder, &relative_path),
            None => relative_path.clone(),
        };
        if relative_path.is_empty() {
            self.warn(source.name(), "empty path");
            return;
        }
        let size = source.size();
        if size == 0 {
            self.warn(&shown, "zero-length file skipped");
            return;
        }
        if self.folder_root.is_none() {
            self.folder_root = folder.map(str::to_string);
        }
        let mime_type = source.mime_type().map(str::to_string);
        self.entries.push(ScannedEntry {
            source,
            folder: folder.map(str::to_string),
            relative_path,
            size,
            mime_type,
        });
    }

    fn warn(&mut self, path: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(path = %path, reason = %reason, "scan warning");
        self.warnings.push(ScanWarning {
            path: path.to_string(),
            reason,
        });
    }
}

/// Normalizes any input shape into scanned entries.
///
/// Blocking for [`FsDirectory`] inputs; call from `spawn_blocking`.
pub fn scan(input: ScanSource) -> ScanOutput {
    let mut out = ScanOutput::default();
    match input {
        ScanSource::DropEvent(items) => {
            for item in items {
                walk_top_level(item, &mut out);
            }
        }
        ScanSource::PickerInput(files) => {
            for file in files {
                let path = normalize_relative_path(&file.relative_path);
                match path.split_once('/') {
                    Some((folder, rest)) => out.push(file.source, Some(folder), rest),
                    None => out.push(file.source, None, &path),
                }
            }
        }
        ScanSource::ClipboardItems(items) => {
            for source in items {
                let name = source.name().to_string();
                out.push(source, None, &name);
            }
        }
    }
    debug!(
        files = out.entries.len(),
        warnings = out.warnings.len(),
        folder_root = ?out.folder_root,
        "scan complete"
    );
    out
}

/// A dropped directory becomes the folder of everything below it.
fn walk_top_level(item: DropItem, out: &mut ScanOutput) {
    match item {
        DropItem::Directory(dir) => {
            let folder = dir.name().to_string();
            walk_directory(dir.as_ref(), &folder, "", out);
        }
        other => walk_item(other, None, "", out),
    }
}

fn walk_item(item: DropItem, folder: Option<&str>, parent: &str, out: &mut ScanOutput) {
    match item {
        DropItem::File(source) => {
            let path = join(parent, source.name());
            out.push(source, folder, &path);
        }
        DropItem::Directory(dir) => {
            let dir_path = join(parent, dir.name());
            walk_directory(dir.as_ref(), folder.unwrap_or_default(), &dir_path, out);
        }
        DropItem::Unreadable { name, reason } => {
            let path = join(parent, &name);
            out.warn(&join(folder.unwrap_or_default(), &path), reason);
        }
    }
}

/// Walks `dir`, whose path below `folder` is `dir_path`.
fn walk_directory(dir: &dyn DirectoryHandle, folder: &str, dir_path: &str, out: &mut ScanOutput) {
    let shown = join(folder, dir_path);
    let mut reader = match dir.reader() {
        Ok(reader) => reader,
        Err(e) => {
            out.warn(&shown, format!("cannot open directory: {e}"));
            return;
        }
    };
    let folder = (!folder.is_empty()).then_some(folder);
    loop {
        match reader.read_batch() {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => {
                for child in batch {
                    walk_item(child, folder, dir_path, out);
                }
            }
            Err(e) => {
                out.warn(&shown, format!("cannot read directory: {e}"));
                break;
            }
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    match (parent.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{name}"),
    }
}

// ---------------------------------------------------------------------------
// Filesystem adapter
// ---------------------------------------------------------------------------

/// A local directory usable as a dropped item.
pub struct FsDirectory {
    path: PathBuf,
    name: String,
}

impl FsDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Converts a local path into a drop item: directory, file or unreadable.
pub fn drop_item_from_path(path: &Path) -> DropItem {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => DropItem::Directory(Box::new(FsDirectory::new(path))),
        Ok(_) => match LocalFile::open(path) {
            Ok(file) => DropItem::File(Arc::new(file)),
            Err(e) => DropItem::Unreadable {
                name,
                reason: e.to_string(),
            },
        },
        Err(e) => DropItem::Unreadable {
            name,
            reason: e.to_string(),
        },
    }
}

impl DirectoryHandle for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn reader(&self) -> std::io::Result<Box<dyn DirectoryReader>> {
        let mut entries = std::fs::read_dir(&self.path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // read_dir order is platform-dependent.
        entries.sort();
        Ok(Box::new(FsDirectoryReader {
            pending: entries.into_iter(),
        }))
    }
}

struct FsDirectoryReader {
    pending: std::vec::IntoIter<PathBuf>,
}

impl DirectoryReader for FsDirectoryReader {
    fn read_batch(&mut self) -> std::io::Result<Vec<DropItem>> {
        Ok(self
            .pending
            .by_ref()
            .take(FS_BATCH_SIZE)
            .map(|path| drop_item_from_path(&path))
            .collect())
    }
}
