//! Byte sources for uploads.

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use filedeck_protocol::DEFAULT_MIME_TYPE;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Bytes read up front for content sniffing.
const SNIFF_LEN: usize = 8192;

/// Boxed future returned by [`TransferSource::read_range`].
pub type SourceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, std::io::Error>> + Send + 'a>>;

/// Something that can be uploaded: a local file, an in-memory blob, a
/// clipboard item.
pub trait TransferSource: Send + Sync {
    /// File name (no directories).
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    /// Last modification time in milliseconds since the Unix epoch.
    fn last_modified(&self) -> u64;

    /// Declared MIME type, if the origin supplied one.
    fn mime_type(&self) -> Option<&str> {
        None
    }

    /// Reads `len` bytes starting at `offset`.
    fn read_range(&self, offset: u64, len: usize) -> SourceFuture<'_, Vec<u8>>;
}

impl std::fmt::Debug for dyn TransferSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSource")
            .field("name", &self.name())
            .field("size", &self.size())
            .finish()
    }
}

/// Returns the declared MIME type, or sniffs it from the first bytes.
pub async fn resolve_mime_type(source: &dyn TransferSource) -> String {
    if let Some(declared) = source.mime_type().filter(|m| !m.is_empty()) {
        return declared.to_string();
    }

    let len = source.size().min(SNIFF_LEN as u64) as usize;
    if len == 0 {
        return DEFAULT_MIME_TYPE.to_string();
    }

    match source.read_range(0, len).await {
        Ok(head) => infer::get(&head)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        Err(e) => {
            tracing::debug!(file = %source.name(), error = %e, "mime sniffing failed");
            DEFAULT_MIME_TYPE.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// LocalFile
// ---------------------------------------------------------------------------

/// A file on the local filesystem. Metadata is captured at construction.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
    last_modified: u64,
}

impl LocalFile {
    /// Stats `path` and captures its name, size and modification time.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            path,
            name,
            size: metadata.len(),
            last_modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransferSource for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    fn read_range(&self, offset: u64, len: usize) -> SourceFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryFile
// ---------------------------------------------------------------------------

/// An in-memory blob, e.g. a pasted clipboard item.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Arc<[u8]>,
    last_modified: u64,
    mime_type: Option<String>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>, last_modified: u64) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            last_modified,
            mime_type: None,
        }
    }

    /// Sets the declared MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl TransferSource for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn read_range(&self, offset: u64, len: usize) -> SourceFuture<'_, Vec<u8>> {
        let start = offset as usize;
        let result = start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("range {offset}+{len} outside {}", self.name),
                )
            });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn local_file_reads_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"0123456789").unwrap();

        let file = LocalFile::open(&path).unwrap();
        assert_eq!(file.name(), "report.txt");
        assert_eq!(file.size(), 10);
        assert!(file.last_modified() > 0);
        assert_eq!(file.read_range(3, 4).await.unwrap(), b"3456");
    }

    #[tokio::test]
    async fn local_file_short_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"abc").unwrap();

        let file = LocalFile::open(&path).unwrap();
        assert!(file.read_range(2, 5).await.is_err());
    }

    #[test]
    fn local_file_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalFile::open(dir.path()).is_err());
    }

    #[tokio::test]
    async fn memory_file_bounds() {
        let file = MemoryFile::new("m.bin", b"abcdef".to_vec(), 1);
        assert_eq!(file.read_range(4, 2).await.unwrap(), b"ef");
        assert!(file.read_range(4, 3).await.is_err());
    }

    #[tokio::test]
    async fn declared_mime_wins() {
        let file = MemoryFile::new("a.bin", PNG_HEADER.to_vec(), 0).with_mime_type("text/plain");
        assert_eq!(resolve_mime_type(&file).await, "text/plain");
    }

    #[tokio::test]
    async fn mime_is_sniffed() {
        let mut data = PNG_HEADER.to_vec();
        data.extend_from_slice(&[0u8; 32]);
        let file = MemoryFile::new("pasted", data, 0);
        assert_eq!(resolve_mime_type(&file).await, "image/png");
    }

    #[tokio::test]
    async fn unknown_content_falls_back() {
        let file = MemoryFile::new("notes", b"plain words".to_vec(), 0);
        assert_eq!(resolve_mime_type(&file).await, DEFAULT_MIME_TYPE);

        let empty = MemoryFile::new("empty", Vec::<u8>::new(), 0);
        assert_eq!(resolve_mime_type(&empty).await, DEFAULT_MIME_TYPE);
    }
}
