use std::fmt;
use std::ops::Range;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use filedeck_protocol::{CompletedPart, InitUploadResponse, UploadMode};

use crate::chunked::plan_parts;

/// Lifecycle of one upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    DirectUploading,
    ChunkUploading,
    Finalizing,
    Completed,
    Failed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Aborted
        )
    }

    fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (from, Failed | Aborted) => !from.is_terminal(),
            (Uninitialized, Initializing)
            | (Initializing, DirectUploading | ChunkUploading)
            | (DirectUploading | ChunkUploading, Finalizing)
            | (Finalizing, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::DirectUploading => "direct-uploading",
            SessionState::ChunkUploading => "chunk-uploading",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// One part of a chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// 1-based, contiguous.
    pub part_number: u32,
    pub byte_range: Range<u64>,
    /// Set once the backend acknowledged the part.
    pub etag: Option<String>,
}

/// Read-only copy of a session's state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub transfer_id: Option<String>,
    pub filename: String,
    pub storage_key: String,
    pub mode: Option<UploadMode>,
    pub state: SessionState,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub part_size: Option<u64>,
    pub total_parts: Option<u32>,
    pub error: Option<String>,
}

/// One upload attempt for one file (thread-safe).
///
/// The session enforces the state machine: an illegal transition is
/// reported as `Err` with a reason and leaves the state untouched.
pub struct TransferSession {
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    filename: String,
    storage_key: String,
    total_bytes: u64,
    state: SessionState,
    transfer_id: Option<String>,
    upload_id: Option<String>,
    mode: Option<UploadMode>,
    part_size: Option<u64>,
    parts: Vec<FilePart>,
    transferred_bytes: u64,
    error: Option<String>,
}

impl TransferSession {
    pub fn new(filename: impl Into<String>, storage_key: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(SessionInner {
                filename: filename.into(),
                storage_key: storage_key.into(),
                total_bytes,
                state: SessionState::Uninitialized,
                transfer_id: None,
                upload_id: None,
                mode: None,
                part_size: None,
                parts: Vec::new(),
                transferred_bytes: 0,
                error: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(s: &mut SessionInner, next: SessionState) -> Result<(), String> {
        if !s.state.can_advance_to(next) {
            return Err(format!("cannot move from {} to {next}", s.state));
        }
        s.state = next;
        Ok(())
    }

    /// `uninitialized → initializing`.
    pub fn begin_init(&self) -> Result<(), String> {
        Self::advance(&mut self.write(), SessionState::Initializing)
    }

    /// Applies the backend's init answer and enters the upload state for
    /// its mode. Chunked answers must carry an upload id, a part size and a
    /// part count that agrees with the file size.
    pub fn apply_init(&self, resp: &InitUploadResponse) -> Result<(), String> {
        let mut s = self.write();
        let next = match resp.mode {
            UploadMode::Direct => SessionState::DirectUploading,
            UploadMode::Chunked => SessionState::ChunkUploading,
        };
        if !s.state.can_advance_to(next) {
            return Err(format!("cannot move from {} to {next}", s.state));
        }

        if resp.mode == UploadMode::Chunked {
            let upload_id = resp
                .upload_id
                .clone()
                .filter(|id| !id.is_empty())
                .ok_or("chunked session without upload id")?;
            let part_size = resp.part_size.ok_or("chunked session without part size")?;
            let ranges = plan_parts(s.total_bytes, part_size, resp.total_parts)?;
            s.parts = ranges
                .into_iter()
                .zip(1u32..)
                .map(|(byte_range, part_number)| FilePart {
                    part_number,
                    byte_range,
                    etag: None,
                })
                .collect();
            s.upload_id = Some(upload_id);
            s.part_size = Some(part_size);
        }

        s.transfer_id = Some(resp.transfer_id.clone());
        s.mode = Some(resp.mode);
        s.state = next;
        Ok(())
    }

    /// Records the etag of an uploaded part and counts its bytes.
    pub fn record_part(&self, part_number: u32, etag: String) -> Result<(), String> {
        let mut s = self.write();
        if s.state != SessionState::ChunkUploading {
            return Err(format!("part {part_number} recorded while {}", s.state));
        }
        let part = s
            .parts
            .iter_mut()
            .find(|p| p.part_number == part_number)
            .ok_or_else(|| format!("unknown part {part_number}"))?;
        if part.etag.is_some() {
            return Err(format!("part {part_number} recorded twice"));
        }
        let len = part.byte_range.end - part.byte_range.start;
        part.etag = Some(etag);
        s.transferred_bytes += len;
        Ok(())
    }

    /// Marks the whole payload of a direct session as sent.
    pub fn record_direct(&self) -> Result<(), String> {
        let mut s = self.write();
        if s.state != SessionState::DirectUploading {
            return Err(format!("direct payload recorded while {}", s.state));
        }
        s.transferred_bytes = s.total_bytes;
        Ok(())
    }

    /// Enters `finalizing` and returns the ordered part list to submit
    /// (empty for direct sessions). Fails if any chunked part lacks an etag.
    pub fn begin_finalize(&self) -> Result<Vec<CompletedPart>, String> {
        let mut s = self.write();
        let completed = s
            .parts
            .iter()
            .map(|p| {
                p.etag
                    .clone()
                    .map(|etag| CompletedPart {
                        part_number: p.part_number,
                        etag,
                    })
                    .ok_or_else(|| format!("part {} has no etag", p.part_number))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::advance(&mut s, SessionState::Finalizing)?;
        Ok(completed)
    }

    pub fn complete(&self) -> Result<(), String> {
        Self::advance(&mut self.write(), SessionState::Completed)
    }

    /// Marks the session failed. No-op once terminal.
    pub fn fail(&self, reason: &str) {
        let mut s = self.write();
        if Self::advance(&mut s, SessionState::Failed).is_ok() {
            s.error = Some(reason.to_string());
        }
    }

    /// Marks the session aborted. No-op once terminal.
    pub fn abort(&self) {
        let _ = Self::advance(&mut self.write(), SessionState::Aborted);
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn filename(&self) -> String {
        self.read().filename.clone()
    }

    pub fn storage_key(&self) -> String {
        self.read().storage_key.clone()
    }

    pub fn upload_id(&self) -> Option<String> {
        self.read().upload_id.clone()
    }

    /// Bytes acknowledged by the backend so far.
    pub fn offset(&self) -> u64 {
        self.read().transferred_bytes
    }

    /// Parts still lacking an etag, in ascending order.
    pub fn pending_parts(&self) -> Vec<FilePart> {
        self.read()
            .parts
            .iter()
            .filter(|p| p.etag.is_none())
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.read();
        SessionSnapshot {
            transfer_id: s.transfer_id.clone(),
            filename: s.filename.clone(),
            storage_key: s.storage_key.clone(),
            mode: s.mode,
            state: s.state,
            total_bytes: s.total_bytes,
            transferred_bytes: s.transferred_bytes,
            part_size: s.part_size,
            total_parts: (s.mode == Some(UploadMode::Chunked)).then_some(s.parts.len() as u32),
            error: s.error.clone(),
        }
    }
}
