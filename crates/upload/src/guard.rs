//! Duplicate-submission suppression.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::scanner::ScannedEntry;

/// Default suppression window.
pub const DEFAULT_GUARD_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct GuardEntry {
    signature: String,
    expires_at: Instant,
}

/// Remembers the last submission per upload target so an identical
/// selection submitted again within the window is ignored.
#[derive(Debug)]
pub struct UploadGuardStore {
    window: Duration,
    entries: Mutex<HashMap<String, GuardEntry>>,
}

impl Default for UploadGuardStore {
    fn default() -> Self {
        Self::new(DEFAULT_GUARD_WINDOW)
    }
}

impl UploadGuardStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when `target` holds the same `signature` and has not expired.
    /// Expired entries are dropped on the way.
    pub fn should_skip(&self, target: &str, signature: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        entries
            .get(target)
            .is_some_and(|e| e.signature == signature)
    }

    /// Records `signature` for `target` for one window from now.
    pub fn arm(&self, target: &str, signature: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            target.to_string(),
            GuardEntry {
                signature: signature.to_string(),
                expires_at: Instant::now() + self.window,
            },
        );
    }

    /// Forgets `target`, but only while it still holds `signature`; a newer
    /// submission that re-armed the target stays guarded.
    pub fn release(&self, target: &str, signature: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(target)
            .is_some_and(|e| e.signature == signature)
        {
            entries.remove(target);
        }
    }
}

/// Signature of a selection: `path:size:lastModified` per file, in order,
/// with the path taken below the destination folder.
pub fn build_signature(entries: &[ScannedEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}:{}:{}", e.upload_path(), e.size, e.source.last_modified()))
        .collect::<Vec<_>>()
        .join("|")
}
