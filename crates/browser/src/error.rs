//! Error types for tree and listing operations.

use filedeck_store::StoreError;

/// Errors produced while browsing remote folders.
///
/// Fetch failures leave the previous state in place and can be retried.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("could not load folder {path:?}: {source}")]
    TreeFetchFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("could not load file list: {source}")]
    ListingFetchFailed {
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl BrowserError {
    /// True for fetch failures worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            BrowserError::TreeFetchFailed { .. } | BrowserError::ListingFetchFailed { .. } => true,
            BrowserError::Store(e) => e.is_transient(),
            BrowserError::InvalidName(_) => false,
        }
    }
}
