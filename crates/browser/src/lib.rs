//! Browsing state for a remote folder store.
//!
//! [`FileTree`] mirrors the folder hierarchy and loads nodes on demand;
//! [`ListingView`] holds the paginated file list of the selected folder
//! together with keyword, mode and selection. Both talk to the backend
//! through [`RemoteStore`] and keep their previous state when a fetch fails.
//!
//! [`RemoteStore`]: filedeck_store::RemoteStore

pub mod error;
pub mod listing;
pub mod tree;

pub use error::BrowserError;
pub use listing::{ListingSettings, ListingSnapshot, ListingView};
pub use tree::{FileTree, LoadState, TreeNode, TreeRow, fallback_breadcrumbs, parent_path};
