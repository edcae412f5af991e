//! Upload flow: scan, quota, duplicate guard, sequential transfer.
//!
//! This crate turns whatever the user dropped, picked or pasted into a
//! running transfer. It is a library crate with no UI dependencies; the
//! caller supplies a [`RemoteStore`] and renders the events.
//!
//! # Pipeline
//!
//! 1. **Scan**: normalize input into relative paths, walking dropped folders
//! 2. **Quota**: count, size, depth and segment-length checks, fail fast
//! 3. **Guard**: drop an identical submission to the same folder
//! 4. **Validate**: reject traversal and absolute paths
//! 5. **Upload**: one session per file, files in order, parts in order
//!
//! [`RemoteStore`]: filedeck_store::RemoteStore

pub mod error;
pub mod guard;
pub mod manager;
pub mod scanner;
pub mod types;

pub use error::SubmitError;
pub use guard::{DEFAULT_GUARD_WINDOW, UploadGuardStore, build_signature};
pub use manager::{TransferHandle, TransferManager, TransferObserver};
pub use scanner::{
    DirectoryHandle, DirectoryReader, DropItem, FsDirectory, PickedFile, ScanOutput, ScanSource,
    ScannedEntry, drop_item_from_path, scan,
};
pub use types::{
    DestinationContext, FileFailure, FileOutcome, FileStatus, ScanWarning, TransferEvent,
    TransferSummary,
};
