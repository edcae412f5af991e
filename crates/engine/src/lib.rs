//! Hierarchical file-transfer and virtual directory-tree engine.
//!
//! [`Engine`] ties the pieces together: uploads go through
//! [`TransferManager`](filedeck_upload::TransferManager), browsing through
//! one [`BrowserSession`] per `(scope, category)`, and both share a single
//! [`RemoteStore`](filedeck_store::RemoteStore). Configuration is a JSON
//! file ([`EngineConfig`]); logging goes through `tracing`.

pub mod config;
pub mod engine;
pub mod logging;

pub use config::{ConfigError, EngineConfig, GuardSettings, config_path};
pub use engine::{BrowserSession, Engine};
pub use logging::{DEFAULT_FILTER, init_tracing};

pub use filedeck_browser as browser;
pub use filedeck_protocol as protocol;
pub use filedeck_store as store;
pub use filedeck_transfer as transfer;
pub use filedeck_upload as upload;

/// Errors building an [`Engine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] filedeck_store::StoreError),
}
