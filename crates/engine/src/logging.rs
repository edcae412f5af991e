use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,filedeck=debug";

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (or [`DEFAULT_FILTER`]).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_filter: Option<&str>) -> bool {
    let fallback = default_filter.unwrap_or(DEFAULT_FILTER);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .try_init()
        .is_ok()
}
