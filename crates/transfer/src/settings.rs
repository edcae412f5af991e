use serde::{Deserialize, Serialize};

/// Tunables for the session driver, as stored in the engine config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Retries per part after the first attempt.
    pub max_retries: u32,
    /// Base backoff; the n-th retry waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    pub timeout_floor_secs: u64,
    pub timeout_ceiling_secs: u64,
    /// Session budget added per MiB of payload.
    pub timeout_per_mib_secs: u64,
    /// Minimum gap between two progress events of one file.
    pub progress_interval_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_floor_secs: 60,
            timeout_ceiling_secs: 30 * 60,
            timeout_per_mib_secs: 10,
            progress_interval_ms: 250,
        }
    }
}
