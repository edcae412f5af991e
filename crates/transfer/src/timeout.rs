use std::time::Duration;

use crate::TransferSettings;

const MIB: f64 = 1024.0 * 1024.0;

/// Wall-clock budget for one session: linear in payload size, clamped to
/// `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub floor: Duration,
    pub ceiling: Duration,
    pub per_mib: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from(&TransferSettings::default())
    }
}

impl From<&TransferSettings> for TimeoutPolicy {
    fn from(settings: &TransferSettings) -> Self {
        let floor = Duration::from_secs(settings.timeout_floor_secs);
        Self {
            floor,
            ceiling: Duration::from_secs(settings.timeout_ceiling_secs).max(floor),
            per_mib: Duration::from_secs(settings.timeout_per_mib_secs),
        }
    }
}

impl TimeoutPolicy {
    /// Budget for a payload of `total_bytes`.
    pub fn budget(&self, total_bytes: u64) -> Duration {
        let mib = total_bytes as f64 / MIB;
        let linear = Duration::try_from_secs_f64(self.per_mib.as_secs_f64() * mib)
            .unwrap_or(self.ceiling);
        linear.clamp(self.floor, self.ceiling)
    }
}
