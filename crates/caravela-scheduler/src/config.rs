//! Configuration types for the scheduler.

use serde::Deserialize;
use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How candidate offers are ranked against a demand.
    pub policy: SchedulingPolicyType,
    /// Period of the container status sweep.
    #[serde(with = "serde_duration_secs")]
    pub containers_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicyType::BinPack,
            containers_check_interval: Duration::from_secs(30),
        }
    }
}

/// Offer ranking policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicyType {
    /// Best-fit: least slack first, packing workloads tightly.
    BinPack,
    /// Worst-fit: most slack first, spreading load.
    Spread,
}

/// Serde helper for `Duration` as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
