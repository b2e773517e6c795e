//! Configuration for the discovery subsystem.

use serde::Deserialize;
use std::time::Duration;

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Offering strategy to run.
    pub backend: DiscoveryBackend,
    /// Period of the supplier's advertisement tick.
    #[serde(with = "serde_duration_secs")]
    pub supplying_interval: Duration,
    /// Period of the supplier's refresh bookkeeping tick.
    #[serde(with = "serde_duration_secs")]
    pub refreshes_check_interval: Duration,
    /// Period of each trader's refresh push loop.
    #[serde(with = "serde_duration_secs")]
    pub refreshing_interval: Duration,
    /// How long without a refresh before a check tick counts a miss.
    #[serde(with = "serde_duration_secs")]
    pub refresh_missed_timeout: Duration,
    /// Consecutive misses after which the trader is considered dead.
    pub max_refreshes_missed: u32,
    /// Samples kept per partition for the lookup heuristic.
    pub partition_samples: usize,
    /// Synchronous mode: fire-and-forget paths run inline, background
    /// timers are disabled, everything is driven by explicit calls.
    pub simulation: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::SingleOffer,
            supplying_interval: Duration::from_secs(45),
            refreshes_check_interval: Duration::from_secs(30),
            refreshing_interval: Duration::from_secs(15),
            refresh_missed_timeout: Duration::from_secs(20),
            max_refreshes_missed: 3,
            partition_samples: caravela_core::partitions::DEFAULT_SAMPLES,
            simulation: false,
        }
    }
}

/// Named offering strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DiscoveryBackend {
    /// One offer carrying everything the node has spare.
    #[serde(rename = "chord-single-offer")]
    SingleOffer,
    /// Availability split into per-partition sub-offers.
    #[serde(rename = "chord-multiple-offer")]
    MultipleOffer,
    /// As multiple-offer, plus in-place updates instead of re-creation.
    #[serde(rename = "chord-multiple-offer-updates")]
    MultipleOfferUpdates,
}

impl DiscoveryBackend {
    /// The configuration name of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleOffer => "chord-single-offer",
            Self::MultipleOffer => "chord-multiple-offer",
            Self::MultipleOfferUpdates => "chord-multiple-offer-updates",
        }
    }
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
