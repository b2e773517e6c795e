//! Node configuration.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::time::Duration;

use caravela_discovery::DiscoveryConfig;
use caravela_proto::CpuClass;
use caravela_scheduler::SchedulerConfig;

use crate::error::{NodeError, Result};

/// Configuration of one CARAVELA node.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's IP, as other nodes will address it.
    pub host_ip: String,
    /// Port of the REST/RPC API every node listens on.
    pub api_port: u16,
    /// Port of the overlay transport.
    pub overlay_port: u16,
    /// CPU class of this machine.
    pub cpu_class: CpuClass,
    /// Width of the identifier space in bits.
    pub hash_size_bits: u32,
    /// CPU classes the key space is partitioned by.
    pub cpu_classes_partitions: Vec<CpuClass>,
    /// CPU core counts the key space is partitioned by.
    pub cpu_cores_partitions: Vec<u32>,
    /// RAM sizes (MB) the key space is partitioned by.
    pub ram_partitions: Vec<u32>,
    /// Deadline for every outbound node-to-node request.
    #[serde(with = "serde_duration_secs")]
    pub request_timeout: Duration,
    /// Discovery settings.
    pub discovery: DiscoveryConfig,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host_ip: "127.0.0.1".to_owned(),
            api_port: 8001,
            overlay_port: 8000,
            cpu_class: CpuClass::Low,
            hash_size_bits: 160,
            cpu_classes_partitions: vec![CpuClass::Low],
            cpu_cores_partitions: vec![1, 2, 4],
            ram_partitions: vec![1024, 2048, 4096],
            request_timeout: Duration::from_secs(5),
            discovery: DiscoveryConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from `caravela.toml` merged with
    /// `CARAVELA_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("caravela.toml")
    }

    /// Loads configuration from a specific TOML file plus the environment.
    pub fn load_from(path: &str) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CARAVELA_").split("_"))
            .extract()
            .map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Validates the parts serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.host_ip.is_empty() {
            return Err(NodeError::Config("host_ip must be set".into()));
        }
        if self.cpu_cores_partitions.is_empty() || self.ram_partitions.is_empty() {
            return Err(NodeError::Config(
                "cpu_cores_partitions and ram_partitions must be non-empty".into(),
            ));
        }
        Ok(())
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
