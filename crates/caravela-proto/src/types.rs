//! Common types shared across the protocol.

use serde::{Deserialize, Serialize};

/// CPU performance class of a machine.
///
/// Classes partition the identifier space before core count and RAM, so two
/// machines with the same core/RAM figures but different classes advertise
/// into different regions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CpuClass {
    /// Commodity hardware.
    Low,
    /// Server-grade hardware.
    High,
}

impl CpuClass {
    /// Numeric form used for ordering and the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    /// Parses the numeric form, `None` for unknown values.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for CpuClass {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for CpuClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A resource quantum: CPU class, CPU cores and RAM in megabytes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Resources {
    /// CPU class of the machine offering/demanding the resources.
    pub cpu_class: CpuClass,
    /// Number of CPU cores.
    pub cpus: u32,
    /// RAM in megabytes.
    pub ram: u32,
}

impl Resources {
    /// Creates a new resource quantum.
    #[must_use]
    pub const fn new(cpu_class: CpuClass, cpus: u32, ram: u32) -> Self {
        Self {
            cpu_class,
            cpus,
            ram,
        }
    }
}

impl std::fmt::Display for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{};{};{}>", self.cpu_class, self.cpus, self.ram)
    }
}

/// A node reference carried in messages.
///
/// The GUID is a decimal string (the identifier space is wider than any
/// primitive integer). It is empty when the sender's identity in the key
/// space is implicit, e.g. a supplier identifying itself by IP only.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRef {
    /// IP address of the node.
    pub ip: String,
    /// GUID as a decimal string; empty when implicit.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guid: String,
}

impl NodeRef {
    /// A reference carrying only an IP.
    #[must_use]
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            guid: String::new(),
        }
    }

    /// A reference carrying both IP and GUID.
    #[must_use]
    pub fn new(ip: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            guid: guid.into(),
        }
    }
}

/// An offer as carried on the wire.
///
/// `id` is unique per supplier; the pair `(supplier IP, id)` is globally
/// unique. `amount` is the number of identical resource quanta the offer
/// represents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// Supplier-local offer identifier.
    pub id: i64,
    /// How many identical quanta this offer represents.
    pub amount: u32,
    /// The resource quantum.
    pub resources: Resources,
}

impl Offer {
    /// Creates a new offer.
    #[must_use]
    pub const fn new(id: i64, amount: u32, resources: Resources) -> Self {
        Self {
            id,
            amount,
            resources,
        }
    }
}

/// An offer returned by a discovery query, annotated with its supplier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AvailableOffer {
    /// The supplier holding the resources, GUID included so rankings can
    /// break ties on it.
    pub supplier: NodeRef,
    /// The offer itself.
    #[serde(flatten)]
    pub offer: Offer,
}

/// A single partition's health sample ring, as exchanged between nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartitionStateSnapshot {
    /// The partition's resource tuple.
    pub resources: Resources,
    /// Recent hit (`true`) / miss (`false`) samples, newest first.
    pub hits: Vec<bool>,
}

/// How a group of containers submitted together may be placed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupPolicy {
    /// All containers of the group must land on a single supplier.
    CoLocation,
    /// Containers are scheduled independently.
    Spread,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self::Spread
    }
}

/// A container port mapping.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortMapping {
    /// Port exposed on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

/// User-submitted configuration for one container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Image to run, e.g. a registry key.
    pub image_key: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Port mappings host → container.
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    /// Resource limits for the container.
    pub resources: Resources,
    /// Placement constraint relative to the rest of the submission.
    #[serde(default)]
    pub group_policy: GroupPolicy,
}

/// Runtime state of a container as reported by the container engine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRunState {
    /// The container is running.
    Running,
    /// The container exited.
    Finished,
    /// The engine could not report a state.
    Unknown,
}

/// Status of a deployed container, returned to the submitting user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    /// Engine-assigned container identifier.
    pub container_id: String,
    /// Image the container was created from.
    pub image_key: String,
    /// IP of the supplier node running it.
    pub supplier_ip: String,
    /// Resource limits it was granted.
    pub resources: Resources,
    /// Last observed run state.
    pub state: ContainerRunState,
}
