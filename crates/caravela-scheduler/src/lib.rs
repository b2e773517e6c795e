//! CARAVELA workload scheduling.
//!
//! The scheduler takes user submissions (one or many container
//! configurations with group policies), asks discovery for candidate
//! offers, ranks them with the configured policy, and commits the workload
//! onto the chosen supplier. The containers manager is the supplier-side
//! counterpart: it reserves the resources and drives the container engine.

pub mod config;
pub mod containers;
pub mod error;
pub mod policy;
mod scheduler;

pub use config::{SchedulerConfig, SchedulingPolicyType};
pub use containers::ContainersManager;
pub use error::{Result, SchedulerError};
pub use policy::{build_policy, BinPack, SchedulingPolicy, Spread};
pub use scheduler::Scheduler;
