//! Error types for the core building blocks.

use thiserror::Error;

/// Errors from the identifier space and the resource mapping.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The configured GUID width is unusable.
    #[error("invalid GUID size: {0} bits (must be a multiple of 8, at least 64)")]
    InvalidGuidSize(u32),

    /// The mapping was built from an empty partition list.
    #[error("no resource partitions declared")]
    NoPartitions,

    /// No partition matches the given resources.
    #[error("no partition for resources {0}")]
    UnknownPartition(crate::resources::Resources),

    /// A partition walk ran out of partitions to try.
    #[error("resource partitions exhausted")]
    PartitionsExhausted,

    /// A resource tuple failed validation.
    #[error("invalid resources {0}")]
    InvalidResources(crate::resources::Resources),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
