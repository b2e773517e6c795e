//! The container engine interface.
//!
//! The engine (Docker or compatible) is an external collaborator; the node
//! consumes the few operations the containers manager needs.

use async_trait::async_trait;
use thiserror::Error;

use caravela_proto::{ContainerRunState, PortMapping};

/// Errors from the container engine.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The engine could not be reached.
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// Image pull or container creation failed.
    #[error("container launch failed: {0}")]
    Launch(String),

    /// A stop/remove operation failed.
    #[error("container removal failed: {0}")]
    Remove(String),
}

/// The consumed container engine surface.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Maximum CPU cores and RAM (MB) the engine can dedicate.
    async fn cpu_and_ram(&self) -> Result<(u32, u32), RuntimeError>;

    /// Runs a container, returning the engine-assigned identifier.
    async fn run(
        &self,
        image_key: &str,
        port_mappings: &[PortMapping],
        args: &[String],
        cpus: u32,
        ram: u32,
    ) -> Result<String, RuntimeError>;

    /// Stops and removes a container.
    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Reports a container's run state.
    async fn status(&self, container_id: &str) -> Result<ContainerRunState, RuntimeError>;
}
