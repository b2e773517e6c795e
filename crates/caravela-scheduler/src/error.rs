//! Error types for the scheduler.

use thiserror::Error;

use caravela_core::{ClientError, RuntimeError};

/// Scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The submission carried no container configurations.
    #[error("no container configurations in submission")]
    EmptySubmission,

    /// Discovery found no offers for the demand.
    #[error("no offers found for the demand")]
    NoOffersFound,

    /// Every candidate offer refused the launch.
    #[error("all {0} candidate offers rejected the deployment")]
    AllOffersRejected(usize),

    /// The local supplier refused to reserve the offer's resources.
    #[error("offer {0} could not be reserved")]
    ReservationFailed(i64),

    /// A container id is not registered on this node.
    #[error("unknown container {0}")]
    UnknownContainer(String),

    /// The container engine failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A remote call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
