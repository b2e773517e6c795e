//! Error types for the discovery subsystem.

use thiserror::Error;

use caravela_core::{ClientError, CoreError, OverlayError};

/// Discovery errors.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// No trader anywhere in the system accepted an offer.
    #[error("no suppliers available to accept the offer")]
    NoSuppliersAvailable,

    /// The offer search exhausted every candidate partition.
    #[error("no offers available for the demand")]
    NoOffersAvailable,

    /// An operation referenced an offer this node no longer holds.
    #[error("stale offer {0}")]
    StaleOffer(i64),

    /// A message targeted a GUID this node does not trade for.
    #[error("no local trader for GUID {0}")]
    UnknownTrader(String),

    /// A demand or advertisement carried unusable resources.
    #[error("invalid resources in request")]
    InvalidResources,

    /// Identifier-space or mapping failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Remote call failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Overlay lookup or membership failure.
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
