//! Wire protocol types for CARAVELA node-to-node communication.
//!
//! Every message exchanged between nodes (offer management, discovery
//! queries, container launches) and between the CLI and the local daemon is
//! a typed JSON payload defined here. The crate is deliberately free of any
//! behaviour: it holds data shapes, their serde derives, and the error codes
//! carried on the wire.
//!
//! # Surfaces
//!
//! - **Supplier → Trader**: [`CreateOfferRequest`], [`UpdateOfferRequest`],
//!   [`RemoveOfferRequest`]
//! - **Trader → Supplier**: [`RefreshOfferRequest`] / [`RefreshOfferResponse`]
//! - **Any → Trader**: [`GetOffersRequest`] / [`GetOffersResponse`]
//! - **Trader → Trader**: [`NeighbourOffersRequest`]
//! - **Scheduler → Supplier**: [`LaunchContainersRequest`],
//!   [`StopLocalContainerRequest`]
//! - **User → Daemon**: [`ContainerConfig`], [`ContainerStatus`]

mod error;
mod messages;
mod types;

pub use error::{ErrorCode, ErrorResponse};
pub use messages::{
    CreateOfferRequest, GetOffersRequest, GetOffersResponse, LaunchContainersRequest,
    NeighbourOffersRequest, RefreshOfferRequest, RefreshOfferResponse, RemoveOfferRequest,
    StopLocalContainerRequest, UpdateOfferRequest,
};
pub use types::{
    AvailableOffer, ContainerConfig, ContainerRunState, ContainerStatus, CpuClass, GroupPolicy,
    NodeRef, Offer, PartitionStateSnapshot, PortMapping, Resources,
};
