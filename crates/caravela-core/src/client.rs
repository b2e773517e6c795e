//! The node-to-node client interface.
//!
//! Suppliers, traders and the scheduler all talk to remote nodes through
//! [`NodeClient`] instead of holding references to each other, so the
//! components form a star around the transport rather than a cycle. The
//! HTTP implementation lives in the node crate; tests plug in mocks.

use async_trait::async_trait;
use thiserror::Error;

use caravela_proto::{
    ContainerConfig, ContainerStatus, ErrorCode, GetOffersResponse, NodeRef, Offer,
};

/// Errors surfaced by a [`NodeClient`] implementation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The remote node could not be reached.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The request ran past its deadline.
    #[error("request timed out")]
    Timeout,

    /// The remote node answered with a protocol-level error.
    #[error("rejected by remote: {0}")]
    Rejected(ErrorCode),

    /// The response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Typed RPC surface between nodes.
///
/// Every call is bounded by the configured request timeout; a timeout or
/// transport failure is reported as an error and interpreted by the caller
/// (a missed refresh, a rejected offer, the next candidate in a ranked
/// list).
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Supplier → trader: publish a new offer.
    async fn create_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()>;

    /// Trader → supplier: liveness handshake. `Ok(true)` iff the supplier
    /// still owns the offer and recognises the calling trader.
    async fn refresh_offer(
        &self,
        from_trader: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<bool>;

    /// Supplier → trader: replace a held offer's amount/resources in place.
    async fn update_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()>;

    /// Supplier → trader: withdraw an offer.
    async fn remove_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()>;

    /// Any node → trader: ask for held offers.
    async fn get_offers(
        &self,
        from_node: &NodeRef,
        to_trader: &NodeRef,
        relay: bool,
    ) -> ClientResult<GetOffersResponse>;

    /// Trader → trader: tell a cold neighbour where offers live.
    async fn advertise_offers_neighbour(
        &self,
        from_trader: &NodeRef,
        to_neighbour: &NodeRef,
        offering: &NodeRef,
    ) -> ClientResult<()>;

    /// Scheduler → supplier: reserve an offer and run containers on it.
    async fn launch_containers(
        &self,
        from_buyer: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
        configs: &[ContainerConfig],
    ) -> ClientResult<Vec<ContainerStatus>>;

    /// Scheduler → supplier: stop a previously launched container.
    async fn stop_local_container(
        &self,
        to_supplier: &NodeRef,
        container_id: &str,
    ) -> ClientResult<()>;
}
