//! Request and response payloads for the node-to-node RPC surface.

use serde::{Deserialize, Serialize};

use crate::types::{
    AvailableOffer, ContainerConfig, NodeRef, Offer, PartitionStateSnapshot, Resources,
};

/// Supplier → trader: hand over a freshly created offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateOfferRequest {
    /// The supplier publishing the offer.
    pub from_supplier: NodeRef,
    /// The trader expected to hold it (its GUID selects the local trader).
    pub to_trader: NodeRef,
    /// The offer.
    pub offer: Offer,
}

/// Trader → supplier: liveness handshake for a held offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefreshOfferRequest {
    /// The trader performing the refresh.
    pub from_trader: NodeRef,
    /// The offer being refreshed.
    pub offer: Offer,
}

/// Supplier's answer to a refresh.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOfferResponse {
    /// True iff the offer is still live and the caller is its trader.
    pub refreshed: bool,
}

/// Supplier → trader: mutate a held offer in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateOfferRequest {
    /// The supplier that owns the offer.
    pub from_supplier: NodeRef,
    /// The trader holding it.
    pub to_trader: NodeRef,
    /// New amount/resources under the same offer id.
    pub offer: Offer,
}

/// Supplier → trader: withdraw an offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoveOfferRequest {
    /// The supplier withdrawing the offer.
    pub from_supplier: NodeRef,
    /// The trader holding it.
    pub to_trader: NodeRef,
    /// Offer to delete (only `id` is significant).
    pub offer: Offer,
}

/// Any node → trader: query held offers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GetOffersRequest {
    /// The querying node.
    pub from_node: NodeRef,
    /// The trader being queried (its GUID selects the local trader).
    pub to_trader: NodeRef,
    /// Whether a cold trader may relay the query one hop to a neighbour.
    pub relay: bool,
}

/// Offers returned by a trader, with the answering node's partition view
/// piggybacked so the requester can refine its own.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOffersResponse {
    /// Offers currently held (possibly via one relay hop).
    pub offers: Vec<AvailableOffer>,
    /// The answering node's partition-state samples.
    #[serde(default)]
    pub partition_states: Vec<PartitionStateSnapshot>,
}

/// Trader → trader: advertise a trader that holds offers, so a cold
/// neighbour can relay `get_offers` queries to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NeighbourOffersRequest {
    /// The trader sending the hint.
    pub from_trader: NodeRef,
    /// The neighbour trader that should record it.
    pub to_neighbour: NodeRef,
    /// The trader that holds the offers (usually the sender itself).
    pub offering: NodeRef,
}

/// Scheduler → supplier: reserve an offer's resources and run containers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LaunchContainersRequest {
    /// The node submitting the workload.
    pub from_buyer: NodeRef,
    /// The offer whose resources are being consumed.
    pub offer: Offer,
    /// Containers to run on the supplier.
    pub configs: Vec<ContainerConfig>,
}

/// Scheduler → supplier: stop a container previously launched there.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StopLocalContainerRequest {
    /// Engine-assigned container identifier.
    pub container_id: String,
}

impl GetOffersRequest {
    /// Convenience constructor for a non-relayed query.
    #[must_use]
    pub fn direct(from_node: NodeRef, to_trader: NodeRef) -> Self {
        Self {
            from_node,
            to_trader,
            relay: false,
        }
    }
}

impl LaunchContainersRequest {
    /// Total resources the containers in this request need.
    #[must_use]
    pub fn total_resources(&self) -> Resources {
        let mut total = Resources::default();
        for config in &self.configs {
            total.cpu_class = config.resources.cpu_class;
            total.cpus += config.resources.cpus;
            total.ram += config.resources.ram;
        }
        total
    }
}
