//! Offering strategies.
//!
//! A strategy decides how the supplier's spare resources become offers and
//! how a demand is turned into a walk over the partitioned key space. The
//! known strategies are a closed set selected by configuration; there is no
//! runtime registry.

mod multiple;
mod single;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use caravela_core::{
    Guid, NodeClient, Overlay, OverlayNode, PartitionStats, ResourceMapping, Resources,
};
use caravela_proto::{AvailableOffer, NodeRef, Offer};

use crate::config::DiscoveryBackend;
use crate::error::{DiscoveryError, Result};
use crate::supplier::SupplierOffer;

pub use multiple::MultipleOfferStrategy;
pub use single::SingleOfferStrategy;

/// How a node's spare resources are advertised and demands resolved.
#[async_trait]
pub trait OfferingStrategy: Send + Sync {
    /// The configuration name of the strategy.
    fn name(&self) -> &'static str;

    /// Splits the available pool into the quanta to advertise this round.
    /// An empty result means nothing worth advertising.
    fn partition_available(&self, available: Resources) -> Vec<Resources>;

    /// Publishes one offer somewhere in the system.
    async fn advertise(&self, offer: Offer, target: Resources) -> Result<SupplierOffer>;

    /// Resolves a demand to concrete offers.
    async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer>;

    /// Whether resource changes are pushed as in-place offer updates
    /// instead of tear-down and re-advertisement.
    fn pushes_updates(&self) -> bool {
        false
    }

    /// Pushes a mutated offer to the trader already holding it.
    async fn push_update(&self, trader: &NodeRef, offer: &Offer) -> Result<()> {
        let _ = (trader, offer);
        Err(DiscoveryError::NoSuppliersAvailable)
    }
}

/// Builds the configured strategy.
#[must_use]
pub fn build_strategy(
    backend: DiscoveryBackend,
    context: Arc<StrategyContext>,
) -> Arc<dyn OfferingStrategy> {
    match backend {
        DiscoveryBackend::SingleOffer => Arc::new(SingleOfferStrategy::new(context)),
        DiscoveryBackend::MultipleOffer => Arc::new(MultipleOfferStrategy::new(context, false)),
        DiscoveryBackend::MultipleOfferUpdates => {
            Arc::new(MultipleOfferStrategy::new(context, true))
        }
    }
}

/// Everything a strategy needs to walk the key space.
pub struct StrategyContext {
    local: NodeRef,
    mapping: Arc<ResourceMapping>,
    overlay: Arc<dyn Overlay>,
    client: Arc<dyn NodeClient>,
    stats: Arc<PartitionStats>,
}

impl StrategyContext {
    /// Creates a context bound to this node's identity and collaborators.
    #[must_use]
    pub fn new(
        local: NodeRef,
        mapping: Arc<ResourceMapping>,
        overlay: Arc<dyn Overlay>,
        client: Arc<dyn NodeClient>,
        stats: Arc<PartitionStats>,
    ) -> Self {
        Self {
            local,
            mapping,
            overlay,
            client,
            stats,
        }
    }

    pub(crate) fn mapping(&self) -> &ResourceMapping {
        &self.mapping
    }

    pub(crate) fn local(&self) -> &NodeRef {
        &self.local
    }

    pub(crate) fn client(&self) -> &dyn NodeClient {
        self.client.as_ref()
    }

    /// The advertise walk: random GUID in the matching partition, then the
    /// partition's first GUID, then progressively less powerful partitions,
    /// until a trader takes the offer or the domain is exhausted.
    ///
    /// What gets pushed is always an exact partition tuple: the target is
    /// snapped onto the grid first, and when the walk has to descend the
    /// offer shrinks to the tuple of the partition actually reached. The
    /// supplier keeps the difference.
    pub(crate) async fn advertise(
        &self,
        mut offer: Offer,
        target: Resources,
    ) -> Result<SupplierOffer> {
        let target = self
            .mapping
            .fittest(target)
            .ok_or(DiscoveryError::NoSuppliersAvailable)?;

        let mut guid = self.mapping.random_guid(target)?;
        let mut nodes = self.trader_candidates(&guid).await;

        if nodes.is_empty() {
            guid = self.mapping.first_guid(target)?;
            nodes = self.trader_candidates(&guid).await;
        }

        while nodes.is_empty() {
            guid = self
                .mapping
                .lower_random(&guid, target)
                .map_err(|_| DiscoveryError::NoSuppliersAvailable)?;
            nodes = self.trader_candidates(&guid).await;
        }

        let placed = self.mapping.resources_for(&guid);
        offer.resources = placed.into();

        let chosen = &nodes[0];
        let trader = NodeRef::new(
            chosen.ip.clone(),
            Guid::from_bytes(&chosen.guid_bytes).to_string(),
        );
        self.client
            .create_offer(&self.local, &trader, &offer)
            .await?;

        debug!(
            offer_id = offer.id,
            trader_ip = %trader.ip,
            resources = %placed,
            "offer placed"
        );
        Ok(SupplierOffer::new(offer, placed, trader))
    }

    /// The discovery walk: random GUID in the demand's partition, query the
    /// traders found there, escalate to dominating partitions until offers
    /// turn up or the domain is exhausted. Partitions whose recent history
    /// is all misses are skipped without a lookup.
    pub(crate) async fn discover(&self, demand: Resources) -> Vec<AvailableOffer> {
        let Some(start) = self.mapping.covering(demand) else {
            return Vec::new();
        };
        let mut guid = match self.mapping.random_guid(start) {
            Ok(guid) => guid,
            Err(_) => return Vec::new(),
        };

        loop {
            let partition = self.mapping.resources_for(&guid);
            if self.stats.try_partition(partition) {
                let offers = self.query_partition(&guid).await;
                if offers.is_empty() {
                    self.stats.miss(partition);
                } else {
                    self.stats.hit(partition);
                    return offers;
                }
            } else {
                debug!(partition = %partition, "partition skipped by stats");
            }

            guid = match self.mapping.higher_random(&guid, demand) {
                Ok(next) => next,
                Err(_) => return Vec::new(),
            };
        }
    }

    async fn query_partition(&self, guid: &Guid) -> Vec<AvailableOffer> {
        for node in self.trader_candidates(guid).await {
            let trader = NodeRef::new(
                node.ip.clone(),
                Guid::from_bytes(&node.guid_bytes).to_string(),
            );
            match self.client.get_offers(&self.local, &trader, true).await {
                Ok(response) => {
                    self.stats.merge(&response.partition_states);
                    if !response.offers.is_empty() {
                        return response.offers;
                    }
                }
                Err(error) => {
                    debug!(trader_ip = %trader.ip, %error, "get_offers failed");
                }
            }
        }
        Vec::new()
    }

    /// Looks up a GUID and keeps only nodes actually inside its partition;
    /// a frontier lookup can return owners of neighbouring partitions.
    async fn trader_candidates(&self, guid: &Guid) -> Vec<OverlayNode> {
        let key = self.mapping.space().to_bytes(guid);
        let nodes = match self.overlay.lookup(&key).await {
            Ok(nodes) => nodes,
            Err(error) => {
                debug!(%error, "overlay lookup failed");
                return Vec::new();
            }
        };

        let target = self.mapping.resources_for(guid);
        nodes
            .into_iter()
            .filter(|node| {
                let node_guid = Guid::from_bytes(&node.guid_bytes);
                self.mapping.resources_for(&node_guid) == target
            })
            .collect()
    }
}
