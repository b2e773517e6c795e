//! The discovery facade.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use caravela_core::{
    Guid, NodeClient, Overlay, PartitionStats, ResourceMapping, Resources,
};
use caravela_proto::{AvailableOffer, GetOffersResponse, NodeRef, Offer, PartitionStateSnapshot};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::strategy::{build_strategy, StrategyContext};
use crate::supplier::Supplier;
use crate::trader::Trader;

/// The slice of discovery that components co-located on the node consume:
/// the scheduler asks for offers, the containers manager reserves and
/// releases resources. Kept as a trait so those components can be exercised
/// without a live overlay.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Offers matching `demand` somewhere in the system.
    async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer>;

    /// Atomically reserves `demand` out of a local offer.
    async fn obtain_resources(&self, offer_id: i64, demand: Resources) -> bool;

    /// Returns resources freed by a finished container.
    async fn return_resources(&self, released: Resources);
}

#[async_trait]
impl DiscoveryService for Discovery {
    async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer> {
        Discovery::find_offers(self, demand).await
    }

    async fn obtain_resources(&self, offer_id: i64, demand: Resources) -> bool {
        Discovery::obtain_resources(self, offer_id, demand).await
    }

    async fn return_resources(&self, released: Resources) {
        Discovery::return_resources(self, released).await;
    }
}

/// Combines the supplier, the local traders and the partition heuristic
/// into the component the rest of the node consumes.
pub struct Discovery {
    config: Arc<DiscoveryConfig>,
    local_ip: String,
    mapping: Arc<ResourceMapping>,
    client: Arc<dyn NodeClient>,
    overlay: Arc<dyn Overlay>,
    stats: Arc<PartitionStats>,
    supplier: Arc<Supplier>,
    traders: DashMap<String, Arc<Trader>>,
    cancel: CancellationToken,
}

impl Discovery {
    /// Wires up discovery for the node `local` owning `max_resources`.
    ///
    /// `local` carries the node's GUID so offers advertised from here can
    /// be ranked deterministically by remote schedulers.
    #[must_use]
    pub fn new(
        config: DiscoveryConfig,
        local: NodeRef,
        overlay: Arc<dyn Overlay>,
        client: Arc<dyn NodeClient>,
        mapping: Arc<ResourceMapping>,
        max_resources: Resources,
    ) -> Self {
        let config = Arc::new(config);
        let local_ip = local.ip.clone();
        let stats = Arc::new(PartitionStats::new(config.partition_samples));

        let context = Arc::new(StrategyContext::new(
            local.clone(),
            mapping.clone(),
            overlay.clone(),
            client.clone(),
            stats.clone(),
        ));
        let strategy = build_strategy(config.backend, context);

        let supplier = Arc::new(Supplier::new(
            config.clone(),
            local,
            client.clone(),
            mapping.clone(),
            strategy,
            max_resources,
        ));

        Self {
            config,
            local_ip,
            mapping,
            client,
            overlay,
            stats,
            supplier,
            traders: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the background loops. Under simulation nothing is spawned and
    /// the supplier advertises once, synchronously.
    pub async fn start(&self) {
        if self.config.simulation {
            self.supplier.advertise_available().await;
        } else {
            Arc::clone(&self.supplier).start(self.cancel.child_token());
        }
        info!(backend = self.config.backend.as_str(), "discovery started");
    }

    /// Signals every background loop to stop.
    pub fn stop(&self) {
        info!("discovery stopping");
        self.cancel.cancel();
    }

    /// Instantiates a trader for a GUID the overlay handed to this node.
    pub fn add_trader(&self, guid_bytes: &[u8]) {
        let guid = Guid::from_bytes(guid_bytes);
        let trader = Arc::new(Trader::new(
            self.config.clone(),
            guid.clone(),
            &self.local_ip,
            self.client.clone(),
            self.overlay.clone(),
            self.mapping.clone(),
        ));
        info!(
            guid = %guid.short(),
            handled = %trader.handled_resources(),
            "trader created"
        );
        Arc::clone(&trader).start(self.cancel.child_token());
        self.traders.insert(guid.to_string(), trader);
    }

    /// Offers matching `demand`, discovered by the configured strategy.
    pub async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer> {
        self.supplier.find_offers(demand).await
    }

    /// Inbound: a supplier hands an offer to one of our traders.
    pub async fn create_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> Result<()> {
        let trader = self.trader_for(to_trader)?;
        trader.create_offer(from_supplier, offer).await
    }

    /// Inbound: a trader refreshes an offer we supplied.
    pub fn refresh_offer(&self, from_trader: &NodeRef, offer_id: i64) -> bool {
        self.supplier.refresh_offer(from_trader, offer_id)
    }

    /// Inbound: a supplier mutates an offer held by one of our traders.
    pub fn update_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> Result<()> {
        let trader = self.trader_for(to_trader)?;
        trader.update_offer(from_supplier, offer)
    }

    /// Inbound: a supplier withdraws an offer from one of our traders.
    pub fn remove_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer_id: i64,
    ) -> Result<()> {
        let trader = self.trader_for(to_trader)?;
        trader.remove_offer(from_supplier, offer_id);
        Ok(())
    }

    /// Inbound: a node queries one of our traders, with the local partition
    /// view piggybacked on the answer.
    pub async fn get_offers(&self, to_trader: &NodeRef, relay: bool) -> Result<GetOffersResponse> {
        let trader = self.trader_for(to_trader)?;
        let offers = trader.get_offers(relay).await;
        Ok(GetOffersResponse {
            offers,
            partition_states: self.stats.snapshot(),
        })
    }

    /// Inbound: a trader tells one of ours where offers live.
    pub fn advertise_offers_neighbour(
        &self,
        to_neighbour: &NodeRef,
        offering: NodeRef,
    ) -> Result<()> {
        let trader = self.trader_for(to_neighbour)?;
        trader.advertise_offers_neighbour(offering);
        Ok(())
    }

    /// Reserves `demand` out of a local offer for a container launch.
    pub async fn obtain_resources(&self, offer_id: i64, demand: Resources) -> bool {
        self.supplier.obtain_resources(offer_id, demand).await
    }

    /// Returns resources freed by a finished container.
    pub async fn return_resources(&self, released: Resources) {
        self.supplier.return_resources(released).await;
    }

    /// Merges a remote partition view into the local heuristic.
    pub fn merge_partition_states(&self, remote: &[PartitionStateSnapshot]) {
        self.stats.merge(remote);
    }

    /// The local partition view, as piggybacked on discovery responses.
    #[must_use]
    pub fn partition_states(&self) -> Vec<PartitionStateSnapshot> {
        self.stats.snapshot()
    }

    /// Runs one refresh round on every local trader. Under simulation the
    /// trader loops are disabled and this is how refreshes are driven.
    pub async fn refresh_traders(&self) {
        let traders: Vec<Arc<Trader>> = self.traders.iter().map(|t| t.value().clone()).collect();
        for trader in traders {
            trader.refresh_round().await;
        }
    }

    /// The local supplier, for components co-located on this node.
    #[must_use]
    pub fn supplier(&self) -> &Arc<Supplier> {
        &self.supplier
    }

    /// Number of traders this node currently runs.
    #[must_use]
    pub fn trader_count(&self) -> usize {
        self.traders.len()
    }

    fn trader_for(&self, target: &NodeRef) -> Result<Arc<Trader>> {
        match self.traders.get(&target.guid) {
            Some(trader) => Ok(trader.clone()),
            None => {
                debug!(guid = %target.guid, "no local trader for target");
                Err(DiscoveryError::UnknownTrader(target.guid.clone()))
            }
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("local_ip", &self.local_ip)
            .field("traders", &self.traders.len())
            .finish()
    }
}
