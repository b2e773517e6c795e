//! The supplier: keeps the node's spare resources advertised.
//!
//! All supplier state (available pool, active offers, offer id counter)
//! lives behind one mutex with bounded hold time: remote calls are planned
//! under the lock and dispatched after it is released. In simulation mode
//! the dispatch happens inline and background timers are disabled, so tests
//! drive every transition explicitly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use caravela_core::{NodeClient, ResourceMapping, Resources};
use caravela_proto::{AvailableOffer, NodeRef, Offer};

use crate::config::DiscoveryConfig;
use crate::strategy::OfferingStrategy;

/// The supplier-side view of an offer placed with a trader.
#[derive(Debug, Clone)]
pub struct SupplierOffer {
    offer: Offer,
    resources: Resources,
    trader: NodeRef,
    last_refresh: Instant,
    refreshes_missed: u32,
}

impl SupplierOffer {
    /// Creates a live offer registered with `trader`.
    #[must_use]
    pub fn new(offer: Offer, resources: Resources, trader: NodeRef) -> Self {
        Self {
            offer,
            resources,
            trader,
            last_refresh: Instant::now(),
            refreshes_missed: 0,
        }
    }

    /// Supplier-local offer id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.offer.id
    }

    /// The wire form of the offer.
    #[must_use]
    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    /// The total resources the offer accounts for (unit tuple times
    /// amount).
    #[must_use]
    pub fn resources(&self) -> Resources {
        self.resources
    }

    /// The single-unit tuple the offer carries on the wire.
    #[must_use]
    pub fn unit(&self) -> Resources {
        Resources::from(self.offer.resources)
    }

    /// The trader responsible for the offer.
    #[must_use]
    pub fn trader(&self) -> &NodeRef {
        &self.trader
    }

    /// Consecutive check ticks without a refresh.
    #[must_use]
    pub fn refreshes_missed(&self) -> u32 {
        self.refreshes_missed
    }

    /// Records a successful refresh from the responsible trader.
    pub fn refresh(&mut self) {
        self.last_refresh = Instant::now();
        self.refreshes_missed = 0;
    }

    /// Counts a miss when the trader has been silent past the timeout.
    pub fn verify_refreshes(&mut self, timeout: Duration, now: Instant) {
        if now.duration_since(self.last_refresh) >= timeout {
            self.refreshes_missed += 1;
        }
    }

    /// Records one more unit folded into the offer by an in-place update.
    fn bump_amount(&mut self, unit: Resources) {
        self.offer.amount += 1;
        self.resources.add(unit);
    }
}

#[derive(Debug)]
struct SupplierState {
    max: Resources,
    available: Resources,
    next_offer_id: i64,
    active: HashMap<i64, SupplierOffer>,
}

/// Manages the node's own resources and their advertisement.
pub struct Supplier {
    config: Arc<DiscoveryConfig>,
    local: NodeRef,
    client: Arc<dyn NodeClient>,
    mapping: Arc<ResourceMapping>,
    strategy: Arc<dyn OfferingStrategy>,
    state: Mutex<SupplierState>,
    nudge_tx: mpsc::Sender<()>,
    nudge_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Supplier {
    /// Creates a supplier owning `max_resources`.
    #[must_use]
    pub fn new(
        config: Arc<DiscoveryConfig>,
        local: NodeRef,
        client: Arc<dyn NodeClient>,
        mapping: Arc<ResourceMapping>,
        strategy: Arc<dyn OfferingStrategy>,
        max_resources: Resources,
    ) -> Self {
        let (nudge_tx, nudge_rx) = mpsc::channel(1);
        Self {
            config,
            local,
            client,
            mapping,
            strategy,
            state: Mutex::new(SupplierState {
                max: max_resources,
                available: max_resources,
                next_offer_id: 1,
                active: HashMap::new(),
            }),
            nudge_tx,
            nudge_rx: Mutex::new(Some(nudge_rx)),
        }
    }

    /// Starts the supply and refresh-check loops. In simulation mode no
    /// tasks are spawned; callers drive the ticks explicitly.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) {
        if self.config.simulation {
            return;
        }
        tokio::spawn(async move { self.run(cancel).await });
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut nudges = self
            .nudge_rx
            .lock()
            .take()
            .expect("supply loop started once");
        let mut supply = tokio::time::interval(self.config.supplying_interval);
        let mut refreshes = tokio::time::interval(self.config.refreshes_check_interval);

        loop {
            tokio::select! {
                _ = supply.tick() => self.advertise_available().await,
                Some(()) = nudges.recv() => self.advertise_available().await,
                _ = refreshes.tick() => self.check_refreshes(),
                () = cancel.cancelled() => {
                    info!("supplier stopped");
                    break;
                }
            }
        }
    }

    /// Finds offers matching `demand` somewhere in the system. An invalid
    /// demand is widened to the least powerful declared tuple.
    pub async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer> {
        let demand = if demand.is_valid() {
            demand
        } else {
            self.mapping.lowest_resources()
        };
        self.strategy.find_offers(demand).await
    }

    /// Answers a trader's refresh. True iff the offer is still active here
    /// and `from_trader` is the trader it was placed with.
    pub fn refresh_offer(&self, from_trader: &NodeRef, offer_id: i64) -> bool {
        let mut state = self.state.lock();
        match state.active.get_mut(&offer_id) {
            Some(offer) if offer.trader().guid == from_trader.guid => {
                offer.refresh();
                debug!(offer_id, "offer refreshed");
                true
            }
            Some(_) => {
                debug!(offer_id, "refresh refused: wrong trader");
                false
            }
            None => {
                debug!(offer_id, "refresh refused: offer unknown");
                false
            }
        }
    }

    /// Atomically consumes `demand` out of an active offer.
    ///
    /// On success the offer is gone, the remainder is back in the pool, the
    /// trader is told to drop the offer, and the new pool is re-advertised.
    /// A second call for the same offer id returns false.
    pub async fn obtain_resources(&self, offer_id: i64, demand: Resources) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let fits = state
                .active
                .get(&offer_id)
                .is_some_and(|offer| offer.resources().contains(demand));
            if !fits {
                return false;
            }
            let offer = state
                .active
                .remove(&offer_id)
                .expect("checked under the same lock");
            let mut remainder = offer.resources();
            remainder.sub(demand);
            state.available.add(remainder);
            offer
        };

        debug!(offer_id, demand = %demand, "resources obtained");
        self.dispatch_remove(removed.offer().clone(), removed.trader().clone())
            .await;
        self.trigger_advertise().await;
        true
    }

    /// Returns resources freed by a finished container to the pool and
    /// re-advertises.
    pub async fn return_resources(&self, released: Resources) {
        {
            let mut state = self.state.lock();
            state.available.add(released);
        }
        debug!(released = %released, "resources returned");
        self.trigger_advertise().await;
    }

    /// The supply tick.
    ///
    /// An update-pushing strategy folds whole units of the pool into offers
    /// already placed with traders and advertises only what is left as new
    /// offers, without tearing anything down. The other strategies gather
    /// everything spare (withdrawing active offers) and hand the combined
    /// pool to the strategy as fresh offers.
    pub async fn advertise_available(&self) {
        if self.strategy.pushes_updates() {
            self.fold_into_active().await;
            if let Some(assignments) = self.plan_new_offers() {
                self.place_offers(assignments).await;
            }
            return;
        }

        let Some((removals, assignments)) = self.plan_advertisement() else {
            return;
        };

        for (offer, trader) in removals {
            self.dispatch_remove(offer, trader).await;
        }
        self.place_offers(assignments).await;
    }

    /// The refresh-check tick: offers whose trader has been silent for
    /// `max_refreshes_missed` consecutive checks are reclaimed locally. No
    /// message goes to the presumed-dead trader.
    pub fn check_refreshes(&self) {
        let timeout = self.config.refresh_missed_timeout;
        let max_missed = self.config.max_refreshes_missed;
        let now = Instant::now();

        let mut state = self.state.lock();
        let dead: Vec<i64> = state
            .active
            .values_mut()
            .filter_map(|offer| {
                offer.verify_refreshes(timeout, now);
                (offer.refreshes_missed() >= max_missed).then(|| offer.id())
            })
            .collect();

        for id in dead {
            if let Some(offer) = state.active.remove(&id) {
                warn!(
                    offer_id = id,
                    trader_ip = %offer.trader().ip,
                    "offer expired, trader presumed dead"
                );
                let reclaimed = offer.resources();
                state.available.add(reclaimed);
            }
        }
    }

    /// Currently unoffered resources.
    #[must_use]
    pub fn available_resources(&self) -> Resources {
        self.state.lock().available
    }

    /// The node's total resources.
    #[must_use]
    pub fn max_resources(&self) -> Resources {
        self.state.lock().max
    }

    /// Snapshot of active offers, for inspection.
    #[must_use]
    pub fn active_offers(&self) -> Vec<SupplierOffer> {
        self.state.lock().active.values().cloned().collect()
    }

    /// Folds whole units of the pool into offers already placed with
    /// traders, one `update_offer` amount increment at a time. The unit
    /// tuple never changes, so the trader's held tuple stays what it was
    /// accepted as.
    async fn fold_into_active(&self) {
        loop {
            let pending = {
                let mut state = self.state.lock();
                if !state.available.is_valid() || state.active.is_empty() {
                    return;
                }
                let available = state.available;
                let candidate = state
                    .active
                    .values()
                    .filter(|offer| available.contains(offer.unit()))
                    .map(|offer| offer.id())
                    .min();
                let Some(id) = candidate else {
                    return;
                };
                let target = &state.active[&id];
                let unit = target.unit();
                let trader = target.trader().clone();
                let mut updated = target.offer().clone();
                updated.amount += 1;
                state.available.sub(unit);
                (id, unit, trader, updated)
            };

            let (id, unit, trader, updated) = pending;
            match self.strategy.push_update(&trader, &updated).await {
                Ok(()) => {
                    let mut state = self.state.lock();
                    match state.active.get_mut(&id) {
                        Some(offer) => offer.bump_amount(unit),
                        // Consumed while the update was in flight; the
                        // trader already dropped the offer, keep the pool
                        // whole.
                        None => state.available.add(unit),
                    }
                }
                Err(error) => {
                    debug!(offer_id = id, %error, "offer update failed");
                    let mut state = self.state.lock();
                    state.available.add(unit);
                    return;
                }
            }
        }
    }

    /// Plans offers out of the unoffered pool alone, leaving active offers
    /// in place.
    fn plan_new_offers(&self) -> Option<Vec<(i64, Resources)>> {
        let mut state = self.state.lock();
        if !state.available.is_valid() {
            return None;
        }
        let quanta = self.strategy.partition_available(state.available);
        if quanta.is_empty() {
            return None;
        }

        let mut leftover = state.available;
        let mut assignments = Vec::with_capacity(quanta.len());
        for quantum in quanta {
            let id = state.next_offer_id;
            state.next_offer_id += 1;
            leftover.sub(quantum);
            assignments.push((id, quantum));
        }
        state.available = leftover;
        Some(assignments)
    }

    /// Advertises the planned quanta. A placement can come back smaller
    /// than planned when the walk descended to a less powerful partition;
    /// the difference goes straight back into the pool.
    async fn place_offers(&self, assignments: Vec<(i64, Resources)>) {
        for (id, quantum) in assignments {
            let offer = Offer::new(id, 1, quantum.into());
            match self.strategy.advertise(offer, quantum).await {
                Ok(placed) => {
                    let mut state = self.state.lock();
                    let mut leftover = quantum;
                    leftover.sub(placed.resources());
                    state.available.add(leftover);
                    state.active.insert(id, placed);
                }
                Err(error) => {
                    let mut state = self.state.lock();
                    state.available.add(quantum);
                    drop(state);
                    debug!(offer_id = id, %error, "advertisement failed, retrying next tick");
                }
            }
        }
    }

    /// Plans a full re-advertisement under the lock: which offers to
    /// withdraw and which (id, quantum) pairs to place.
    #[allow(clippy::type_complexity)]
    fn plan_advertisement(&self) -> Option<(Vec<(Offer, NodeRef)>, Vec<(i64, Resources)>)> {
        let mut state = self.state.lock();

        let mut pool = state.available;
        for offer in state.active.values() {
            pool.add(offer.resources());
        }
        if !pool.is_valid() {
            return None;
        }

        let quanta = self.strategy.partition_available(pool);
        if quanta.is_empty() {
            return None;
        }

        let removals: Vec<(Offer, NodeRef)> = state
            .active
            .drain()
            .map(|(_, offer)| (offer.offer().clone(), offer.trader().clone()))
            .collect();

        let mut leftover = pool;
        let mut assignments = Vec::with_capacity(quanta.len());
        for quantum in quanta {
            let id = state.next_offer_id;
            state.next_offer_id += 1;
            leftover.sub(quantum);
            assignments.push((id, quantum));
        }
        state.available = leftover;

        Some((removals, assignments))
    }

    async fn dispatch_remove(&self, offer: Offer, trader: NodeRef) {
        if self.config.simulation {
            if let Err(error) = self
                .client
                .remove_offer(&self.local, &trader, &offer)
                .await
            {
                debug!(offer_id = offer.id, %error, "remove_offer failed");
            }
        } else {
            let client = Arc::clone(&self.client);
            let local = self.local.clone();
            tokio::spawn(async move {
                if let Err(error) = client.remove_offer(&local, &trader, &offer).await {
                    debug!(offer_id = offer.id, %error, "remove_offer failed");
                }
            });
        }
    }

    /// Re-advertises immediately under simulation; otherwise nudges the
    /// supply loop, which advertises outside any caller's critical path.
    async fn trigger_advertise(&self) {
        if self.config.simulation {
            self.advertise_available().await;
        } else {
            let _ = self.nudge_tx.try_send(());
        }
    }
}

impl std::fmt::Debug for Supplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Supplier")
            .field("available", &state.available)
            .field("active_offers", &state.active.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryBackend;
    use crate::error::{DiscoveryError, Result as DiscResult};
    use async_trait::async_trait;
    use caravela_core::{ClientResult, GuidSpace};
    use caravela_proto::{
        ContainerConfig, ContainerStatus, CpuClass, GetOffersResponse,
    };
    use parking_lot::Mutex as PlMutex;

    fn low(cpus: u32, ram: u32) -> Resources {
        Resources::new(CpuClass::Low, cpus, ram)
    }

    /// Client that records removals and accepts everything.
    #[derive(Default)]
    struct RecordingClient {
        removed: PlMutex<Vec<i64>>,
    }

    #[async_trait]
    impl NodeClient for RecordingClient {
        async fn create_offer(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _offer: &Offer,
        ) -> ClientResult<()> {
            Ok(())
        }

        async fn refresh_offer(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _offer: &Offer,
        ) -> ClientResult<bool> {
            Ok(true)
        }

        async fn update_offer(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _offer: &Offer,
        ) -> ClientResult<()> {
            Ok(())
        }

        async fn remove_offer(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            offer: &Offer,
        ) -> ClientResult<()> {
            self.removed.lock().push(offer.id);
            Ok(())
        }

        async fn get_offers(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _relay: bool,
        ) -> ClientResult<GetOffersResponse> {
            Ok(GetOffersResponse::default())
        }

        async fn advertise_offers_neighbour(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _offering: &NodeRef,
        ) -> ClientResult<()> {
            Ok(())
        }

        async fn launch_containers(
            &self,
            _from: &NodeRef,
            _to: &NodeRef,
            _offer: &Offer,
            _configs: &[ContainerConfig],
        ) -> ClientResult<Vec<ContainerStatus>> {
            Ok(Vec::new())
        }

        async fn stop_local_container(
            &self,
            _to: &NodeRef,
            _container_id: &str,
        ) -> ClientResult<()> {
            Ok(())
        }
    }

    /// Strategy stub: every advertisement lands on a fixed trader.
    struct FixedTraderStrategy {
        trader: NodeRef,
        accept: bool,
    }

    #[async_trait]
    impl OfferingStrategy for FixedTraderStrategy {
        fn name(&self) -> &'static str {
            "fixed-trader"
        }

        fn partition_available(&self, available: Resources) -> Vec<Resources> {
            if available.is_valid() {
                vec![available]
            } else {
                Vec::new()
            }
        }

        async fn advertise(&self, offer: Offer, target: Resources) -> DiscResult<SupplierOffer> {
            if self.accept {
                Ok(SupplierOffer::new(offer, target, self.trader.clone()))
            } else {
                Err(DiscoveryError::NoSuppliersAvailable)
            }
        }

        async fn find_offers(&self, _demand: Resources) -> Vec<AvailableOffer> {
            Vec::new()
        }
    }

    fn trader() -> NodeRef {
        NodeRef::new("10.0.0.2", "12345")
    }

    fn make_supplier(
        max: Resources,
        accept: bool,
        missed_timeout: Duration,
    ) -> (Arc<Supplier>, Arc<RecordingClient>) {
        let config = Arc::new(DiscoveryConfig {
            backend: DiscoveryBackend::SingleOffer,
            refresh_missed_timeout: missed_timeout,
            max_refreshes_missed: 2,
            simulation: true,
            ..DiscoveryConfig::default()
        });
        let client = Arc::new(RecordingClient::default());
        let mapping = Arc::new(
            ResourceMapping::new(
                GuidSpace::default(),
                vec![low(1, 1024), low(2, 2048), low(4, 4096)],
            )
            .unwrap(),
        );
        let strategy = Arc::new(FixedTraderStrategy {
            trader: trader(),
            accept,
        });
        let supplier = Arc::new(Supplier::new(
            config,
            NodeRef::from_ip("10.0.0.1"),
            client.clone(),
            mapping,
            strategy,
            max,
        ));
        (supplier, client)
    }

    #[tokio::test]
    async fn advertises_everything_available() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::from_secs(60));
        supplier.advertise_available().await;

        assert_eq!(supplier.available_resources(), low(0, 0));
        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id(), 1);
        assert_eq!(offers[0].resources(), low(2, 2048));
    }

    #[tokio::test]
    async fn failed_advertisement_keeps_resources() {
        let (supplier, _) = make_supplier(low(2, 2048), false, Duration::from_secs(60));
        supplier.advertise_available().await;

        assert_eq!(supplier.available_resources(), low(2, 2048));
        assert!(supplier.active_offers().is_empty());
    }

    #[tokio::test]
    async fn offer_ids_are_monotonic() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::from_secs(60));
        supplier.advertise_available().await;
        // Second round withdraws the first offer and issues a new id.
        supplier.advertise_available().await;

        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id(), 2);
    }

    #[tokio::test]
    async fn refresh_requires_registered_trader() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::from_secs(60));
        supplier.advertise_available().await;

        assert!(supplier.refresh_offer(&trader(), 1));
        assert!(!supplier.refresh_offer(&NodeRef::new("10.9.9.9", "999"), 1));
        assert!(!supplier.refresh_offer(&trader(), 77));
    }

    #[tokio::test]
    async fn obtain_deducts_and_is_single_shot() {
        let (supplier, client) = make_supplier(low(4, 4096), true, Duration::from_secs(60));
        supplier.advertise_available().await;

        assert!(supplier.obtain_resources(1, low(2, 2048)).await);
        // Simulation mode re-advertised the remainder synchronously.
        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].resources(), low(2, 2048));
        assert_eq!(client.removed.lock().as_slice(), &[1]);

        // The consumed offer id is gone.
        assert!(!supplier.obtain_resources(1, low(1, 1024)).await);
    }

    #[tokio::test]
    async fn obtain_refuses_oversized_demand() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::from_secs(60));
        supplier.advertise_available().await;

        assert!(!supplier.obtain_resources(1, low(4, 4096)).await);
        assert_eq!(supplier.active_offers().len(), 1);
    }

    #[tokio::test]
    async fn missed_refreshes_reclaim_the_offer() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::ZERO);
        supplier.advertise_available().await;

        supplier.check_refreshes();
        assert_eq!(supplier.active_offers().len(), 1, "one miss is not enough");

        supplier.check_refreshes();
        assert!(supplier.active_offers().is_empty());
        assert_eq!(supplier.available_resources(), low(2, 2048));
    }

    #[tokio::test]
    async fn successful_refresh_resets_the_miss_counter() {
        let (supplier, _) = make_supplier(low(2, 2048), true, Duration::ZERO);
        supplier.advertise_available().await;

        supplier.check_refreshes();
        assert!(supplier.refresh_offer(&trader(), 1));
        supplier.check_refreshes();
        assert_eq!(
            supplier.active_offers().len(),
            1,
            "refresh in between keeps the offer alive"
        );

        supplier.check_refreshes();
        assert!(supplier.active_offers().is_empty());
    }

    #[tokio::test]
    async fn returned_resources_are_readvertised() {
        let (supplier, _) = make_supplier(low(4, 4096), true, Duration::from_secs(60));
        supplier.advertise_available().await;
        assert!(supplier.obtain_resources(1, low(4, 4096)).await);
        assert!(supplier.active_offers().is_empty());

        supplier.return_resources(low(4, 4096)).await;
        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].resources(), low(4, 4096));
    }

    #[tokio::test]
    async fn offered_plus_available_equals_max() {
        let (supplier, _) = make_supplier(low(4, 4096), true, Duration::from_secs(60));
        supplier.advertise_available().await;
        assert!(supplier.obtain_resources(1, low(1, 1024)).await);

        let offered: u32 = supplier.active_offers().iter().map(|o| o.resources().cpus()).sum();
        let held = supplier.available_resources().cpus() + offered + low(1, 1024).cpus();
        assert_eq!(held, supplier.max_resources().cpus());
    }

    /// Strategy stub for the update-pushing variant: decomposes along the
    /// partition grid, places everything on a fixed trader, records the
    /// update pushes.
    struct UpdatingStrategy {
        trader: NodeRef,
        mapping: Arc<ResourceMapping>,
        pushed: PlMutex<Vec<(i64, u32)>>,
    }

    #[async_trait]
    impl OfferingStrategy for UpdatingStrategy {
        fn name(&self) -> &'static str {
            "updating"
        }

        fn partition_available(&self, available: Resources) -> Vec<Resources> {
            let mut remaining = available;
            let mut quanta = Vec::new();
            while let Some(quantum) = self.mapping.fittest(remaining) {
                quanta.push(quantum);
                remaining.sub(quantum);
            }
            quanta
        }

        async fn advertise(&self, offer: Offer, target: Resources) -> DiscResult<SupplierOffer> {
            Ok(SupplierOffer::new(offer, target, self.trader.clone()))
        }

        async fn find_offers(&self, _demand: Resources) -> Vec<AvailableOffer> {
            Vec::new()
        }

        fn pushes_updates(&self) -> bool {
            true
        }

        async fn push_update(&self, _trader: &NodeRef, offer: &Offer) -> DiscResult<()> {
            self.pushed.lock().push((offer.id, offer.amount));
            Ok(())
        }
    }

    fn make_updating_supplier(max: Resources) -> (Arc<Supplier>, Arc<UpdatingStrategy>) {
        let config = Arc::new(DiscoveryConfig {
            backend: DiscoveryBackend::MultipleOfferUpdates,
            simulation: true,
            ..DiscoveryConfig::default()
        });
        let mapping = Arc::new(
            ResourceMapping::new(
                GuidSpace::default(),
                vec![low(1, 1024), low(2, 2048), low(4, 4096)],
            )
            .unwrap(),
        );
        let strategy = Arc::new(UpdatingStrategy {
            trader: trader(),
            mapping: mapping.clone(),
            pushed: PlMutex::new(Vec::new()),
        });
        let supplier = Arc::new(Supplier::new(
            config,
            NodeRef::from_ip("10.0.0.1"),
            Arc::new(RecordingClient::default()),
            mapping,
            strategy.clone(),
            max,
        ));
        (supplier, strategy)
    }

    #[tokio::test]
    async fn updates_fold_returned_units_into_the_placed_offer() {
        let (supplier, strategy) = make_updating_supplier(low(2, 2048));
        supplier.advertise_available().await;

        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].offer().amount, 1);

        // Another whole (2, 2048) unit comes back: folded in place, no
        // tear-down.
        supplier.return_resources(low(2, 2048)).await;
        let offers = supplier.active_offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id(), 1);
        assert_eq!(offers[0].offer().amount, 2);
        assert_eq!(offers[0].unit(), low(2, 2048));
        assert_eq!(offers[0].resources(), low(4, 4096));
        assert_eq!(supplier.available_resources(), low(0, 0));
        assert_eq!(strategy.pushed.lock().as_slice(), &[(1, 2)]);
    }

    #[tokio::test]
    async fn updates_advertise_leftover_that_fits_no_active_unit() {
        let (supplier, strategy) = make_updating_supplier(low(2, 2048));
        supplier.advertise_available().await;

        // (1, 1024) cannot extend the (2, 2048) offer; it becomes a new
        // offer and the placed one is untouched.
        supplier.return_resources(low(1, 1024)).await;
        let mut offers = supplier.active_offers();
        offers.sort_by_key(SupplierOffer::id);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].offer().amount, 1);
        assert_eq!(offers[0].unit(), low(2, 2048));
        assert_eq!(offers[1].id(), 2);
        assert_eq!(offers[1].unit(), low(1, 1024));
        assert!(strategy.pushed.lock().is_empty());
    }
}
