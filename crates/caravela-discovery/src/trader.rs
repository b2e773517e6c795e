//! The trader: holds offers on behalf of suppliers.
//!
//! A trader exists for every GUID the local node is responsible for. It
//! accepts offers whose resource tuple equals its partition tuple, refreshes
//! them against their suppliers on a timer, answers discovery queries, and
//! can relay a query one hop to a neighbour trader when it is cold.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use caravela_core::{Guid, NodeClient, Overlay, ResourceMapping, Resources};
use caravela_proto::{AvailableOffer, NodeRef, Offer};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};

/// The trader-side view of a held offer.
#[derive(Debug, Clone)]
pub struct TraderOffer {
    offer: Offer,
    supplier: NodeRef,
    last_refreshed: Instant,
}

impl TraderOffer {
    fn new(offer: Offer, supplier: NodeRef) -> Self {
        Self {
            offer,
            supplier,
            last_refreshed: Instant::now(),
        }
    }

    /// The offer as received from the supplier.
    #[must_use]
    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    /// The supplier that owns the offer.
    #[must_use]
    pub fn supplier(&self) -> &NodeRef {
        &self.supplier
    }
}

/// Holds and refreshes offers for one locally-owned GUID.
pub struct Trader {
    config: Arc<DiscoveryConfig>,
    guid: Guid,
    handled: Resources,
    local: NodeRef,
    client: Arc<dyn NodeClient>,
    overlay: Arc<dyn Overlay>,
    mapping: Arc<ResourceMapping>,
    offers: Mutex<HashMap<(String, i64), TraderOffer>>,
    neighbour: Mutex<Option<NodeRef>>,
}

impl Trader {
    /// Creates a trader for `guid`; the partition it trades for follows
    /// from the mapping.
    #[must_use]
    pub fn new(
        config: Arc<DiscoveryConfig>,
        guid: Guid,
        local_ip: &str,
        client: Arc<dyn NodeClient>,
        overlay: Arc<dyn Overlay>,
        mapping: Arc<ResourceMapping>,
    ) -> Self {
        let handled = mapping.resources_for(&guid);
        let local = NodeRef::new(local_ip, guid.to_string());
        Self {
            config,
            guid,
            handled,
            local,
            client,
            overlay,
            mapping,
            offers: Mutex::new(HashMap::new()),
            neighbour: Mutex::new(None),
        }
    }

    /// The GUID this trader is responsible for.
    #[must_use]
    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    /// The partition tuple this trader trades for.
    #[must_use]
    pub fn handled_resources(&self) -> Resources {
        self.handled
    }

    /// Starts the refresh loop. In simulation mode callers drive
    /// [`refresh_round`](Self::refresh_round) explicitly.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) {
        if self.config.simulation {
            return;
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.refreshing_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.refresh_round().await,
                    () = cancel.cancelled() => {
                        info!(guid = %self.guid.short(), "trader stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Accepts an offer from a supplier.
    ///
    /// The offer's resource tuple must equal this trader's partition tuple;
    /// anything else is discarded, so every held offer carries exactly the
    /// tuple of the GUID it was advertised under.
    pub async fn create_offer(&self, from_supplier: &NodeRef, offer: &Offer) -> Result<()> {
        let resources = Resources::from(offer.resources);
        if resources != self.handled {
            debug!(
                offer_id = offer.id,
                offered = %resources,
                handled = %self.handled,
                "offer discarded: does not match this trader's partition"
            );
            return Err(DiscoveryError::InvalidResources);
        }

        let first = {
            let mut offers = self.offers.lock();
            let was_empty = offers.is_empty();
            offers.insert(
                (from_supplier.ip.clone(), offer.id),
                TraderOffer::new(offer.clone(), from_supplier.clone()),
            );
            was_empty
        };
        debug!(offer_id = offer.id, supplier_ip = %from_supplier.ip, "offer accepted");

        if first {
            self.advertise_to_neighbour().await;
        }
        Ok(())
    }

    /// Replaces a held offer's amount in place. The unit tuple is subject
    /// to the same partition-equality rule as `create_offer`.
    pub fn update_offer(&self, from_supplier: &NodeRef, offer: &Offer) -> Result<()> {
        if Resources::from(offer.resources) != self.handled {
            return Err(DiscoveryError::InvalidResources);
        }
        let mut offers = self.offers.lock();
        match offers.get_mut(&(from_supplier.ip.clone(), offer.id)) {
            Some(held) => {
                held.offer.amount = offer.amount;
                held.offer.resources = offer.resources;
                held.last_refreshed = Instant::now();
                Ok(())
            }
            None => Err(DiscoveryError::StaleOffer(offer.id)),
        }
    }

    /// Drops a withdrawn or consumed offer. Unknown ids are not an error:
    /// a removal can race the expiry that already discarded the offer.
    pub fn remove_offer(&self, from_supplier: &NodeRef, offer_id: i64) {
        let removed = self
            .offers
            .lock()
            .remove(&(from_supplier.ip.clone(), offer_id));
        if removed.is_some() {
            debug!(offer_id, supplier_ip = %from_supplier.ip, "offer removed");
        }
    }

    /// Returns held offers. A cold trader may relay the query one hop to
    /// its recorded neighbour; the relayed query never relays again.
    pub async fn get_offers(&self, relay: bool) -> Vec<AvailableOffer> {
        let held: Vec<AvailableOffer> = self
            .offers
            .lock()
            .values()
            .map(|entry| AvailableOffer {
                supplier: entry.supplier.clone(),
                offer: entry.offer.clone(),
            })
            .collect();

        if !held.is_empty() || !relay {
            return held;
        }

        let neighbour = self.neighbour.lock().clone();
        match neighbour {
            Some(neighbour) => match self
                .client
                .get_offers(&self.local, &neighbour, false)
                .await
            {
                Ok(response) => response.offers,
                Err(error) => {
                    debug!(neighbour_ip = %neighbour.ip, %error, "relay failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    /// Records another trader as the place to relay cold queries to.
    pub fn advertise_offers_neighbour(&self, offering: NodeRef) {
        debug!(neighbour_ip = %offering.ip, "relay neighbour recorded");
        *self.neighbour.lock() = Some(offering);
    }

    /// One pass of the refresh loop: push a refresh to every supplier,
    /// dropping offers that are refused or whose supplier has been
    /// unreachable past the inactivity window.
    pub async fn refresh_round(&self) {
        let held: Vec<TraderOffer> = self.offers.lock().values().cloned().collect();
        let inactivity =
            self.config.refresh_missed_timeout * self.config.max_refreshes_missed;

        for entry in held {
            let key = (entry.supplier.ip.clone(), entry.offer.id);
            match self
                .client
                .refresh_offer(&self.local, &entry.supplier, &entry.offer)
                .await
            {
                Ok(true) => {
                    if let Some(held) = self.offers.lock().get_mut(&key) {
                        held.last_refreshed = Instant::now();
                    }
                }
                Ok(false) => {
                    debug!(offer_id = entry.offer.id, "refresh refused, dropping offer");
                    self.offers.lock().remove(&key);
                }
                Err(error) => {
                    debug!(offer_id = entry.offer.id, %error, "refresh undelivered");
                    let expired = self
                        .offers
                        .lock()
                        .get(&key)
                        .is_some_and(|held| held.last_refreshed.elapsed() >= inactivity);
                    if expired {
                        debug!(offer_id = entry.offer.id, "offer expired after silence");
                        self.offers.lock().remove(&key);
                    }
                }
            }
        }
    }

    /// Number of offers currently held.
    #[must_use]
    pub fn offer_count(&self) -> usize {
        self.offers.lock().len()
    }

    /// Tells the trader of the next lower partition that offers live here,
    /// so its cold `get_offers` queries can relay to us.
    async fn advertise_to_neighbour(&self) {
        let mapping = Arc::clone(&self.mapping);
        let overlay = Arc::clone(&self.overlay);
        let client = Arc::clone(&self.client);
        let guid = self.guid.clone();
        let handled = self.handled;
        let local = self.local.clone();

        let task = async move {
            let Ok(target) = mapping.lower_random(&guid, handled) else {
                return;
            };
            let key = mapping.space().to_bytes(&target);
            let Ok(nodes) = overlay.lookup(&key).await else {
                return;
            };
            let wanted = mapping.resources_for(&target);
            let neighbour = nodes
                .into_iter()
                .find(|node| mapping.resources_for(&Guid::from_bytes(&node.guid_bytes)) == wanted);
            if let Some(node) = neighbour {
                let neighbour =
                    NodeRef::new(node.ip.clone(), Guid::from_bytes(&node.guid_bytes).to_string());
                if let Err(error) = client
                    .advertise_offers_neighbour(&local, &neighbour, &local)
                    .await
                {
                    debug!(neighbour_ip = %neighbour.ip, %error, "neighbour advertisement failed");
                }
            }
        };

        if self.config.simulation {
            task.await;
        } else {
            tokio::spawn(task);
        }
    }
}

impl std::fmt::Debug for Trader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trader")
            .field("guid", &self.guid.short())
            .field("handled", &self.handled)
            .field("offers", &self.offer_count())
            .finish()
    }
}
