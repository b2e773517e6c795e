//! The single-offer strategy: everything spare goes into one offer.

use async_trait::async_trait;
use std::sync::Arc;

use caravela_core::Resources;
use caravela_proto::{AvailableOffer, Offer};

use crate::error::Result;
use crate::supplier::SupplierOffer;

use super::{OfferingStrategy, StrategyContext};

/// One offer carrying the node's whole availability.
pub struct SingleOfferStrategy {
    context: Arc<StrategyContext>,
}

impl SingleOfferStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(context: Arc<StrategyContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl OfferingStrategy for SingleOfferStrategy {
    fn name(&self) -> &'static str {
        "chord-single-offer"
    }

    fn partition_available(&self, available: Resources) -> Vec<Resources> {
        if available.is_valid() {
            vec![available]
        } else {
            Vec::new()
        }
    }

    async fn advertise(&self, offer: Offer, target: Resources) -> Result<SupplierOffer> {
        self.context.advertise(offer, target).await
    }

    async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer> {
        self.context.discover(demand).await
    }
}
