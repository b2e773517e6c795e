//! The multiple-offer strategy: availability split along partition lines.
//!
//! The spare pool is decomposed greedily into the largest declared partition
//! tuples that still fit, and each quantum is advertised as its own offer
//! into its own partition. The `updates` variant additionally mutates a held
//! offer in place when resources change, instead of withdrawing and
//! re-advertising the whole set.

use async_trait::async_trait;
use std::sync::Arc;

use caravela_core::Resources;
use caravela_proto::{AvailableOffer, NodeRef, Offer};

use crate::error::Result;
use crate::supplier::SupplierOffer;

use super::{OfferingStrategy, StrategyContext};

/// Per-partition sub-offers, optionally with in-place updates.
pub struct MultipleOfferStrategy {
    context: Arc<StrategyContext>,
    updates: bool,
}

impl MultipleOfferStrategy {
    /// Creates the strategy; `updates` selects the update-pushing variant.
    #[must_use]
    pub fn new(context: Arc<StrategyContext>, updates: bool) -> Self {
        Self { context, updates }
    }
}

#[async_trait]
impl OfferingStrategy for MultipleOfferStrategy {
    fn name(&self) -> &'static str {
        if self.updates {
            "chord-multiple-offer-updates"
        } else {
            "chord-multiple-offer"
        }
    }

    fn partition_available(&self, available: Resources) -> Vec<Resources> {
        let mut remaining = available;
        let mut quanta = Vec::new();

        // Largest declared tuple that still fits, repeatedly.
        while let Some(quantum) = self.context.mapping().fittest(remaining) {
            quanta.push(quantum);
            remaining.sub(quantum);
        }
        quanta
    }

    async fn advertise(&self, offer: Offer, target: Resources) -> Result<SupplierOffer> {
        self.context.advertise(offer, target).await
    }

    async fn find_offers(&self, demand: Resources) -> Vec<AvailableOffer> {
        self.context.discover(demand).await
    }

    fn pushes_updates(&self) -> bool {
        self.updates
    }

    async fn push_update(&self, trader: &NodeRef, offer: &Offer) -> Result<()> {
        self.context
            .client()
            .update_offer(self.context.local(), trader, offer)
            .await?;
        Ok(())
    }
}
