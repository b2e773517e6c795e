//! Offer ranking policies.

use std::cmp::Ordering;

use caravela_core::{Guid, Resources};
use caravela_proto::AvailableOffer;

use crate::config::SchedulingPolicyType;

/// Ranks candidate offers against a demand.
pub trait SchedulingPolicy: Send + Sync {
    /// Orders `offers` in the sequence launches should be attempted.
    /// The ordering is stable for identical inputs.
    fn rank(&self, offers: Vec<AvailableOffer>, demand: Resources) -> Vec<AvailableOffer>;

    /// Returns the policy name.
    fn name(&self) -> &'static str;
}

/// Builds the configured policy.
#[must_use]
pub fn build_policy(policy: SchedulingPolicyType) -> Box<dyn SchedulingPolicy> {
    match policy {
        SchedulingPolicyType::BinPack => Box::new(BinPack),
        SchedulingPolicyType::Spread => Box::new(Spread),
    }
}

/// The slack an offer leaves over a demand.
fn slack(offer: &AvailableOffer, demand: Resources) -> (u32, u32) {
    let offered = Resources::from(offer.offer.resources);
    (
        offered.cpus().saturating_sub(demand.cpus()),
        offered.ram().saturating_sub(demand.ram()),
    )
}

/// Deterministic order among offers with equal slack: supplier GUID first,
/// then supplier IP (for offers whose origin sent no GUID), then offer id.
fn tie_break(a: &AvailableOffer, b: &AvailableOffer) -> Ordering {
    let a_guid = Guid::from_dec_str(&a.supplier.guid);
    let b_guid = Guid::from_dec_str(&b.supplier.guid);
    a_guid
        .cmp(&b_guid)
        .then_with(|| a.supplier.ip.cmp(&b.supplier.ip))
        .then_with(|| a.offer.id.cmp(&b.offer.id))
}

/// Best-fit: offers leaving the least slack first, so big offers stay
/// whole for big demands.
#[derive(Debug, Default)]
pub struct BinPack;

impl SchedulingPolicy for BinPack {
    fn rank(&self, mut offers: Vec<AvailableOffer>, demand: Resources) -> Vec<AvailableOffer> {
        offers.sort_by(|a, b| {
            slack(a, demand)
                .cmp(&slack(b, demand))
                .then_with(|| tie_break(a, b))
        });
        offers
    }

    fn name(&self) -> &'static str {
        "binpack"
    }
}

/// Worst-fit: offers leaving the most slack first, spreading load across
/// the least utilised suppliers.
#[derive(Debug, Default)]
pub struct Spread;

impl SchedulingPolicy for Spread {
    fn rank(&self, mut offers: Vec<AvailableOffer>, demand: Resources) -> Vec<AvailableOffer> {
        offers.sort_by(|a, b| {
            slack(b, demand)
                .cmp(&slack(a, demand))
                .then_with(|| tie_break(a, b))
        });
        offers
    }

    fn name(&self) -> &'static str {
        "spread"
    }
}
