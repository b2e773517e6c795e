//! CARAVELA resource discovery.
//!
//! Discovery is the protocol by which nodes advertise spare capacity as
//! *offers* held by *traders* (the nodes responsible for the matching region
//! of the key space) and by which requesters walk the partitioned space to
//! find offers satisfying a demand.
//!
//! # Architecture
//!
//! - [`Supplier`] owns the node's physical resources and keeps them
//!   advertised through the configured [`strategy`](strategy::OfferingStrategy).
//! - [`Trader`] instances exist for every GUID the node owns in the overlay
//!   and hold offers from remote suppliers.
//! - [`Discovery`] is the facade the rest of the node talks to: it routes
//!   inbound RPCs to the right trader or to the supplier, and exposes
//!   `find_offers` to the scheduler.
//!
//! Remote calls go through [`caravela_core::NodeClient`]; no component here
//! holds a reference to another node's components.

pub mod config;
mod discovery;
pub mod error;
pub mod strategy;
pub mod supplier;
pub mod trader;

pub use config::{DiscoveryBackend, DiscoveryConfig};
pub use discovery::{Discovery, DiscoveryService};
pub use error::{DiscoveryError, Result};
pub use strategy::{build_strategy, OfferingStrategy, StrategyContext};
pub use supplier::{Supplier, SupplierOffer};
pub use trader::{Trader, TraderOffer};
