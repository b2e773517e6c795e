//! The scheduler: from user submission to a running workload.

use std::sync::Arc;
use tracing::{debug, info, warn};

use caravela_core::{NodeClient, Resources};
use caravela_discovery::DiscoveryService;
use caravela_proto::{ContainerConfig, ContainerStatus, GroupPolicy, NodeRef, Offer};

use crate::containers::ContainersManager;
use crate::error::{Result, SchedulerError};
use crate::policy::SchedulingPolicy;

/// Decides where submitted containers run and commits them there.
pub struct Scheduler {
    local: NodeRef,
    client: Arc<dyn NodeClient>,
    discovery: Arc<dyn DiscoveryService>,
    containers: Arc<ContainersManager>,
    policy: Box<dyn SchedulingPolicy>,
}

impl Scheduler {
    /// Creates a scheduler for the node at `local_ip`.
    #[must_use]
    pub fn new(
        local_ip: impl Into<String>,
        client: Arc<dyn NodeClient>,
        discovery: Arc<dyn DiscoveryService>,
        containers: Arc<ContainersManager>,
        policy: Box<dyn SchedulingPolicy>,
    ) -> Self {
        Self {
            local: NodeRef::from_ip(local_ip),
            client,
            discovery,
            containers,
            policy,
        }
    }

    /// Handles a user submission.
    ///
    /// Co-location containers are summed into one demand and land together
    /// on a single supplier; spread containers go one by one. If a spread
    /// member exhausts every candidate offer, everything launched earlier in
    /// the submission is stopped again, in reverse order.
    pub async fn submit(&self, configs: Vec<ContainerConfig>) -> Result<Vec<ContainerStatus>> {
        if configs.is_empty() {
            return Err(SchedulerError::EmptySubmission);
        }

        let mut co_located: Vec<ContainerConfig> = Vec::new();
        let mut spread: Vec<ContainerConfig> = Vec::new();
        let mut co_located_demand = Resources::default();
        for config in configs {
            match config.group_policy {
                GroupPolicy::CoLocation => {
                    co_located_demand.add(Resources::from(config.resources));
                    co_located.push(config);
                }
                GroupPolicy::Spread => spread.push(config),
            }
        }

        let mut deployed: Vec<ContainerStatus> = Vec::new();

        if !co_located.is_empty() {
            info!(
                containers = co_located.len(),
                demand = %co_located_demand,
                "launching co-located group"
            );
            deployed.extend(self.launch_group(&co_located, co_located_demand).await?);
        }

        for config in spread {
            let demand = Resources::from(config.resources);
            match self.launch_group(std::slice::from_ref(&config), demand).await {
                Ok(statuses) => deployed.extend(statuses),
                Err(error) => {
                    warn!(%error, "submission failed, stopping earlier launches");
                    self.rollback(&deployed).await;
                    return Err(error);
                }
            }
        }

        Ok(deployed)
    }

    /// Handles an inbound launch: another node committed a workload to an
    /// offer supplied by this node.
    pub async fn launch(
        &self,
        from_buyer: &NodeRef,
        offer: &Offer,
        configs: &[ContainerConfig],
    ) -> Result<Vec<ContainerStatus>> {
        if configs.is_empty() {
            return Err(SchedulerError::EmptySubmission);
        }
        self.containers
            .start_containers(from_buyer, offer, configs)
            .await
    }

    /// Discovers, ranks and walks the candidate offers for one demand.
    async fn launch_group(
        &self,
        configs: &[ContainerConfig],
        demand: Resources,
    ) -> Result<Vec<ContainerStatus>> {
        let offers = self.discovery.find_offers(demand).await;
        let ranked = self.policy.rank(offers, demand);
        if ranked.is_empty() {
            debug!(demand = %demand, "no offers found");
            return Err(SchedulerError::NoOffersFound);
        }

        let candidates = ranked.len();
        for (index, available) in ranked.into_iter().enumerate() {
            let supplier = available.supplier.clone();
            debug!(
                attempt = index,
                supplier_ip = %supplier.ip,
                offer_id = available.offer.id,
                "trying offer"
            );

            match self
                .client
                .launch_containers(&self.local, &supplier, &available.offer, configs)
                .await
            {
                Ok(statuses) => {
                    info!(supplier_ip = %supplier.ip, containers = statuses.len(), "deploy succeeded");
                    return Ok(statuses);
                }
                Err(error) => {
                    debug!(offer_id = available.offer.id, %error, "offer rejected the deploy");
                }
            }
        }

        Err(SchedulerError::AllOffersRejected(candidates))
    }

    /// Stops already-launched containers of a failed submission, newest
    /// first. Failures here are logged and skipped: the submission error is
    /// what the user sees.
    async fn rollback(&self, deployed: &[ContainerStatus]) {
        for status in deployed.iter().rev() {
            let supplier = NodeRef::from_ip(status.supplier_ip.clone());
            if let Err(error) = self
                .client
                .stop_local_container(&supplier, &status.container_id)
                .await
            {
                warn!(
                    container_id = %status.container_id,
                    supplier_ip = %supplier.ip,
                    %error,
                    "rollback stop failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("local_ip", &self.local.ip)
            .field("policy", &self.policy.name())
            .finish()
    }
}
