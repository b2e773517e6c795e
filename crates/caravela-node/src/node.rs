//! Node assembly: wiring discovery, scheduling and the external
//! collaborators into one unit.

use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use caravela_core::{
    ContainerRuntime, GuidSpace, NodeClient, Overlay, OverlayMembership, ResourceMapping,
    Resources,
};
use caravela_discovery::{Discovery, DiscoveryService};
use caravela_proto::{ContainerStatus, NodeRef};
use caravela_scheduler::{build_policy, ContainersManager, Scheduler};

use crate::config::NodeConfig;
use crate::error::Result;

/// One CARAVELA node: the discovery and scheduling components plus the
/// consumed overlay and container engine.
pub struct Node {
    config: Arc<NodeConfig>,
    overlay: Arc<dyn Overlay>,
    discovery: Arc<Discovery>,
    scheduler: Arc<Scheduler>,
    containers: Arc<ContainersManager>,
    submissions: DashMap<String, ContainerStatus>,
    client: Arc<dyn NodeClient>,
    cancel: CancellationToken,
}

impl Node {
    /// Assembles a node from configuration and its external collaborators.
    ///
    /// Probes the container engine for the machine's total resources; those
    /// become the supplier's maximum.
    pub async fn new(
        config: NodeConfig,
        overlay: Arc<dyn Overlay>,
        client: Arc<dyn NodeClient>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);

        let space = GuidSpace::new(config.hash_size_bits)?;
        let mapping = Arc::new(ResourceMapping::from_grid(
            space,
            &config.cpu_classes_partitions,
            &config.cpu_cores_partitions,
            &config.ram_partitions,
        )?);

        let (max_cpus, max_ram) = runtime.cpu_and_ram().await?;
        let max_resources = Resources::new(config.cpu_class, max_cpus, max_ram);

        // The node's identity in the key space, carried on every offer it
        // supplies so remote rankings can break ties on it.
        let guid = {
            let mut rng = SmallRng::from_entropy();
            space.random(&mut rng)
        };
        let local = NodeRef::new(config.host_ip.clone(), guid.to_string());
        info!(
            host_ip = %config.host_ip,
            guid = %guid.short(),
            resources = %max_resources,
            partitions = mapping.partitions().len(),
            "node resources mapped"
        );

        let discovery = Arc::new(Discovery::new(
            config.discovery.clone(),
            local,
            overlay.clone(),
            client.clone(),
            mapping,
            max_resources,
        ));

        let scheduler_config = Arc::new(config.scheduler.clone());
        let discovery_service: Arc<dyn DiscoveryService> = discovery.clone();
        let containers = Arc::new(ContainersManager::new(
            scheduler_config.clone(),
            config.host_ip.clone(),
            runtime,
            discovery_service.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(
            config.host_ip.clone(),
            client.clone(),
            discovery_service,
            containers.clone(),
            build_policy(scheduler_config.policy),
        ));

        Ok(Arc::new(Self {
            config,
            overlay,
            discovery,
            scheduler,
            containers,
            submissions: DashMap::new(),
            client,
            cancel: CancellationToken::new(),
        }))
    }

    /// Boots the node: creates a new ring or joins through `join_ip`, then
    /// starts the background components. Overlay failure here is fatal.
    pub async fn start(&self, join_ip: Option<&str>) -> Result<()> {
        let membership: Arc<dyn OverlayMembership> = Arc::new(Membership {
            discovery: self.discovery.clone(),
        });

        match join_ip {
            Some(peer_ip) => {
                info!(peer_ip, "joining the system");
                self.overlay
                    .join(peer_ip, self.config.overlay_port, membership)
                    .await?;
            }
            None => {
                info!("creating a new system");
                self.overlay.create(membership).await?;
            }
        }

        self.discovery.start().await;
        if !self.config.discovery.simulation {
            Arc::clone(&self.containers).start(self.cancel.child_token());
        }
        info!("node started");
        Ok(())
    }

    /// Graceful shutdown: stop the loops, leave the ring, release the API.
    pub async fn stop(&self) {
        info!("node stopping");
        self.discovery.stop();
        if let Err(error) = self.overlay.leave().await {
            warn!(%error, "overlay leave failed");
        }
        self.cancel.cancel();
    }

    /// Records containers deployed through this node's user surface.
    pub fn record_submission(&self, statuses: &[ContainerStatus]) {
        for status in statuses {
            self.submissions
                .insert(status.container_id.clone(), status.clone());
        }
    }

    /// Containers submitted through this node, wherever they run.
    #[must_use]
    pub fn submitted_containers(&self) -> Vec<ContainerStatus> {
        let mut statuses: Vec<ContainerStatus> = self
            .submissions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        statuses.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        statuses
    }

    /// Stops user-submitted containers on whichever suppliers run them.
    pub async fn stop_submitted(
        &self,
        container_ids: &[String],
    ) -> std::result::Result<(), caravela_scheduler::SchedulerError> {
        for container_id in container_ids {
            let Some((_, status)) = self.submissions.remove(container_id) else {
                return Err(caravela_scheduler::SchedulerError::UnknownContainer(
                    container_id.clone(),
                ));
            };
            let supplier = NodeRef::from_ip(status.supplier_ip.clone());
            if let Err(error) = self
                .client
                .stop_local_container(&supplier, container_id)
                .await
            {
                // Keep the record so a retry can find it again.
                self.submissions.insert(container_id.clone(), status);
                return Err(caravela_scheduler::SchedulerError::Client(error));
            }
        }
        Ok(())
    }

    /// The discovery component.
    #[must_use]
    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The containers manager.
    #[must_use]
    pub fn containers(&self) -> &Arc<ContainersManager> {
        &self.containers
    }

    /// The node's configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Token that fires when the node shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("host_ip", &self.config.host_ip)
            .field("traders", &self.discovery.trader_count())
            .finish()
    }
}

/// Overlay membership callbacks: a new predecessor key means this node now
/// trades for that region of the key space.
struct Membership {
    discovery: Arc<Discovery>,
}

impl OverlayMembership for Membership {
    fn new_predecessor(&self, guid_bytes: &[u8]) {
        self.discovery.add_trader(guid_bytes);
    }

    fn leaving(&self) {
        info!("overlay: local node leaving");
    }

    fn predecessor_leaving(&self) {
        info!("overlay: predecessor leaving");
    }

    fn successor_leaving(&self) {
        info!("overlay: successor leaving");
    }

    fn shutdown(&self) {
        info!("overlay: shutting down");
    }
}
