//! The containers manager: supplier-side container lifecycle.
//!
//! When a launch request lands on this node, the manager reserves the
//! offer's resources through discovery, drives the container engine, and
//! keeps a registry of what is running so stops and status sweeps can
//! release resources back to the pool.

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use caravela_core::{ContainerRuntime, Resources};
use caravela_discovery::DiscoveryService;
use caravela_proto::{
    ContainerConfig, ContainerRunState, ContainerStatus, NodeRef, Offer,
};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone)]
struct DeployedContainer {
    status: ContainerStatus,
    buyer_ip: String,
}

/// Registry and lifecycle driver for containers running on this node.
pub struct ContainersManager {
    config: Arc<SchedulerConfig>,
    host_ip: String,
    runtime: Arc<dyn ContainerRuntime>,
    discovery: Arc<dyn DiscoveryService>,
    containers: DashMap<String, DeployedContainer>,
}

impl ContainersManager {
    /// Creates a manager for containers on `host_ip`.
    #[must_use]
    pub fn new(
        config: Arc<SchedulerConfig>,
        host_ip: impl Into<String>,
        runtime: Arc<dyn ContainerRuntime>,
        discovery: Arc<dyn DiscoveryService>,
    ) -> Self {
        Self {
            config,
            host_ip: host_ip.into(),
            runtime,
            discovery,
            containers: DashMap::new(),
        }
    }

    /// Starts the periodic status sweep.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.containers_check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.check_containers().await,
                    () = cancel.cancelled() => {
                        info!("containers manager stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Reserves the offer and runs the containers.
    ///
    /// The whole batch is reserved up front; if any container fails to
    /// start, the ones already started are removed and the full reservation
    /// is returned to the pool.
    pub async fn start_containers(
        &self,
        from_buyer: &NodeRef,
        offer: &Offer,
        configs: &[ContainerConfig],
    ) -> Result<Vec<ContainerStatus>> {
        let total = total_resources(configs);
        if !self.discovery.obtain_resources(offer.id, total).await {
            debug!(offer_id = offer.id, "reservation refused");
            return Err(SchedulerError::ReservationFailed(offer.id));
        }

        let mut launched: Vec<ContainerStatus> = Vec::with_capacity(configs.len());
        for config in configs {
            let run = self
                .runtime
                .run(
                    &config.image_key,
                    &config.port_mappings,
                    &config.args,
                    config.resources.cpus,
                    config.resources.ram,
                )
                .await;

            match run {
                Ok(container_id) => {
                    let status = ContainerStatus {
                        container_id: container_id.clone(),
                        image_key: config.image_key.clone(),
                        supplier_ip: self.host_ip.clone(),
                        resources: config.resources,
                        state: ContainerRunState::Running,
                    };
                    info!(container_id = %status.container_id, image = %config.image_key, "container running");
                    self.containers.insert(
                        container_id,
                        DeployedContainer {
                            status: status.clone(),
                            buyer_ip: from_buyer.ip.clone(),
                        },
                    );
                    launched.push(status);
                }
                Err(error) => {
                    warn!(image = %config.image_key, %error, "container launch failed, rolling back batch");
                    for status in launched.iter().rev() {
                        if let Err(remove_error) = self.runtime.remove(&status.container_id).await {
                            warn!(
                                container_id = %status.container_id,
                                error = %remove_error,
                                "rollback removal failed"
                            );
                        }
                        self.containers.remove(&status.container_id);
                    }
                    self.discovery.return_resources(total).await;
                    return Err(SchedulerError::Runtime(error));
                }
            }
        }
        Ok(launched)
    }

    /// Stops containers and releases their resources.
    pub async fn stop_containers(&self, container_ids: &[String]) -> Result<()> {
        let mut first_error = None;
        for container_id in container_ids {
            match self.containers.remove(container_id) {
                Some((_, deployed)) => {
                    if let Err(error) = self.runtime.remove(container_id).await {
                        warn!(container_id = %container_id, %error, "container removal failed");
                        self.containers.insert(container_id.clone(), deployed);
                        first_error.get_or_insert(SchedulerError::Runtime(error));
                        continue;
                    }
                    self.discovery
                        .return_resources(Resources::from(deployed.status.resources))
                        .await;
                    info!(container_id = %container_id, "container stopped");
                }
                None => {
                    first_error
                        .get_or_insert(SchedulerError::UnknownContainer(container_id.clone()));
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Snapshot of the containers registered on this node.
    #[must_use]
    pub fn list_containers(&self) -> Vec<ContainerStatus> {
        let mut statuses: Vec<ContainerStatus> = self
            .containers
            .iter()
            .map(|entry| entry.value().status.clone())
            .collect();
        statuses.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        statuses
    }

    /// One status sweep: containers the engine reports finished (or cannot
    /// report at all) are reaped and their resources returned.
    pub async fn check_containers(&self) {
        let ids: Vec<String> = self
            .containers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for container_id in ids {
            let state = self
                .runtime
                .status(&container_id)
                .await
                .unwrap_or(ContainerRunState::Unknown);
            if state == ContainerRunState::Running {
                continue;
            }

            if let Some((_, deployed)) = self.containers.remove(&container_id) {
                debug!(container_id = %container_id, ?state, "reaping finished container");
                if let Err(error) = self.runtime.remove(&container_id).await {
                    debug!(container_id = %container_id, %error, "reap removal failed");
                }
                self.discovery
                    .return_resources(Resources::from(deployed.status.resources))
                    .await;
            }
        }
    }

    /// The node that submitted a container, if it is still registered.
    #[must_use]
    pub fn buyer_of(&self, container_id: &str) -> Option<String> {
        self.containers
            .get(container_id)
            .map(|entry| entry.buyer_ip.clone())
    }
}

/// Sum of the batch's resource limits; the CPU class is the highest
/// requested by any member.
fn total_resources(configs: &[ContainerConfig]) -> Resources {
    let mut total = Resources::default();
    for config in configs {
        total.add(Resources::from(config.resources));
    }
    total
}

impl std::fmt::Debug for ContainersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainersManager")
            .field("host_ip", &self.host_ip)
            .field("containers", &self.containers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caravela_core::RuntimeError;
    use caravela_proto::{AvailableOffer, CpuClass, GroupPolicy, PortMapping};
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn low(cpus: u32, ram: u32) -> Resources {
        Resources::new(CpuClass::Low, cpus, ram)
    }

    /// Discovery stub with scripted reservations.
    struct StubDiscovery {
        obtain_ok: bool,
        obtained: PlMutex<Vec<i64>>,
        returned: PlMutex<Vec<Resources>>,
    }

    impl StubDiscovery {
        fn new(obtain_ok: bool) -> Self {
            Self {
                obtain_ok,
                obtained: PlMutex::new(Vec::new()),
                returned: PlMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DiscoveryService for StubDiscovery {
        async fn find_offers(&self, _demand: Resources) -> Vec<AvailableOffer> {
            Vec::new()
        }

        async fn obtain_resources(&self, offer_id: i64, _demand: Resources) -> bool {
            self.obtained.lock().push(offer_id);
            self.obtain_ok
        }

        async fn return_resources(&self, released: Resources) {
            self.returned.lock().push(released);
        }
    }

    /// Runtime that fails after `fail_after` successful launches.
    struct StubRuntime {
        launches: AtomicU32,
        fail_after: u32,
        removed: PlMutex<Vec<String>>,
        statuses: PlMutex<Vec<(String, ContainerRunState)>>,
    }

    impl StubRuntime {
        fn new(fail_after: u32) -> Self {
            Self {
                launches: AtomicU32::new(0),
                fail_after,
                removed: PlMutex::new(Vec::new()),
                statuses: PlMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for StubRuntime {
        async fn cpu_and_ram(&self) -> std::result::Result<(u32, u32), RuntimeError> {
            Ok((8, 8192))
        }

        async fn run(
            &self,
            image_key: &str,
            _ports: &[PortMapping],
            _args: &[String],
            _cpus: u32,
            _ram: u32,
        ) -> std::result::Result<String, RuntimeError> {
            let count = self.launches.fetch_add(1, Ordering::SeqCst);
            if count >= self.fail_after {
                return Err(RuntimeError::Launch(format!("no space for {image_key}")));
            }
            Ok(format!("ctr-{count}"))
        }

        async fn remove(&self, container_id: &str) -> std::result::Result<(), RuntimeError> {
            self.removed.lock().push(container_id.to_owned());
            Ok(())
        }

        async fn status(
            &self,
            container_id: &str,
        ) -> std::result::Result<ContainerRunState, RuntimeError> {
            let scripted = self
                .statuses
                .lock()
                .iter()
                .find(|(id, _)| id == container_id)
                .map(|(_, state)| *state);
            Ok(scripted.unwrap_or(ContainerRunState::Running))
        }
    }

    fn config(image: &str, cpus: u32, ram: u32) -> ContainerConfig {
        ContainerConfig {
            image_key: image.into(),
            args: vec![],
            port_mappings: vec![],
            resources: low(cpus, ram).into(),
            group_policy: GroupPolicy::Spread,
        }
    }

    fn make_manager(
        obtain_ok: bool,
        fail_after: u32,
    ) -> (Arc<ContainersManager>, Arc<StubDiscovery>, Arc<StubRuntime>) {
        let discovery = Arc::new(StubDiscovery::new(obtain_ok));
        let runtime = Arc::new(StubRuntime::new(fail_after));
        let manager = Arc::new(ContainersManager::new(
            Arc::new(SchedulerConfig::default()),
            "10.0.0.1",
            runtime.clone(),
            discovery.clone(),
        ));
        (manager, discovery, runtime)
    }

    fn buyer() -> NodeRef {
        NodeRef::from_ip("10.0.0.9")
    }

    fn offer() -> Offer {
        Offer::new(1, 1, low(4, 4096).into())
    }

    #[tokio::test]
    async fn launches_whole_batch() {
        let (manager, discovery, _) = make_manager(true, u32::MAX);

        let statuses = manager
            .start_containers(&buyer(), &offer(), &[config("a", 1, 512), config("b", 2, 1024)])
            .await
            .unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].supplier_ip, "10.0.0.1");
        assert_eq!(discovery.obtained.lock().as_slice(), &[1]);
        assert_eq!(manager.list_containers().len(), 2);
        assert_eq!(manager.buyer_of(&statuses[0].container_id).unwrap(), "10.0.0.9");
    }

    #[tokio::test]
    async fn refused_reservation_fails_the_launch() {
        let (manager, _, _) = make_manager(false, u32::MAX);

        let result = manager
            .start_containers(&buyer(), &offer(), &[config("a", 1, 512)])
            .await;
        assert!(matches!(result, Err(SchedulerError::ReservationFailed(1))));
        assert!(manager.list_containers().is_empty());
    }

    #[tokio::test]
    async fn partial_launch_rolls_back_and_releases() {
        let (manager, discovery, runtime) = make_manager(true, 1);

        let result = manager
            .start_containers(&buyer(), &offer(), &[config("a", 1, 512), config("b", 2, 1024)])
            .await;

        assert!(matches!(result, Err(SchedulerError::Runtime(_))));
        assert!(manager.list_containers().is_empty());
        assert_eq!(runtime.removed.lock().as_slice(), &["ctr-0".to_owned()]);
        // The full batch reservation went back to the pool.
        assert_eq!(discovery.returned.lock().as_slice(), &[low(3, 1536)]);
    }

    #[tokio::test]
    async fn stop_releases_resources() {
        let (manager, discovery, _) = make_manager(true, u32::MAX);
        let statuses = manager
            .start_containers(&buyer(), &offer(), &[config("a", 2, 2048)])
            .await
            .unwrap();

        manager
            .stop_containers(&[statuses[0].container_id.clone()])
            .await
            .unwrap();
        assert!(manager.list_containers().is_empty());
        assert_eq!(discovery.returned.lock().as_slice(), &[low(2, 2048)]);
    }

    #[tokio::test]
    async fn stopping_unknown_container_fails() {
        let (manager, _, _) = make_manager(true, u32::MAX);
        let result = manager.stop_containers(&["missing".to_owned()]).await;
        assert!(matches!(result, Err(SchedulerError::UnknownContainer(_))));
    }

    #[tokio::test]
    async fn sweep_reaps_finished_containers() {
        let (manager, discovery, runtime) = make_manager(true, u32::MAX);
        let statuses = manager
            .start_containers(&buyer(), &offer(), &[config("a", 1, 1024), config("b", 1, 1024)])
            .await
            .unwrap();

        runtime
            .statuses
            .lock()
            .push((statuses[0].container_id.clone(), ContainerRunState::Finished));

        manager.check_containers().await;
        let remaining = manager.list_containers();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].container_id, statuses[1].container_id);
        assert_eq!(discovery.returned.lock().as_slice(), &[low(1, 1024)]);
    }
}
