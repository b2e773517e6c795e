//! An in-process test network.
//!
//! Nodes are wired with a loopback [`NodeClient`] that routes calls
//! directly into the target node's components, and a [`TestOverlay`] whose
//! lookups resolve against the traders the test registered. Discovery runs
//! in simulation mode, so every transition is synchronous and the tests
//! drive ticks explicitly. Crashing a node makes it invisible to lookups
//! and unreachable to calls.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use caravela_core::{
    ClientError, ClientResult, ContainerRuntime, Guid, GuidSpace, NodeClient, Overlay,
    OverlayError, OverlayMembership, OverlayNode, ResourceMapping, Resources, RuntimeError,
};
use caravela_discovery::{DiscoveryConfig, DiscoveryError};
use caravela_node::{Node, NodeConfig};
use caravela_proto::{
    ContainerConfig, ContainerRunState, ContainerStatus, CpuClass, ErrorCode, GetOffersResponse,
    GroupPolicy, NodeRef, Offer, PortMapping,
};
use caravela_scheduler::SchedulerError;

/// Shorthand for a low-class resource tuple.
pub fn low(cpus: u32, ram: u32) -> Resources {
    Resources::new(CpuClass::Low, cpus, ram)
}

/// A container config with the given demand and group policy.
pub fn container(image: &str, cpus: u32, ram: u32, policy: GroupPolicy) -> ContainerConfig {
    ContainerConfig {
        image_key: image.into(),
        args: vec![],
        port_mappings: vec![],
        resources: low(cpus, ram).into(),
        group_policy: policy,
    }
}

/// The in-process network the test nodes live in. Cloning shares the
/// network.
#[derive(Clone)]
pub struct TestNet {
    inner: Arc<NetState>,
}

struct NetState {
    mapping: Arc<ResourceMapping>,
    nodes: Mutex<HashMap<String, Arc<Node>>>,
    traders: Mutex<Vec<(Guid, String)>>,
    crashed: Mutex<HashSet<String>>,
}

impl TestNet {
    /// A network over the standard test partitions (cores 1/2/4, RAM
    /// 1024/2048/4096, 160-bit space).
    pub fn new() -> Self {
        let mapping = Arc::new(
            ResourceMapping::from_grid(
                GuidSpace::default(),
                &[CpuClass::Low],
                &[1, 2, 4],
                &[1024, 2048, 4096],
            )
            .expect("test mapping"),
        );
        Self {
            inner: Arc::new(NetState {
                mapping,
                nodes: Mutex::new(HashMap::new()),
                traders: Mutex::new(Vec::new()),
                crashed: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Adds a simulation-mode node owning `max` resources. The node is not
    /// started: tests register traders first, then call `start` to trigger
    /// the initial advertisement.
    pub async fn add_node(&self, ip: &str, max: Resources) -> (Arc<Node>, Arc<FakeRuntime>) {
        let config = NodeConfig {
            host_ip: ip.to_owned(),
            discovery: DiscoveryConfig {
                simulation: true,
                // The literal failure-detection values the scenarios use.
                max_refreshes_missed: 2,
                refresh_missed_timeout: Duration::ZERO,
                partition_samples: 3,
                ..DiscoveryConfig::default()
            },
            ..NodeConfig::default()
        };

        let overlay = Arc::new(TestOverlay {
            net: self.inner.clone(),
        });
        let client = Arc::new(LoopbackClient {
            net: self.inner.clone(),
        });
        let runtime = Arc::new(FakeRuntime::new(max.cpus(), max.ram()));

        let node = Node::new(config, overlay, client, runtime.clone())
            .await
            .expect("node assembly");
        self.inner.nodes.lock().insert(ip.to_owned(), node.clone());
        (node, runtime)
    }

    /// Registers `node` as the trader for a random GUID inside `partition`
    /// and returns that GUID.
    pub fn add_trader(&self, node: &Arc<Node>, partition: Resources) -> Guid {
        let guid = self
            .inner
            .mapping
            .random_guid(partition)
            .expect("known partition");
        let bytes = self.inner.mapping.space().to_bytes(&guid);
        node.discovery().add_trader(&bytes);
        self.inner
            .traders
            .lock()
            .push((guid.clone(), node.config().host_ip.clone()));
        guid
    }

    /// Makes a node invisible to lookups and unreachable to calls.
    pub fn crash(&self, ip: &str) {
        self.inner.crashed.lock().insert(ip.to_owned());
    }

    /// Brings a crashed node back.
    pub fn restore(&self, ip: &str) {
        self.inner.crashed.lock().remove(ip);
    }

    /// The shared resource mapping.
    pub fn mapping(&self) -> &Arc<ResourceMapping> {
        &self.inner.mapping
    }
}

impl NetState {
    fn node(&self, ip: &str) -> ClientResult<Arc<Node>> {
        if self.crashed.lock().contains(ip) {
            return Err(ClientError::Unreachable(format!("{ip} is down")));
        }
        self.nodes
            .lock()
            .get(ip)
            .cloned()
            .ok_or_else(|| ClientError::Unreachable(format!("{ip} is unknown")))
    }

    fn lookup(&self, key: &[u8]) -> Vec<OverlayNode> {
        let target = self.mapping.resources_for(&Guid::from_bytes(key));
        let crashed = self.crashed.lock();
        self.traders
            .lock()
            .iter()
            .filter(|(guid, ip)| {
                !crashed.contains(ip) && self.mapping.resources_for(guid) == target
            })
            .map(|(guid, ip)| OverlayNode {
                ip: ip.clone(),
                guid_bytes: self.mapping.space().to_bytes(guid),
            })
            .collect()
    }
}

/// Overlay whose lookups resolve against the registered traders.
pub struct TestOverlay {
    net: Arc<NetState>,
}

#[async_trait]
impl Overlay for TestOverlay {
    async fn create(&self, _listener: Arc<dyn OverlayMembership>) -> Result<(), OverlayError> {
        Ok(())
    }

    async fn join(
        &self,
        _peer_ip: &str,
        _peer_port: u16,
        _listener: Arc<dyn OverlayMembership>,
    ) -> Result<(), OverlayError> {
        Ok(())
    }

    async fn lookup(&self, key: &[u8]) -> Result<Vec<OverlayNode>, OverlayError> {
        Ok(self.net.lookup(key))
    }

    async fn leave(&self) -> Result<(), OverlayError> {
        Ok(())
    }
}

/// Routes node-to-node calls directly into the target node's components.
pub struct LoopbackClient {
    net: Arc<NetState>,
}

fn discovery_error(error: DiscoveryError) -> ClientError {
    match error {
        DiscoveryError::UnknownTrader(_) => ClientError::Rejected(ErrorCode::UnknownTrader),
        DiscoveryError::StaleOffer(_) => ClientError::Rejected(ErrorCode::StaleOffer),
        DiscoveryError::InvalidResources => ClientError::Rejected(ErrorCode::InvalidRequest),
        other => ClientError::Protocol(other.to_string()),
    }
}

fn scheduler_error(error: SchedulerError) -> ClientError {
    match error {
        SchedulerError::ReservationFailed(_) => ClientError::Rejected(ErrorCode::StaleOffer),
        SchedulerError::EmptySubmission | SchedulerError::UnknownContainer(_) => {
            ClientError::Rejected(ErrorCode::InvalidRequest)
        }
        SchedulerError::Runtime(_) => ClientError::Rejected(ErrorCode::RuntimeFailure),
        other => ClientError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl NodeClient for LoopbackClient {
    async fn create_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let node = self.net.node(&to_trader.ip)?;
        node.discovery()
            .create_offer(from_supplier, to_trader, offer)
            .await
            .map_err(discovery_error)
    }

    async fn refresh_offer(
        &self,
        from_trader: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<bool> {
        let node = self.net.node(&to_supplier.ip)?;
        Ok(node.discovery().refresh_offer(from_trader, offer.id))
    }

    async fn update_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let node = self.net.node(&to_trader.ip)?;
        node.discovery()
            .update_offer(from_supplier, to_trader, offer)
            .map_err(discovery_error)
    }

    async fn remove_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let node = self.net.node(&to_trader.ip)?;
        node.discovery()
            .remove_offer(from_supplier, to_trader, offer.id)
            .map_err(discovery_error)
    }

    async fn get_offers(
        &self,
        _from_node: &NodeRef,
        to_trader: &NodeRef,
        relay: bool,
    ) -> ClientResult<GetOffersResponse> {
        let node = self.net.node(&to_trader.ip)?;
        node.discovery()
            .get_offers(to_trader, relay)
            .await
            .map_err(discovery_error)
    }

    async fn advertise_offers_neighbour(
        &self,
        _from_trader: &NodeRef,
        to_neighbour: &NodeRef,
        offering: &NodeRef,
    ) -> ClientResult<()> {
        let node = self.net.node(&to_neighbour.ip)?;
        node.discovery()
            .advertise_offers_neighbour(to_neighbour, offering.clone())
            .map_err(discovery_error)
    }

    async fn launch_containers(
        &self,
        from_buyer: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
        configs: &[ContainerConfig],
    ) -> ClientResult<Vec<ContainerStatus>> {
        let node = self.net.node(&to_supplier.ip)?;
        node.scheduler()
            .launch(from_buyer, offer, configs)
            .await
            .map_err(scheduler_error)
    }

    async fn stop_local_container(
        &self,
        to_supplier: &NodeRef,
        container_id: &str,
    ) -> ClientResult<()> {
        let node = self.net.node(&to_supplier.ip)?;
        node.containers()
            .stop_containers(std::slice::from_ref(&container_id.to_owned()))
            .await
            .map_err(scheduler_error)
    }
}

/// Container engine stub with a fixed machine size and scriptable failures.
pub struct FakeRuntime {
    cpus: u32,
    ram: u32,
    next_id: AtomicU32,
    failing_images: Mutex<HashSet<String>>,
    states: Mutex<HashMap<String, ContainerRunState>>,
}

impl FakeRuntime {
    pub fn new(cpus: u32, ram: u32) -> Self {
        Self {
            cpus,
            ram,
            next_id: AtomicU32::new(1),
            failing_images: Mutex::new(HashSet::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every launch of `image` fail from now on.
    pub fn fail_image(&self, image: &str) {
        self.failing_images.lock().insert(image.to_owned());
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn cpu_and_ram(&self) -> Result<(u32, u32), RuntimeError> {
        Ok((self.cpus, self.ram))
    }

    async fn run(
        &self,
        image_key: &str,
        _ports: &[PortMapping],
        _args: &[String],
        _cpus: u32,
        _ram: u32,
    ) -> Result<String, RuntimeError> {
        if self.failing_images.lock().contains(image_key) {
            return Err(RuntimeError::Launch(format!("image {image_key} refused")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let container_id = format!("ctr-{id}");
        self.states
            .lock()
            .insert(container_id.clone(), ContainerRunState::Running);
        Ok(container_id)
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.states.lock().remove(container_id);
        Ok(())
    }

    async fn status(&self, container_id: &str) -> Result<ContainerRunState, RuntimeError> {
        Ok(self
            .states
            .lock()
            .get(container_id)
            .copied()
            .unwrap_or(ContainerRunState::Unknown))
    }
}
