//! The DHT overlay interface.
//!
//! The overlay itself (a Chord-style ring) is an external collaborator; the
//! node only needs membership management, key lookup, and callbacks telling
//! it which keys it has become responsible for.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the overlay implementation.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Could not create or join the ring. Fatal at node boot.
    #[error("overlay membership failed: {0}")]
    Membership(String),

    /// A lookup failed.
    #[error("overlay lookup failed: {0}")]
    Lookup(String),
}

/// A node as reported by the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayNode {
    /// IP address of the node.
    pub ip: String,
    /// The node's GUID in fixed-width big-endian bytes.
    pub guid_bytes: Vec<u8>,
}

/// Membership callbacks the overlay fires into the node.
///
/// `new_predecessor` is the important one: owning a new key means the node
/// must start trading offers for the key's resource partition.
pub trait OverlayMembership: Send + Sync {
    /// The node became responsible for a key.
    fn new_predecessor(&self, guid_bytes: &[u8]);

    /// The local node is leaving the ring.
    fn leaving(&self) {}

    /// The current predecessor is leaving.
    fn predecessor_leaving(&self) {}

    /// A successor is leaving.
    fn successor_leaving(&self) {}

    /// The overlay is shutting down.
    fn shutdown(&self) {}
}

/// The consumed overlay surface.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Bootstraps a new ring with this node as the first member.
    async fn create(&self, listener: Arc<dyn OverlayMembership>) -> Result<(), OverlayError>;

    /// Joins an existing ring through the given peer.
    async fn join(
        &self,
        peer_ip: &str,
        peer_port: u16,
        listener: Arc<dyn OverlayMembership>,
    ) -> Result<(), OverlayError>;

    /// Resolves the nodes responsible for a key.
    async fn lookup(&self, key: &[u8]) -> Result<Vec<OverlayNode>, OverlayError>;

    /// Leaves the ring, letting successors absorb this node's keys.
    async fn leave(&self) -> Result<(), OverlayError>;
}
