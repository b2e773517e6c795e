//! CARAVELA node assembly.
//!
//! This crate wires the discovery and scheduling components into one node
//! and gives it its two network surfaces:
//!
//! - the **user REST API** (`/containers`, `/exit`) a local user or the CLI
//!   talks to, and
//! - the **node-to-node RPC surface** (`/node/...`) other nodes call, with
//!   [`HttpNodeClient`] as the outbound counterpart.
//!
//! The DHT overlay and the container engine stay behind the traits in
//! `caravela-core`; whoever embeds a node supplies implementations for the
//! deployment at hand.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
mod node;

pub use client::HttpNodeClient;
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::Node;
