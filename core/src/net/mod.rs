// Network seams — how nodes reach each other
//
// Routers and users never talk to sockets directly: frames leave through a
// `Forwarder`, and registry snapshots arrive through a `Directory`. The HTTP
// client implements both; tests substitute in-memory versions.

pub mod client;
pub mod launch;
pub mod protocol;
pub mod server;

use async_trait::async_trait;

use crate::error::Result;
use crate::onion::NextHop;
use crate::registry::NodeEntry;

pub use client::HttpClient;
pub use launch::{
    launch_network, launch_registry, launch_router, launch_routers, launch_user, launch_users,
    Network, Running,
};
pub use server::{serve_registry, serve_router, serve_user, ServerHandle};

/// Delivers a payload to the node listening at `next_hop`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, next_hop: NextHop, payload: String) -> Result<()>;
}

/// Source of registry snapshots for circuit building.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<NodeEntry>>;
}
