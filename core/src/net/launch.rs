// Launchers — start registry, routers and users as HTTP nodes on the
// configured ports

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::HttpClient;
use super::server::{serve_registry, serve_router, serve_user, ServerHandle};
use crate::config::NetworkConfig;
use crate::crypto::KeyPair;
use crate::error::Result;
use crate::registry::{NodeId, Registry};
use crate::router::Router;
use crate::user::User;

/// A node together with the server exposing it.
pub struct Running<T> {
    pub node: Arc<T>,
    pub server: ServerHandle,
}

impl<T> Running<T> {
    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}

pub async fn launch_registry(config: &NetworkConfig) -> Result<Running<Registry>> {
    config.validate()?;
    let registry = Arc::new(Registry::new());
    let addr = config.bind_addr(config.registry_port)?;
    let server = serve_registry(addr, registry.clone()).await?;
    Ok(Running {
        node: registry,
        server,
    })
}

/// Generate keys, start serving, then register with the registry.
///
/// The router is only returned once registration succeeded; otherwise its
/// server is stopped and the error returned.
pub async fn launch_router(config: &NetworkConfig, node_id: NodeId) -> Result<Running<Router>> {
    let client = Arc::new(HttpClient::new(config.clone()));
    let router = Arc::new(Router::new(
        node_id,
        KeyPair::generate(),
        client.clone(),
        config.event_history,
    ));

    let addr = config.bind_addr(config.router_port(node_id)?)?;
    let server = serve_router(addr, router.clone()).await?;

    let exposed = config
        .expose_private_keys
        .then(|| router.keys().private());
    if let Err(e) = client
        .register_node(node_id, router.public_key(), exposed)
        .await
    {
        warn!("Router {} failed to register: {}", node_id, e);
        server.shutdown().await;
        return Err(e);
    }

    Ok(Running {
        node: router,
        server,
    })
}

/// Routers `0..count`, in id order.
pub async fn launch_routers(config: &NetworkConfig, count: u16) -> Result<Vec<Running<Router>>> {
    let routers = try_join_all((0..count).map(|node_id| launch_router(config, node_id))).await?;
    info!("Launched {} onion routers", count);
    Ok(routers)
}

pub async fn launch_user(config: &NetworkConfig, user_id: NodeId) -> Result<Running<User>> {
    let client = Arc::new(HttpClient::new(config.clone()));
    let user = Arc::new(User::new(user_id, config.clone(), client.clone(), client));

    let addr = config.bind_addr(config.user_port(user_id)?)?;
    let server = serve_user(addr, user.clone()).await?;
    Ok(Running { node: user, server })
}

pub async fn launch_users(config: &NetworkConfig, count: u16) -> Result<Vec<Running<User>>> {
    let users = try_join_all((0..count).map(|user_id| launch_user(config, user_id))).await?;
    info!("Launched {} users", count);
    Ok(users)
}

/// A complete simulated overlay on one host.
pub struct Network {
    pub registry: Running<Registry>,
    pub routers: Vec<Running<Router>>,
    pub users: Vec<Running<User>>,
    config: NetworkConfig,
}

impl Network {
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn client(&self) -> HttpClient {
        HttpClient::new(self.config.clone())
    }

    pub fn router(&self, node_id: NodeId) -> Option<&Arc<Router>> {
        self.routers
            .iter()
            .map(|r| &r.node)
            .find(|r| r.node_id() == node_id)
    }

    pub fn user(&self, user_id: NodeId) -> Option<&Arc<User>> {
        self.users
            .iter()
            .map(|u| &u.node)
            .find(|u| u.user_id() == user_id)
    }

    /// Stop users first, then routers, then the registry.
    pub async fn shutdown(self) {
        for user in self.users {
            user.shutdown().await;
        }
        for router in self.routers {
            router.shutdown().await;
        }
        self.registry.shutdown().await;
        info!("Network shut down");
    }
}

/// Registry, `routers` routers and `users` users. If a later launch fails,
/// dropping the handles already started stops their servers.
pub async fn launch_network(config: NetworkConfig, routers: u16, users: u16) -> Result<Network> {
    let registry = launch_registry(&config).await?;
    let routers = launch_routers(&config, routers).await?;
    let users = launch_users(&config, users).await?;

    info!(
        "Network up: registry on {}, {} routers, {} users",
        config.registry_port,
        routers.len(),
        users.len()
    );

    Ok(Network {
        registry,
        routers,
        users,
        config,
    })
}
