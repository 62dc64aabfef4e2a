// Network addressing and per-process tunables
//
// Every router and user is reachable at a base port offset by its integer
// identifier; the registry listens on one well-known port.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::circuit::DEFAULT_CIRCUIT_LENGTH;
use crate::error::{OnionError, Result};
use crate::onion::NextHop;
use crate::registry::NodeId;

pub const DEFAULT_REGISTRY_PORT: u16 = 8080;
pub const DEFAULT_BASE_ROUTER_PORT: u16 = 4000;
pub const DEFAULT_BASE_USER_PORT: u16 = 3000;

/// Where every node lives and how each behaves. Shared by all nodes of
/// one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host used both for binding and for building peer URLs
    pub host: String,
    /// Well-known registry port
    pub registry_port: u16,
    /// Router `n` listens on `base_router_port + n`
    pub base_router_port: u16,
    /// User `n` listens on `base_user_port + n`
    pub base_user_port: u16,
    /// Relays per circuit
    pub circuit_length: usize,
    /// How many introspection events each node keeps
    pub event_history: usize,
    /// Routers publish their private key to the registry (test instrumentation only)
    pub expose_private_keys: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            registry_port: DEFAULT_REGISTRY_PORT,
            base_router_port: DEFAULT_BASE_ROUTER_PORT,
            base_user_port: DEFAULT_BASE_USER_PORT,
            circuit_length: DEFAULT_CIRCUIT_LENGTH,
            event_history: 16,
            expose_private_keys: true,
        }
    }
}

impl NetworkConfig {
    /// Reject a zero circuit length or a host that is not an IP literal.
    pub fn validate(&self) -> Result<()> {
        if self.circuit_length == 0 {
            return Err(OnionError::InvalidCircuitLength(0));
        }
        if self.host.trim().is_empty() {
            return Err(OnionError::InvalidAddress("empty host".to_string()));
        }
        self.bind_addr(self.registry_port)?;
        Ok(())
    }

    fn offset(base: u16, id: NodeId, role: &str) -> Result<u16> {
        base.checked_add(id).ok_or_else(|| {
            OnionError::InvalidAddress(format!("{} {} overflows port range from base {}", role, id, base))
        })
    }

    /// Port of router `node_id`; `InvalidAddress` if it would pass 65535.
    pub fn router_port(&self, node_id: NodeId) -> Result<u16> {
        Self::offset(self.base_router_port, node_id, "router")
    }

    /// Port of user `user_id`; `InvalidAddress` if it would pass 65535.
    pub fn user_port(&self, user_id: NodeId) -> Result<u16> {
        Self::offset(self.base_user_port, user_id, "user")
    }

    /// Address a layer uses to reach router `node_id`.
    pub fn router_hop(&self, node_id: NodeId) -> Result<NextHop> {
        self.router_port(node_id).map(NextHop::new)
    }

    /// Address the exit layer uses to reach user `user_id`.
    pub fn user_hop(&self, user_id: NodeId) -> Result<NextHop> {
        self.user_port(user_id).map(NextHop::new)
    }

    /// Socket address a node on `port` binds to.
    pub fn bind_addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|e| OnionError::InvalidAddress(format!("{}:{}: {}", self.host, port, e)))
    }

    /// `http://host:port` followed by `path`, which must start with `/` or be empty.
    pub fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{}{}", self.host, port, path)
    }

    pub fn registry_url(&self, path: &str) -> String {
        self.url(self.registry_port, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry_port, 8080);
        assert_eq!(config.circuit_length, 3);
    }

    #[test]
    fn test_port_offsets() {
        let config = NetworkConfig::default();
        assert_eq!(config.router_port(2).unwrap(), 4002);
        assert_eq!(config.user_port(7).unwrap(), 3007);
        assert_eq!(config.router_hop(1).unwrap(), NextHop::new(4001));
    }

    #[test]
    fn test_port_overflow_rejected() {
        let config = NetworkConfig {
            base_router_port: 65530,
            ..NetworkConfig::default()
        };
        assert!(matches!(config.router_port(10), Err(OnionError::InvalidAddress(_))));
    }

    #[test]
    fn test_invalid_config() {
        let config = NetworkConfig {
            circuit_length: 0,
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NetworkConfig {
            host: "not a host".to_string(),
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_urls() {
        let config = NetworkConfig::default();
        assert_eq!(config.registry_url("/status"), "http://127.0.0.1:8080/status");
        assert_eq!(config.url(4001, "/message"), "http://127.0.0.1:4001/message");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: NetworkConfig = serde_json::from_str(r#"{"registry_port": 9000}"#).unwrap();
        assert_eq!(config.registry_port, 9000);
        assert_eq!(config.base_router_port, DEFAULT_BASE_ROUTER_PORT);
    }
}
