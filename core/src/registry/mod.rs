//! Node Registry — directory of relay identifiers and their public keys
//!
//! Membership only grows: a node id, once registered, is never replaced or
//! removed for the lifetime of the registry.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{OnionError, Result};
use crate::net::Directory;

/// Integer identifier of a router or user; its port is `base + id`.
pub type NodeId = u16;

/// Public view of a registered node, as handed to circuit builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    #[serde(rename = "pubKey")]
    pub public_key: PublicKey,
}

/// Stored registration. Immutable once created.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    node_id: NodeId,
    public_key: PublicKey,
    private_key: Option<PrivateKey>,
}

impl NodeRecord {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Public part of the record; the private key never leaves it.
    pub fn entry(&self) -> NodeEntry {
        NodeEntry {
            node_id: self.node_id,
            public_key: self.public_key,
        }
    }
}

/// In-memory registry. Created at process start, dropped at shutdown.
#[derive(Default)]
pub struct Registry {
    records: RwLock<Vec<NodeRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new node. Fails with `RegistrationConflict` if the id is
    /// already present; existing records are never overwritten.
    pub fn register_node(
        &self,
        node_id: NodeId,
        public_key: PublicKey,
        private_key: Option<PrivateKey>,
    ) -> Result<NodeEntry> {
        let mut records = self.records.write();

        if records.iter().any(|r| r.node_id == node_id) {
            warn!("Rejected duplicate registration for node {}", node_id);
            return Err(OnionError::RegistrationConflict(node_id));
        }

        let record = NodeRecord {
            node_id,
            public_key,
            private_key,
        };
        let entry = record.entry();
        records.push(record);

        info!("Registered node {} ({} known)", node_id, records.len());
        Ok(entry)
    }

    /// All known nodes, in registration order.
    pub fn node_registry(&self) -> Vec<NodeEntry> {
        self.records.read().iter().map(NodeRecord::entry).collect()
    }

    /// Private key stored with `node_id`'s registration.
    ///
    /// Insecure test/debug escape hatch: routers only publish their key when
    /// `expose_private_keys` is set. `KeyNotFound` if the node is unknown or
    /// registered without one.
    pub fn private_key(&self, node_id: NodeId) -> Result<PrivateKey> {
        self.records
            .read()
            .iter()
            .find(|r| r.node_id == node_id)
            .and_then(|r| r.private_key.clone())
            .ok_or(OnionError::KeyNotFound(node_id))
    }

    /// Whether `node_id` has registered.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.records.read().iter().any(|r| r.node_id == node_id)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl Directory for Registry {
    async fn snapshot(&self) -> Result<Vec<NodeEntry>> {
        Ok(self.node_registry())
    }
}
