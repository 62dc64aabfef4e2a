//! User — originates messages through a fresh circuit and receives final
//! deliveries from exit relays
//!
//! Destinations hold no keypair: the exit relay hands over the innermost
//! payload as plaintext.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::circuit::{build_circuit, Circuit};
use crate::config::NetworkConfig;
use crate::error::{OnionError, Result};
use crate::introspect::{unix_now, EventLog};
use crate::net::{Directory, Forwarder};
use crate::onion::build_onion;
use crate::registry::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentRecord {
    pub sent_at: u64,
    pub message: String,
    pub destination: NodeId,
    /// Relay ids, entry first. No key material.
    pub circuit: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedRecord {
    pub received_at: u64,
    pub message: String,
}

pub struct User {
    user_id: NodeId,
    config: NetworkConfig,
    directory: Arc<dyn Directory>,
    forwarder: Arc<dyn Forwarder>,
    sent: EventLog<SentRecord>,
    received: EventLog<ReceivedRecord>,
}

impl User {
    pub fn new(
        user_id: NodeId,
        config: NetworkConfig,
        directory: Arc<dyn Directory>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let history = config.event_history;
        Self {
            user_id,
            config,
            directory,
            forwarder,
            sent: EventLog::new(history),
            received: EventLog::new(history),
        }
    }

    pub fn user_id(&self) -> NodeId {
        self.user_id
    }

    /// Send `message` to user `destination` through a newly built circuit.
    ///
    /// Succeeds once the entry relay accepts the frame; later hops may still
    /// fail without this call ever knowing.
    pub async fn send_message(&self, message: &str, destination: NodeId) -> Result<Circuit> {
        let destination_hop = self.config.user_hop(destination)?;

        let snapshot = self.directory.snapshot().await.map_err(|e| match e {
            OnionError::RegistryUnavailable(_) => e,
            other => OnionError::RegistryUnavailable(other.to_string()),
        })?;

        let circuit = build_circuit(&snapshot, self.config.circuit_length)?;
        let onion = build_onion(message, destination_hop, &circuit, &self.config)?;

        let entry = circuit
            .entry()
            .ok_or(OnionError::InvalidCircuitLength(0))?;
        let entry_hop = self.config.router_hop(entry.node_id)?;

        debug!(
            "User {} handing {}-hop onion to router {}",
            self.user_id,
            circuit.len(),
            entry.node_id
        );
        self.forwarder.forward(entry_hop, onion).await?;

        self.sent.record(SentRecord {
            sent_at: unix_now(),
            message: message.to_string(),
            destination,
            circuit: circuit.node_ids(),
        });
        info!(
            "User {} sent message to user {} via {:?}",
            self.user_id,
            destination,
            circuit.node_ids()
        );

        Ok(circuit)
    }

    /// Terminal delivery from an exit relay.
    pub fn receive_message(&self, payload: &str) {
        info!("User {} received a message", self.user_id);
        self.received.record(ReceivedRecord {
            received_at: unix_now(),
            message: payload.to_string(),
        });
    }

    pub fn last_sent_message(&self) -> Option<String> {
        self.sent.latest().map(|r| r.message.clone())
    }

    pub fn last_received_message(&self) -> Option<String> {
        self.received.latest().map(|r| r.message.clone())
    }

    pub fn last_circuit(&self) -> Option<Vec<NodeId>> {
        self.sent.latest().map(|r| r.circuit.clone())
    }

    pub fn sent(&self) -> &EventLog<SentRecord> {
        &self.sent
    }

    pub fn received(&self) -> &EventLog<ReceivedRecord> {
        &self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::net::{MockDirectory, MockForwarder};
    use crate::onion::{peel_layer, NextHop};
    use crate::registry::NodeEntry;
    use std::collections::HashMap;

    fn registry_of(count: u16) -> (Vec<NodeEntry>, HashMap<NodeId, KeyPair>) {
        let mut keys = HashMap::new();
        let entries = (0..count)
            .map(|node_id| {
                let pair = KeyPair::generate();
                let entry = NodeEntry {
                    node_id,
                    public_key: *pair.public(),
                };
                keys.insert(node_id, pair);
                entry
            })
            .collect();
        (entries, keys)
    }

    fn directory_with(entries: Vec<NodeEntry>) -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory
            .expect_snapshot()
            .returning(move || Ok(entries.clone()));
        directory
    }

    #[tokio::test]
    async fn test_send_hands_off_to_entry_router() {
        let (entries, keys) = registry_of(5);
        let captured = Arc::new(parking_lot::Mutex::new(None));
        let sink = captured.clone();

        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().times(1).returning(move |hop, frame| {
            *sink.lock() = Some((hop, frame));
            Ok(())
        });

        let config = NetworkConfig::default();
        let user = User::new(0, config.clone(), Arc::new(directory_with(entries)), Arc::new(forwarder));

        let circuit = user.send_message("hello", 2).await.unwrap();
        assert_eq!(circuit.len(), 3);

        let (hop, frame) = captured.lock().take().unwrap();
        let entry = circuit.entry().unwrap().node_id;
        assert_eq!(hop, config.router_hop(entry).unwrap());

        // Peel every layer with the matching relay's key
        let mut payload = frame;
        let mut last_hop = hop;
        for node_id in circuit.node_ids() {
            let body = peel_layer(&payload, keys[&node_id].private()).unwrap();
            payload = body.payload;
            last_hop = body.next_hop;
        }
        assert_eq!(last_hop, NextHop::new(3002));
        assert_eq!(payload, "hello");

        assert_eq!(user.last_sent_message().as_deref(), Some("hello"));
        assert_eq!(user.last_circuit(), Some(circuit.node_ids()));
    }

    #[tokio::test]
    async fn test_send_with_too_few_nodes() {
        let (entries, _) = registry_of(2);
        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().never();

        let user = User::new(
            0,
            NetworkConfig::default(),
            Arc::new(directory_with(entries)),
            Arc::new(forwarder),
        );

        let result = user.send_message("hello", 1).await;
        assert!(matches!(result, Err(OnionError::InsufficientNodes { .. })));
        assert!(user.last_sent_message().is_none());
        assert!(user.last_circuit().is_none());
    }

    #[tokio::test]
    async fn test_send_when_registry_unreachable() {
        let mut directory = MockDirectory::new();
        directory.expect_snapshot().returning(|| {
            Err(OnionError::IoError("connection refused".to_string()))
        });
        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().never();

        let user = User::new(0, NetworkConfig::default(), Arc::new(directory), Arc::new(forwarder));
        let result = user.send_message("hello", 1).await;
        assert!(matches!(result, Err(OnionError::RegistryUnavailable(_))));
    }

    #[tokio::test]
    async fn test_entry_hand_off_failure_surfaces() {
        let (entries, _) = registry_of(3);
        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().times(1).returning(|hop, _| {
            Err(OnionError::ForwardingFailure {
                address: hop.port(),
                reason: "refused".to_string(),
            })
        });

        let user = User::new(
            0,
            NetworkConfig::default(),
            Arc::new(directory_with(entries)),
            Arc::new(forwarder),
        );
        let result = user.send_message("hello", 1).await;
        assert!(matches!(result, Err(OnionError::ForwardingFailure { .. })));
        assert!(user.last_sent_message().is_none());
    }

    #[test]
    fn test_receive_message() {
        let user = User::new(
            3,
            NetworkConfig::default(),
            Arc::new(MockDirectory::new()),
            Arc::new(MockForwarder::new()),
        );
        assert!(user.last_received_message().is_none());

        user.receive_message("first");
        user.receive_message("hello");
        assert_eq!(user.last_received_message().as_deref(), Some("hello"));
        assert_eq!(user.received().len(), 2);
    }
}
