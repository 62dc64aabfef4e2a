// Circuit Building — selecting the relays a message travels through
//
// Relays are drawn uniformly at random, without replacement, from the
// registry snapshot taken at send time.

use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::error::{OnionError, Result};
use crate::registry::{NodeEntry, NodeId};

pub const DEFAULT_CIRCUIT_LENGTH: usize = 3;

/// Ordered relays: index 0 is the entry, the last is the exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    hops: Vec<NodeEntry>,
}

impl Circuit {
    pub fn from_hops(hops: Vec<NodeEntry>) -> Self {
        Self { hops }
    }

    pub fn hops(&self) -> &[NodeEntry] {
        &self.hops
    }

    pub fn entry(&self) -> Option<&NodeEntry> {
        self.hops.first()
    }

    pub fn exit(&self) -> Option<&NodeEntry> {
        self.hops.last()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.hops.iter().map(|h| h.node_id).collect()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Pick `length` distinct relays from `snapshot`.
///
/// Fails with `InsufficientNodes` when the snapshot holds fewer distinct
/// node ids than requested.
pub fn build_circuit(snapshot: &[NodeEntry], length: usize) -> Result<Circuit> {
    if length == 0 {
        return Err(OnionError::InvalidCircuitLength(length));
    }

    let mut seen = HashSet::new();
    let eligible: Vec<&NodeEntry> = snapshot
        .iter()
        .filter(|node| seen.insert(node.node_id))
        .collect();

    if eligible.len() < length {
        return Err(OnionError::InsufficientNodes {
            required: length,
            available: eligible.len(),
        });
    }

    let mut rng = rand::thread_rng();
    let hops = eligible
        .choose_multiple(&mut rng, length)
        .map(|node| (*node).clone())
        .collect();

    Ok(Circuit { hops })
}
