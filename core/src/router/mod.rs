//! Onion Router — peels one layer per frame and forwards the remainder
//!
//! Each inbound frame moves through `Idle → Decrypting → Forwarding →
//! Idle`. Peeling happens before `relay` returns; the single forward
//! attempt runs on its own task so a stalled next hop only holds that
//! task, never the caller. Nothing carries across frames except the
//! introspection log.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::crypto::{KeyPair, PublicKey};
use crate::error::Result;
use crate::introspect::{unix_now, EventLog};
use crate::net::Forwarder;
use crate::onion::{peel_layer, NextHop};
use crate::registry::NodeId;

/// Where a frame is in its handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayPhase {
    Idle,
    Decrypting,
    Forwarding,
}

/// Result of the single forwarding attempt. Never reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardOutcome {
    Delivered,
    Failed(String),
}

/// One handled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub received_at: u64,
    /// Frame as received, still encrypted
    pub frame: String,
    /// Inner payload after peeling; `None` if decryption failed
    pub decrypted_payload: Option<String>,
    pub destination: Option<NextHop>,
    outcome: OnceLock<ForwardOutcome>,
}

impl RelayEvent {
    /// Set once the forward attempt for this frame has finished. Frames
    /// that failed to decrypt never get one.
    pub fn outcome(&self) -> Option<&ForwardOutcome> {
        self.outcome.get()
    }

    /// `Forwarding` while this frame's forward attempt is in flight.
    pub fn phase(&self) -> RelayPhase {
        if self.destination.is_some() && self.outcome.get().is_none() {
            RelayPhase::Forwarding
        } else {
            RelayPhase::Idle
        }
    }
}

/// Forward attempt started by [`Router::relay`].
///
/// Dropping it leaves the attempt running in the background.
pub struct PendingForward {
    next_hop: NextHop,
    task: JoinHandle<ForwardOutcome>,
}

impl PendingForward {
    pub fn next_hop(&self) -> NextHop {
        self.next_hop
    }

    /// Wait for the attempt to finish.
    pub async fn outcome(self) -> ForwardOutcome {
        self.task
            .await
            .unwrap_or_else(|e| ForwardOutcome::Failed(format!("forward task ended: {}", e)))
    }
}

#[derive(Default)]
struct InFlight {
    decrypting: AtomicUsize,
    forwarding: AtomicUsize,
}

pub struct Router {
    node_id: NodeId,
    keys: KeyPair,
    forwarder: Arc<dyn Forwarder>,
    in_flight: Arc<InFlight>,
    events: EventLog<RelayEvent>,
}

impl Router {
    /// A router that sends peeled payloads through `forwarder` and keeps
    /// the last `event_history` frames.
    pub fn new(
        node_id: NodeId,
        keys: KeyPair,
        forwarder: Arc<dyn Forwarder>,
        event_history: usize,
    ) -> Self {
        Self {
            node_id,
            keys,
            forwarder,
            in_flight: Arc::new(InFlight::default()),
            events: EventLog::new(event_history),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Key published to the registry; layers for this router are sealed to it.
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public()
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Handle one inbound frame.
    ///
    /// Peels the layer, records the frame, and starts forwarding the inner
    /// payload without waiting for it. Only a decryption failure is an
    /// error; a failed forward lands in the frame's event and goes no
    /// further.
    pub async fn relay(&self, frame: &str) -> Result<PendingForward> {
        self.in_flight.decrypting.fetch_add(1, Ordering::SeqCst);
        let peeled = peel_layer(frame, self.keys.private());
        self.in_flight.decrypting.fetch_sub(1, Ordering::SeqCst);

        let body = match peeled {
            Ok(body) => body,
            Err(e) => {
                warn!("Router {} dropped frame: {}", self.node_id, e);
                self.events.record(RelayEvent {
                    received_at: unix_now(),
                    frame: frame.to_string(),
                    decrypted_payload: None,
                    destination: None,
                    outcome: OnceLock::new(),
                });
                return Err(e);
            }
        };

        let next_hop = body.next_hop;
        debug!(
            "Router {} peeled layer: next hop {}, {} chars inner",
            self.node_id,
            next_hop,
            body.payload.len()
        );

        let event = self.events.record(RelayEvent {
            received_at: unix_now(),
            frame: frame.to_string(),
            decrypted_payload: Some(body.payload.clone()),
            destination: Some(next_hop),
            outcome: OnceLock::new(),
        });

        self.in_flight.forwarding.fetch_add(1, Ordering::SeqCst);
        let node_id = self.node_id;
        let forwarder = self.forwarder.clone();
        let in_flight = self.in_flight.clone();
        let task = tokio::spawn(async move {
            let outcome = match forwarder.forward(next_hop, body.payload).await {
                Ok(()) => {
                    info!("Router {} forwarded to {}", node_id, next_hop);
                    ForwardOutcome::Delivered
                }
                Err(e) => {
                    warn!("Router {} could not forward to {}: {}", node_id, next_hop, e);
                    ForwardOutcome::Failed(e.to_string())
                }
            };
            let _ = event.outcome.set(outcome.clone());
            in_flight.forwarding.fetch_sub(1, Ordering::SeqCst);
            outcome
        });

        Ok(PendingForward { next_hop, task })
    }

    /// Busiest phase across all frames in flight: `Forwarding` if any
    /// forward attempt is outstanding, else `Decrypting` if a frame is
    /// being peeled, else `Idle`.
    pub fn phase(&self) -> RelayPhase {
        if self.in_flight.forwarding.load(Ordering::SeqCst) > 0 {
            RelayPhase::Forwarding
        } else if self.in_flight.decrypting.load(Ordering::SeqCst) > 0 {
            RelayPhase::Decrypting
        } else {
            RelayPhase::Idle
        }
    }

    /// Encrypted frame of the most recent event.
    pub fn last_received_frame(&self) -> Option<String> {
        self.events.latest().map(|e| e.frame.clone())
    }

    /// Peeled payload of the most recent event; `None` if it failed to decrypt.
    pub fn last_decrypted_payload(&self) -> Option<String> {
        self.events.latest().and_then(|e| e.decrypted_payload.clone())
    }

    pub fn last_destination(&self) -> Option<NextHop> {
        self.events.latest().and_then(|e| e.destination)
    }

    pub fn events(&self) -> &EventLog<RelayEvent> {
        &self.events
    }
}
