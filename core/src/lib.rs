// OnionNet Core — layered-encryption relay overlay
//
// A registry publishes relay public keys. Users wrap each message in one
// hybrid-encrypted layer per relay of a randomly chosen circuit, and every
// router peels exactly one layer before forwarding what is left.

pub mod circuit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod introspect;
pub mod net;
pub mod onion;
pub mod registry;
pub mod router;
pub mod user;

pub use circuit::{build_circuit, Circuit, DEFAULT_CIRCUIT_LENGTH};
pub use config::NetworkConfig;
pub use crypto::{Key, KeyKind, KeyPair, PrivateKey, PublicKey, SymmetricKey};
pub use error::{OnionError, Result};
pub use introspect::EventLog;
pub use net::{Directory, Forwarder, HttpClient, Network, Running, ServerHandle};
pub use onion::{build_onion, encrypt_layer, peel_layer, LayerBody, NextHop, OnionFrame};
pub use registry::{NodeEntry, NodeId, Registry};
pub use router::{ForwardOutcome, PendingForward, RelayEvent, RelayPhase, Router};
pub use user::{ReceivedRecord, SentRecord, User};
