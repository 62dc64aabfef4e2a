// HTTP protocol — request/response bodies and route paths

use serde::{Deserialize, Serialize};

use crate::error::OnionError;
use crate::registry::{NodeEntry, NodeId};

/// Body of a successful `/status` reply.
pub const STATUS_LIVE: &str = "live";

pub const PATH_STATUS: &str = "/status";
pub const PATH_REGISTER_NODE: &str = "/registerNode";
pub const PATH_NODE_REGISTRY: &str = "/getNodeRegistry";
pub const PATH_PRIVATE_KEY: &str = "/getPrivateKey/";
pub const PATH_MESSAGE: &str = "/message";
pub const PATH_SEND_MESSAGE: &str = "/sendMessage";
pub const PATH_LAST_ENCRYPTED: &str = "/getLastReceivedEncryptedMessage";
pub const PATH_LAST_DECRYPTED: &str = "/getLastReceivedDecryptedMessage";
pub const PATH_LAST_DESTINATION: &str = "/getLastMessageDestination";
pub const PATH_LAST_RECEIVED: &str = "/getLastReceivedMessage";
pub const PATH_LAST_SENT: &str = "/getLastSentMessage";
pub const PATH_LAST_CIRCUIT: &str = "/getLastCircuit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeBody {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    #[serde(rename = "pubKey")]
    pub public_key: String,
    #[serde(rename = "prvKey", default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistryBody {
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyBody {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    #[serde(rename = "prvKey")]
    pub private_key: String,
}

/// Carried by `/message` on both routers (a frame) and users (plaintext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageBody {
    pub message: String,
    #[serde(rename = "destinationUserId")]
    pub destination_user_id: NodeId,
}

/// Envelope for introspection replies; `result` is null until something
/// has been recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub reason: String,
}

impl From<&OnionError> for ErrorBody {
    fn from(err: &OnionError) -> Self {
        match err {
            // Relay the downstream node's own code unchanged
            OnionError::Remote {
                reason, message, ..
            } => Self {
                error: message.clone(),
                reason: reason.clone(),
            },
            other => Self {
                error: other.to_string(),
                reason: other.reason().to_string(),
            },
        }
    }
}
