// HTTP client — the wire side of the Forwarder and Directory seams, plus
// typed access to every node's routes

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::protocol::*;
use super::{Directory, Forwarder};
use crate::config::NetworkConfig;
use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{OnionError, Result};
use crate::onion::NextHop;
use crate::registry::{NodeEntry, NodeId};

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector>,
    config: NetworkConfig,
}

impl HttpClient {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    async fn call(&self, method: Method, port: u16, path: &str, body: Body) -> Result<Bytes> {
        let url = self.config.url(port, path);
        let req = Request::builder()
            .method(method)
            .uri(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|e| OnionError::InvalidAddress(format!("{}: {}", url, e)))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| OnionError::IoError(format!("{}: {}", url, e)))?;
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| OnionError::IoError(format!("{}: {}", url, e)))?;

        if !status.is_success() {
            return Err(remote_error(status, &bytes));
        }
        Ok(bytes)
    }

    async fn get_json<T: DeserializeOwned>(&self, port: u16, path: &str) -> Result<T> {
        let bytes = self.call(Method::GET, port, path, Body::empty()).await?;
        decode(&bytes)
    }

    async fn post_json<B: Serialize>(&self, port: u16, path: &str, body: &B) -> Result<Bytes> {
        let json = serde_json::to_vec(body).map_err(|e| OnionError::BadRequest(e.to_string()))?;
        self.call(Method::POST, port, path, Body::from(json)).await
    }

    async fn get_result<T: DeserializeOwned>(&self, port: u16, path: &str) -> Result<Option<T>> {
        let body: ResultBody<T> = self.get_json(port, path).await?;
        Ok(body.result)
    }

    /// Liveness text of whatever node listens on `port`.
    pub async fn status(&self, port: u16) -> Result<String> {
        let bytes = self.call(Method::GET, port, PATH_STATUS, Body::empty()).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // Registry

    pub async fn register_node(
        &self,
        node_id: NodeId,
        public_key: &PublicKey,
        private_key: Option<&PrivateKey>,
    ) -> Result<NodeEntry> {
        let body = RegisterNodeBody {
            node_id,
            public_key: public_key.encode(),
            private_key: private_key.map(PrivateKey::encode),
        };
        let bytes = self
            .post_json(self.config.registry_port, PATH_REGISTER_NODE, &body)
            .await
            .map_err(|e| match e {
                OnionError::Remote { status: 409, .. } => OnionError::RegistrationConflict(node_id),
                other => other,
            })?;
        decode(&bytes)
    }

    pub async fn node_registry(&self) -> Result<Vec<NodeEntry>> {
        let body: NodeRegistryBody = self
            .get_json(self.config.registry_port, PATH_NODE_REGISTRY)
            .await?;
        Ok(body.nodes)
    }

    pub async fn private_key(&self, node_id: NodeId) -> Result<PrivateKey> {
        let path = format!("{}{}", PATH_PRIVATE_KEY, node_id);
        let body: PrivateKeyBody = self
            .get_json(self.config.registry_port, &path)
            .await
            .map_err(|e| match e {
                OnionError::Remote { status: 404, .. } => OnionError::KeyNotFound(node_id),
                other => other,
            })?;
        PrivateKey::decode(&body.private_key)
    }

    // Routers

    pub async fn last_received_frame(&self, router_id: NodeId) -> Result<Option<String>> {
        let port = self.config.router_port(router_id)?;
        self.get_result(port, PATH_LAST_ENCRYPTED).await
    }

    pub async fn last_decrypted_payload(&self, router_id: NodeId) -> Result<Option<String>> {
        let port = self.config.router_port(router_id)?;
        self.get_result(port, PATH_LAST_DECRYPTED).await
    }

    pub async fn last_destination(&self, router_id: NodeId) -> Result<Option<u16>> {
        let port = self.config.router_port(router_id)?;
        self.get_result(port, PATH_LAST_DESTINATION).await
    }

    // Users

    /// Ask user `from` to send `message` to user `to`; returns the circuit.
    pub async fn send_message(&self, from: NodeId, to: NodeId, message: &str) -> Result<Vec<NodeId>> {
        let port = self.config.user_port(from)?;
        let body = SendMessageBody {
            message: message.to_string(),
            destination_user_id: to,
        };
        let bytes = self.post_json(port, PATH_SEND_MESSAGE, &body).await?;
        let reply: ResultBody<Vec<NodeId>> = decode(&bytes)?;
        Ok(reply.result.unwrap_or_default())
    }

    pub async fn last_received_message(&self, user_id: NodeId) -> Result<Option<String>> {
        let port = self.config.user_port(user_id)?;
        self.get_result(port, PATH_LAST_RECEIVED).await
    }

    pub async fn last_sent_message(&self, user_id: NodeId) -> Result<Option<String>> {
        let port = self.config.user_port(user_id)?;
        self.get_result(port, PATH_LAST_SENT).await
    }

    pub async fn last_circuit(&self, user_id: NodeId) -> Result<Option<Vec<NodeId>>> {
        let port = self.config.user_port(user_id)?;
        self.get_result(port, PATH_LAST_CIRCUIT).await
    }
}

#[async_trait]
impl Forwarder for HttpClient {
    async fn forward(&self, next_hop: NextHop, payload: String) -> Result<()> {
        debug!("POST {} to port {}", PATH_MESSAGE, next_hop);
        self.post_json(next_hop.port(), PATH_MESSAGE, &MessageBody { message: payload })
            .await
            .map(|_| ())
            .map_err(|e| OnionError::ForwardingFailure {
                address: next_hop.port(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Directory for HttpClient {
    async fn snapshot(&self) -> Result<Vec<NodeEntry>> {
        self.node_registry()
            .await
            .map_err(|e| OnionError::RegistryUnavailable(e.to_string()))
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| OnionError::IoError(format!("unexpected reply: {}", e)))
}

fn remote_error(status: StatusCode, bytes: &[u8]) -> OnionError {
    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(body) => OnionError::Remote {
            status: status.as_u16(),
            reason: body.reason,
            message: body.error,
        },
        Err(_) => OnionError::Remote {
            status: status.as_u16(),
            reason: "unknown".to_string(),
            message: String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}
