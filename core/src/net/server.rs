// HTTP services for the registry, routers and users
//
// One hyper server per node. Handlers never panic on bad input: every
// failure becomes an `{error, reason}` reply with a mapped status code.

use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::protocol::*;
use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{OnionError, Result};
use crate::registry::{NodeId, Registry};
use crate::router::Router;
use crate::user::User;

/// Running server. Dropping the handle also stops the server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!("Server on {} stopped", self.addr);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve<S, H, F>(addr: SocketAddr, name: &str, state: Arc<S>, handler: H) -> Result<ServerHandle>
where
    S: Send + Sync + 'static,
    H: Fn(Request<Body>, Arc<S>) -> F + Copy + Send + Sync + 'static,
    F: Future<Output = Response<Body>> + Send + 'static,
{
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handler(req, state).await) }
            }))
        }
    });

    let builder = Server::try_bind(&addr)
        .map_err(|e| OnionError::IoError(format!("bind {}: {}", addr, e)))?;
    let server = builder.serve(make_svc);
    let local_addr = server.local_addr();

    let (tx, rx) = oneshot::channel::<()>();
    let graceful = server.with_graceful_shutdown(async {
        let _ = rx.await;
    });

    let label = name.to_string();
    let task = tokio::spawn(async move {
        if let Err(e) = graceful.await {
            error!("{} server error: {}", label, e);
        }
    });

    info!("{} listening on {}", name, local_addr);

    Ok(ServerHandle {
        addr: local_addr,
        shutdown: Some(tx),
        task: Some(task),
    })
}

pub async fn serve_registry(addr: SocketAddr, registry: Arc<Registry>) -> Result<ServerHandle> {
    serve(addr, "Registry", registry, handle_registry).await
}

pub async fn serve_router(addr: SocketAddr, router: Arc<Router>) -> Result<ServerHandle> {
    let name = format!("Router {}", router.node_id());
    serve(addr, &name, router, handle_router).await
}

pub async fn serve_user(addr: SocketAddr, user: Arc<User>) -> Result<ServerHandle> {
    let name = format!("User {}", user.user_id());
    serve(addr, &name, user, handle_user).await
}

// Response helpers

pub(crate) fn status_for(err: &OnionError) -> StatusCode {
    match err {
        OnionError::RegistrationConflict(_) => StatusCode::CONFLICT,
        OnionError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        OnionError::DecryptionFailure(_)
        | OnionError::BadRequest(_)
        | OnionError::InvalidKey(_)
        | OnionError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        OnionError::InsufficientNodes { .. } => StatusCode::SERVICE_UNAVAILABLE,
        OnionError::ForwardingFailure { .. } | OnionError::RegistryUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        OnionError::Remote { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        OnionError::EncryptionFailure
        | OnionError::InvalidCircuitLength(_)
        | OnionError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn text_response(status: StatusCode, text: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(text.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(json) => {
            let mut response = Response::new(Body::from(json));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn error_response(err: &OnionError) -> Response<Body> {
    json_response(status_for(err), &ErrorBody::from(err))
}

fn not_found(path: &str) -> Response<Body> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorBody {
            error: format!("No route for {}", path),
            reason: "not_found".to_string(),
        },
    )
}

fn ok_result<T: Serialize>(result: Option<T>) -> Response<Body> {
    json_response(StatusCode::OK, &ResultBody { result })
}

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T> {
    let bytes: Bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| OnionError::BadRequest(format!("unreadable body: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| OnionError::BadRequest(e.to_string()))
}

fn finish(result: Result<Response<Body>>) -> Response<Body> {
    result.unwrap_or_else(|e| error_response(&e))
}

// Registry routes

async fn handle_registry(req: Request<Body>, registry: Arc<Registry>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let response = match (req.method(), path.as_str()) {
        (&Method::GET, PATH_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, PATH_REGISTER_NODE) => handle_register_node(req, &registry).await,
        (&Method::GET, PATH_NODE_REGISTRY) => Ok(json_response(
            StatusCode::OK,
            &NodeRegistryBody {
                nodes: registry.node_registry(),
            },
        )),
        (&Method::GET, p) if p.starts_with(PATH_PRIVATE_KEY) => {
            handle_private_key(&p[PATH_PRIVATE_KEY.len()..], &registry)
        }
        _ => return not_found(&path),
    };
    finish(response)
}

async fn handle_register_node(req: Request<Body>, registry: &Registry) -> Result<Response<Body>> {
    let body: RegisterNodeBody = read_json(req).await?;
    let public_key = PublicKey::decode(&body.public_key)?;
    let private_key = body
        .private_key
        .as_deref()
        .map(PrivateKey::decode)
        .transpose()?;

    let entry = registry.register_node(body.node_id, public_key, private_key)?;
    Ok(json_response(StatusCode::OK, &entry))
}

fn handle_private_key(raw_id: &str, registry: &Registry) -> Result<Response<Body>> {
    let node_id: NodeId = raw_id
        .parse()
        .map_err(|_| OnionError::BadRequest(format!("invalid node id {:?}", raw_id)))?;
    let private_key = registry.private_key(node_id)?;
    Ok(json_response(
        StatusCode::OK,
        &PrivateKeyBody {
            node_id,
            private_key: private_key.encode(),
        },
    ))
}

// Router routes

async fn handle_router(req: Request<Body>, router: Arc<Router>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let response = match (req.method(), path.as_str()) {
        (&Method::GET, PATH_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, PATH_MESSAGE) => handle_relay(req, &router).await,
        (&Method::GET, PATH_LAST_ENCRYPTED) => Ok(ok_result(router.last_received_frame())),
        (&Method::GET, PATH_LAST_DECRYPTED) => Ok(ok_result(router.last_decrypted_payload())),
        (&Method::GET, PATH_LAST_DESTINATION) => {
            Ok(ok_result(router.last_destination().map(|hop| hop.port())))
        }
        _ => return not_found(&path),
    };
    finish(response)
}

async fn handle_relay(req: Request<Body>, router: &Router) -> Result<Response<Body>> {
    let body: MessageBody = read_json(req).await?;
    // Accepted once peeled; the forward finishes in the background
    let pending = router.relay(&body.message).await?;
    debug!("Router {} accepted frame for {}", router.node_id(), pending.next_hop());
    Ok(text_response(StatusCode::OK, "success"))
}

// User routes

async fn handle_user(req: Request<Body>, user: Arc<User>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let response = match (req.method(), path.as_str()) {
        (&Method::GET, PATH_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, PATH_MESSAGE) => handle_deliver(req, &user).await,
        (&Method::POST, PATH_SEND_MESSAGE) => handle_send(req, &user).await,
        (&Method::GET, PATH_LAST_RECEIVED) => Ok(ok_result(user.last_received_message())),
        (&Method::GET, PATH_LAST_SENT) => Ok(ok_result(user.last_sent_message())),
        (&Method::GET, PATH_LAST_CIRCUIT) => Ok(ok_result(user.last_circuit())),
        _ => return not_found(&path),
    };
    finish(response)
}

async fn handle_deliver(req: Request<Body>, user: &User) -> Result<Response<Body>> {
    let body: MessageBody = read_json(req).await?;
    user.receive_message(&body.message);
    Ok(text_response(StatusCode::OK, "success"))
}

async fn handle_send(req: Request<Body>, user: &User) -> Result<Response<Body>> {
    let body: SendMessageBody = read_json(req).await?;
    let circuit = user
        .send_message(&body.message, body.destination_user_id)
        .await?;
    Ok(ok_result(Some(circuit.node_ids())))
}
