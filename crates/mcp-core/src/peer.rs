//! The peer engine (§4.2): a symmetric state machine hosting an outbound
//! request pending table and an inbound handler registry, shared by both
//! the client and server roles. Role differences reduce to which handlers
//! and which handshake logic are installed (§9).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, error, warn};

use lucentmcp_protocol::capabilities::{CapabilityGate, ClientCapabilities, ServerCapabilities};
use lucentmcp_protocol::jsonrpc::{self, Decoded, Message, Notification, Request, Response, Shape};
use lucentmcp_protocol::methods::wire;
use lucentmcp_protocol::{Error, ProgressToken, RequestId, RequestIdGenerator, Result, Value};
use lucentmcp_transport::Transport;

use crate::context::RequestContext;
use crate::handler::{NotificationHandler, RequestHandler};

/// Which side of the handshake this peer plays. Determines which
/// capability set is "local" (what we advertise) vs. "remote" (what gates
/// our outbound calls) in §4.2's capability gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Capability-checking and handshake-enforcement mode (§4.2, §9 open
/// question). `Strict` performs every local pre-flight check before
/// touching the wire; `Default` is passthrough — calls are attempted and
/// fail with whatever error the wire naturally produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    Strict,
    Default,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub role: Role,
    pub mode: HandshakeMode,
    pub default_timeout: Option<Duration>,
}

impl PeerConfig {
    pub fn new(role: Role) -> Self {
        Self { role, mode: HandshakeMode::Default, default_timeout: None }
    }

    pub fn strict(mut self) -> Self {
        self.mode = HandshakeMode::Strict;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

/// Negotiated capabilities, populated once `initialize` completes. Which
/// field is "local" vs. "remote" depends on [`Role`].
#[derive(Debug, Clone, Default)]
struct Negotiated {
    client_capabilities: Option<ClientCapabilities>,
    server_capabilities: Option<ServerCapabilities>,
    protocol_version: Option<String>,
    initialized: bool,
}

struct PendingEntry {
    sender: oneshot::Sender<Result<Value>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: PeerConfig,
    id_gen: RequestIdGenerator,
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    request_handlers: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
    notification_handlers: RwLock<HashMap<String, Vec<Arc<dyn NotificationHandler>>>>,
    /// Cancellation flags for requests currently being handled *inbound*,
    /// keyed by the remote's request id, so an inbound
    /// `notifications/cancelled` can find and flip the right flag.
    inbound_cancellations: Mutex<HashMap<RequestId, Arc<AtomicBool>>>,
    negotiated: RwLock<Negotiated>,
}

/// A handle to the peer engine. Cheap to clone (one `Arc` bump); the client
/// and server facades in `lucentmcp-core` wrap this with role-specific
/// construction and a handshake routine.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<Inner>,
}

/// Internal alias used by [`RequestContext`] — a `Peer` already is a cheap
/// handle, so the "weak back reference" from §9's cyclic-reference note is
/// just another clone of the same `Arc`.
pub(crate) type PeerHandle = Peer;

impl Peer {
    pub fn new(transport: Arc<dyn Transport>, config: PeerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                id_gen: RequestIdGenerator::new(),
                pending: Mutex::new(HashMap::new()),
                request_handlers: RwLock::new(HashMap::new()),
                notification_handlers: RwLock::new(HashMap::new()),
                inbound_cancellations: Mutex::new(HashMap::new()),
                negotiated: RwLock::new(Negotiated::default()),
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.config.role
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.negotiated.read().await.initialized
    }

    pub async fn negotiated_protocol_version(&self) -> Option<String> {
        self.inner.negotiated.read().await.protocol_version.clone()
    }

    /// Record the outcome of a successful handshake. Called by the
    /// client/server facades once `initialize` (and, for the server,
    /// `notifications/initialized`) has completed.
    pub(crate) async fn mark_initialized(
        &self,
        client_capabilities: ClientCapabilities,
        server_capabilities: ServerCapabilities,
        protocol_version: String,
    ) {
        let mut n = self.inner.negotiated.write().await;
        n.client_capabilities = Some(client_capabilities);
        n.server_capabilities = Some(server_capabilities);
        n.protocol_version = Some(protocol_version);
        n.initialized = true;
    }

    /// §4.2: "register_request_handler ... must be installed before
    /// connect/start." Re-registering the same method name replaces the
    /// prior handler.
    pub async fn register_request_handler(&self, method: impl Into<String>, handler: impl RequestHandler) {
        self.inner.request_handlers.write().await.insert(method.into(), Arc::new(handler));
    }

    /// §4.2: multiple handlers per method are permitted and run in
    /// registration order.
    pub async fn register_notification_handler(
        &self,
        method: impl Into<String>,
        handler: impl NotificationHandler,
    ) {
        self.inner
            .notification_handlers
            .write()
            .await
            .entry(method.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// §4.2: `send_request`. Assigns a fresh id, records a pending waiter,
    /// writes to the transport, and awaits the matching response or
    /// timeout. In strict mode, checks the handshake/capability
    /// preconditions before touching the wire (§8: capability gating "fails
    /// locally without network I/O").
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.send_request_with(method, params, None, timeout).await
    }

    /// Like [`Peer::send_request`], but attaches a `progressToken` to `_meta`
    /// so the callee's [`RequestContext::report_progress`] has somewhere to
    /// send updates (§4.2).
    pub async fn send_request_with_progress(
        &self,
        method: &str,
        params: Option<Value>,
        progress_token: ProgressToken,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.send_request_with(method, params, Some(progress_token), timeout).await
    }

    async fn send_request_with(
        &self,
        method: &str,
        params: Option<Value>,
        progress_token: Option<ProgressToken>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.check_outbound_preconditions(method).await?;

        let id = self.inner.id_gen.next();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id.clone(), PendingEntry { sender: tx });

        let mut request = Request::new(id.clone(), method, params);
        if let Some(token) = progress_token {
            request.meta = Some(lucentmcp_protocol::jsonrpc::Meta { progress_token: Some(token), extra: Default::default() });
        }
        let bytes = jsonrpc::encode(&request)?;
        if let Err(e) = self.inner.transport.send(bytes).await {
            self.inner.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        let effective_timeout = timeout.or(self.inner.config.default_timeout);
        match effective_timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(Error::ConnectionClosed(format!("peer closed while awaiting {id}"))),
                Err(_) => {
                    // Timeout behaves like a local cancel plus a distinct
                    // waiter resolution (§5).
                    self.inner.pending.lock().await.remove(&id);
                    self.send_notification(wire::NOTIFICATIONS_CANCELLED, Some(cancel_params(&id))).await?;
                    Err(Error::RequestTimeout(duration))
                }
            },
            None => match rx.await {
                Ok(result) => result,
                Err(_) => Err(Error::ConnectionClosed(format!("peer closed while awaiting {id}"))),
            },
        }
    }

    /// §4.2: `send_notification` — fire-and-forget write, no id assigned.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let note = Notification::new(method, params);
        let bytes = jsonrpc::encode(&note)?;
        self.inner.transport.send(bytes).await.map_err(Into::into)
    }

    /// §4.2/§5: `cancel(request_id)` is idempotent. Marks the pending entry
    /// cancelled, resolves the waiter with `requestCancelled`, and emits
    /// exactly one `notifications/cancelled`.
    pub async fn cancel(&self, id: RequestId) -> Result<()> {
        let entry = self.inner.pending.lock().await.remove(&id);
        let Some(entry) = entry else {
            return Ok(()); // already resolved/cancelled — no-op
        };
        let _ = entry.sender.send(Err(Error::RequestCancelled(id.to_string())));
        self.send_notification(wire::NOTIFICATIONS_CANCELLED, Some(cancel_params(&id))).await
    }

    pub(crate) async fn emit_progress(&self, token: ProgressToken, progress: f64, total: Option<f64>, message: Option<String>) {
        let mut params = serde_json::Map::new();
        params.insert("progressToken".into(), serde_json::to_value(&token).unwrap());
        params.insert("progress".into(), serde_json::json!(progress));
        if let Some(total) = total {
            params.insert("total".into(), serde_json::json!(total));
        }
        if let Some(message) = message {
            params.insert("message".into(), serde_json::json!(message));
        }
        let value = Value::from(serde_json::Value::Object(params));
        if let Err(e) = self.send_notification(wire::NOTIFICATIONS_PROGRESS, Some(value)).await {
            warn!(error = %e, "failed to emit progress notification");
        }
    }

    async fn check_outbound_preconditions(&self, method: &str) -> Result<()> {
        if self.inner.config.mode != HandshakeMode::Strict {
            return Ok(());
        }
        let n = self.inner.negotiated.read().await;
        if method != wire::INITIALIZE && !n.initialized {
            return Err(Error::InvalidRequest(format!(
                "`{method}` called before initialize completed (strict mode)"
            )));
        }
        let gate = CapabilityGate::for_method(method);
        if gate == CapabilityGate::None {
            return Ok(());
        }
        let client = n.client_capabilities.clone().unwrap_or_default();
        let server = n.server_capabilities.clone().unwrap_or_default();
        if gate.satisfied(&client, &server) {
            Ok(())
        } else {
            Err(Error::InvalidRequest(format!("`{method}` requires an unadvertised capability")))
        }
    }

    /// Feed one inbound transport message through dispatch (§4.2 inbound
    /// dispatch, steps 1–4). Intended to be driven by a single reader task
    /// per connected transport (§5, §9: "a task pumps transport.receive()
    /// into engine.dispatch()").
    pub async fn dispatch(&self, bytes: &[u8]) {
        match jsonrpc::decode(bytes) {
            Decoded::Message(msg) => self.dispatch_message(msg).await,
            Decoded::ParseError { error, shape } => self.handle_parse_error(error, shape).await,
        }
    }

    async fn handle_parse_error(&self, error: Error, shape: Shape) {
        match shape {
            Shape::ResponseLike => {
                warn!(%error, "dropping malformed response-shaped message");
            }
            Shape::RequestLike(Some(id)) => {
                warn!(%error, "replying -32700 to malformed request");
                let _ = self.reply(id, Err(Error::ParseError(error.to_string()))).await;
            }
            Shape::RequestLike(None) | Shape::Unknown => {
                warn!(%error, "dropping unparseable message");
            }
        }
    }

    async fn dispatch_message(&self, msg: Message) {
        match msg {
            Message::Response(resp) => self.dispatch_response(resp).await,
            Message::Request(req) => self.dispatch_request(req).await,
            Message::Notification(note) => self.dispatch_notification(note).await,
            Message::Batch(items) => {
                for item in items {
                    Box::pin(self.dispatch_message(item)).await;
                }
            }
        }
    }

    async fn dispatch_response(&self, resp: Response) {
        let id = resp.id.clone();
        let entry = self.inner.pending.lock().await.remove(&id);
        let Some(entry) = entry else {
            warn!(%id, "dropping response with no matching pending request");
            return;
        };
        let result = resp.into_result();
        let _ = entry.sender.send(result);
    }

    /// Runs the matched handler on its own task so a slow or long-running
    /// handler never blocks the reader loop from dispatching the next
    /// inbound message — in particular the `notifications/cancelled` that
    /// would otherwise never reach this same request's cancellation flag
    /// (§5: "the reader loop dispatches, handlers run concurrently").
    async fn dispatch_request(&self, req: Request) {
        if req.method == wire::PING {
            let _ = self.reply(req.id, Ok(Value::from(serde_json::json!({})))).await;
            return;
        }

        let handler = self.inner.request_handlers.read().await.get(&req.method).cloned();
        let Some(handler) = handler else {
            let _ = self.reply(req.id, Err(Error::MethodNotFound(req.method.clone()))).await;
            return;
        };

        if let Err(e) = self.check_inbound_gate(&req.method).await {
            let _ = self.reply(req.id, Err(e)).await;
            return;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner.inbound_cancellations.lock().await.insert(req.id.clone(), cancelled.clone());

        let progress_token = req.meta.as_ref().and_then(|m| m.progress_token.clone());
        let cx = RequestContext {
            request_id: req.id.clone(),
            cancelled: cancelled.clone(),
            progress_token,
            peer: self.clone(),
        };

        let peer = self.clone();
        let id = req.id.clone();
        let method = req.method.clone();
        tokio::spawn(async move {
            let outcome = std::panic::AssertUnwindSafe(handler.call(req.params, cx)).catch_unwind().await;

            peer.inner.inbound_cancellations.lock().await.remove(&id);

            // A cancelled handler emits no response at all (§5: "no response is
            // emitted (per JSON-RPC cancellation semantics in MCP)").
            if cancelled.load(Ordering::Acquire) {
                return;
            }

            match outcome {
                Ok(Ok(result)) => {
                    let _ = peer.reply(id, Ok(result)).await;
                }
                Ok(Err(e)) => {
                    let _ = peer.reply(id, Err(e)).await;
                }
                Err(panic) => {
                    error!(?panic, method = %method, "request handler panicked");
                    let _ = peer.reply(id, Err(Error::internal("handler panicked"))).await;
                }
            }
        });
    }

    async fn check_inbound_gate(&self, method: &str) -> Result<()> {
        let gate = CapabilityGate::for_method(method);
        if gate == CapabilityGate::None {
            return Ok(());
        }
        let n = self.inner.negotiated.read().await;
        let client = n.client_capabilities.clone().unwrap_or_default();
        let server = n.server_capabilities.clone().unwrap_or_default();
        if gate.satisfied(&client, &server) {
            Ok(())
        } else {
            Err(Error::MethodNotFound(format!("`{method}` targets an unadvertised local capability")))
        }
    }

    async fn dispatch_notification(&self, note: Notification) {
        match note.method.as_str() {
            wire::NOTIFICATIONS_CANCELLED => {
                self.handle_inbound_cancellation(note.params).await;
                return;
            }
            wire::NOTIFICATIONS_PROGRESS => {
                // Progress is consumed internally; a full progress-subscriber
                // registry for outbound long-running calls belongs to the
                // caller that owns the token. This engine still routes the
                // event so any registered handler (e.g. a UI layer) observes it.
            }
            _ => {}
        }

        let handlers = self.inner.notification_handlers.read().await.get(&note.method).cloned();
        let Some(handlers) = handlers else {
            debug!(method = %note.method, "no handler registered for notification");
            return;
        };
        for handler in handlers {
            std::panic::AssertUnwindSafe(handler.call(note.params.clone()))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    error!(?panic, method = %note.method, "notification handler panicked");
                });
        }
    }

    async fn handle_inbound_cancellation(&self, params: Option<Value>) {
        let Some(id) = params
            .as_ref()
            .and_then(|p| p.as_object())
            .and_then(|m| m.get("requestId"))
            .and_then(|v| serde_json::from_value::<RequestId>(v.clone().into()).ok())
        else {
            warn!("notifications/cancelled missing requestId");
            return;
        };
        if let Some(flag) = self.inner.inbound_cancellations.lock().await.get(&id) {
            flag.store(true, Ordering::Release);
        }
    }

    async fn reply(&self, id: RequestId, outcome: Result<Value>) -> Result<()> {
        let response = match outcome {
            Ok(result) => Response::success(id, result),
            Err(e) => Response::error(id, e.to_wire()),
        };
        let bytes = jsonrpc::encode(&response)?;
        self.inner.transport.send(bytes).await.map_err(Into::into)
    }
}

fn cancel_params(id: &RequestId) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("requestId".into(), serde_json::to_value(id).unwrap());
    Value::from(serde_json::Value::Object(map))
}
