//! HTTP server transport (§4.6): a framework-agnostic `HTTPRequest` /
//! `HTTPResponse` pair plus the routing and request-capture logic that sits
//! between them and a per-session [`Peer`]. An `axum` adapter is provided
//! separately in [`crate::axum_adapter`] so embedding frameworks other than
//! axum can drive the same [`handle_post`]/[`handle_get`]/[`handle_delete`]
//! functions directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::warn;

use lucentmcp_core::Peer;
use lucentmcp_protocol::jsonrpc::{self, Decoded, Message};
use lucentmcp_protocol::RequestId;
use lucentmcp_transport::{InboundItem, Transport, TransportResult};

use crate::session::{generate_session_id, SessionManager};

pub type HttpSessionManager = SessionManager<HttpSessionTransport>;

pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// Framework-agnostic inbound request (§4.6). Header lookups are
/// case-insensitive per §6; callers should lower-case keys when building one.
#[derive(Debug, Clone)]
pub struct HTTPRequest {
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HTTPRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Framework-agnostic outbound response. `stream` carries SSE event bytes
/// (already framed as `event:`/`data:`/`id:` text) when the route opens a
/// streaming body instead of returning `body` directly.
pub struct HTTPResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub stream: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl HTTPResponse {
    fn json(status: u16, body: Vec<u8>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".into(), "application/json".into());
        Self { status, headers, body: Some(body), stream: None }
    }

    fn empty(status: u16) -> Self {
        Self { status, headers: BTreeMap::new(), body: None, stream: None }
    }

    fn with_session_header(mut self, session_id: &str) -> Self {
        self.headers.insert(MCP_SESSION_ID_HEADER.into(), session_id.to_string());
        self
    }
}

/// DNS-rebinding protection policy (§4.6).
#[derive(Clone)]
pub enum DnsRebindingProtection {
    /// Enforce `Host`/`Origin` checks only when `bind_host` is loopback.
    Automatic { bind_host: String },
    Custom { allowed_hosts: Vec<String>, allowed_origins: Vec<String> },
    None,
}

impl DnsRebindingProtection {
    fn validate(&self, req: &HTTPRequest) -> bool {
        match self {
            DnsRebindingProtection::None => true,
            DnsRebindingProtection::Automatic { bind_host } => {
                let is_loopback = matches!(bind_host.as_str(), "localhost" | "127.0.0.1" | "::1");
                if !is_loopback {
                    return true;
                }
                let host_ok = req.header("host").map(|h| host_matches(h, &[bind_host.clone()])).unwrap_or(false);
                let origin_ok = req.header("origin").map(|_| true).unwrap_or(true);
                host_ok && origin_ok
            }
            DnsRebindingProtection::Custom { allowed_hosts, allowed_origins } => {
                let host_ok = req.header("host").map(|h| host_matches(h, allowed_hosts)).unwrap_or(false);
                let origin_ok = match req.header("origin") {
                    Some(o) => allowed_origins.iter().any(|a| a == o),
                    None => true,
                };
                host_ok && origin_ok
            }
        }
    }
}

fn host_matches(host: &str, allowed: &[String]) -> bool {
    let bare = host.split(':').next().unwrap_or(host);
    allowed.iter().any(|a| a == host || a == bare)
}

/// §6: HTTP server transport configuration.
#[derive(Clone)]
pub struct ServerTransportConfig {
    pub endpoint_path: String,
    pub session_id_generator: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    pub on_session_initialized: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_session_closed: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub dns_rebinding_protection: DnsRebindingProtection,
    pub max_sessions: usize,
    pub max_body_bytes: usize,
    /// §4.6/§10.3: no `sessionIdGenerator`, each POST processed
    /// independently with no session headers emitted or required, and
    /// `GET` unsupported (400).
    pub stateless: bool,
}

impl Default for ServerTransportConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/mcp".to_string(),
            session_id_generator: None,
            on_session_initialized: None,
            on_session_closed: None,
            dns_rebinding_protection: DnsRebindingProtection::Automatic { bind_host: "127.0.0.1".into() },
            max_sessions: 10_000,
            max_body_bytes: 4 * 1024 * 1024,
            stateless: false,
        }
    }
}

impl ServerTransportConfig {
    fn new_session_id(&self) -> String {
        match &self.session_id_generator {
            Some(f) => f(),
            None => generate_session_id(),
        }
    }
}

/// Installs the same request/notification handlers on every freshly created
/// per-session [`Peer`]. A real server builds this once from its tool/
/// resource/prompt registries and shares it across all sessions.
pub type HandlerInstaller = Arc<dyn Fn(Peer) -> BoxFuture<'static, ()> + Send + Sync>;

/// The per-session [`Transport`] implementation: inbound POST bodies feed the
/// dispatch loop; outbound writes are routed either to the POST that is
/// waiting on a matching response id ("request capture", §4.6) or to the
/// live SSE `GET` stream, if any.
pub struct HttpSessionTransport {
    session_id: String,
    inbound_tx: mpsc::UnboundedSender<InboundItem>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<InboundItem>>,
    sse_tx: RwLock<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    pending_replies: Mutex<HashMap<RequestId, oneshot::Sender<Vec<u8>>>>,
    closed: AtomicBool,
}

impl HttpSessionTransport {
    fn new(session_id: String) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            session_id,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            sse_tx: RwLock::new(None),
            pending_replies: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn register_pending_reply(&self, id: RequestId) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.pending_replies.lock().await.insert(id, tx);
        rx
    }

    fn deliver_inbound(&self, bytes: Vec<u8>) {
        let _ = self.inbound_tx.send(InboundItem::Message(bytes));
    }

    /// §4.6: "At most one in-flight GET-SSE stream per HTTP session; a new
    /// GET replaces the prior." Dropping the old sender ends that stream.
    async fn attach_sse(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sse_tx.write().await = Some(tx);
        rx
    }

    async fn detach_sse(&self) {
        *self.sse_tx.write().await = None;
    }
}

#[async_trait]
impl Transport for HttpSessionTransport {
    async fn connect(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        if let Decoded::Message(Message::Response(resp)) = jsonrpc::decode(&bytes) {
            if let Some(tx) = self.pending_replies.lock().await.remove(&resp.id) {
                let _ = tx.send(bytes);
                return Ok(());
            }
        }
        // Not a captured POST reply (a server-initiated request/notification,
        // or a response whose POST already timed out): route to the SSE
        // stream if one is attached, otherwise there is nowhere to deliver it.
        let sse = self.sse_tx.read().await;
        match sse.as_ref() {
            Some(tx) => {
                let _ = tx.send(bytes);
                Ok(())
            }
            None => {
                warn!(session = %self.session_id, "dropping outbound message with no SSE stream and no waiting POST");
                Ok(())
            }
        }
    }

    async fn receive(&self) -> InboundItem {
        if self.closed.load(Ordering::Acquire) {
            return InboundItem::Closed;
        }
        self.inbound_rx.lock().await.recv().await.unwrap_or(InboundItem::Closed)
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::Release);
        self.detach_sse().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http-server-session"
    }
}

fn request_ids_awaiting_reply(msg: &Message, out: &mut Vec<RequestId>) {
    match msg {
        Message::Request(r) => out.push(r.id.clone()),
        Message::Batch(items) => items.iter().for_each(|m| request_ids_awaiting_reply(m, out)),
        Message::Notification(_) | Message::Response(_) => {}
    }
}

/// `POST /mcp` (§4.6). Returns a single `200 application/json` body once all
/// of this POST's requests have replied. Pure-notification bodies return
/// `202` immediately since there is nothing to await.
pub async fn handle_post(
    manager: &HttpSessionManager,
    config: &ServerTransportConfig,
    installer: &HandlerInstaller,
    req: &HTTPRequest,
) -> HTTPResponse {
    if !config.dns_rebinding_protection.validate(req) {
        return HTTPResponse::empty(403);
    }
    if req.body.len() > config.max_body_bytes {
        return HTTPResponse::empty(413);
    }

    if config.stateless {
        return handle_post_stateless(installer, req).await;
    }

    let session_header = req.header(MCP_SESSION_ID_HEADER).map(str::to_string);
    let decoded = jsonrpc::decode(&req.body);
    let is_initialize = body_is_initialize(&req.body);

    let (session, is_new) = match session_header {
        None if is_initialize => {
            if !manager.can_add_session().await {
                return HTTPResponse::empty(503);
            }
            let id = config.new_session_id();
            let transport = HttpSessionTransport::new(id.clone());
            let peer = Peer::new(transport.clone(), lucentmcp_core::PeerConfig::new(lucentmcp_core::Role::Server));
            installer(peer.clone()).await;
            lucentmcp_core::spawn_dispatch_loop(transport.clone(), peer);
            manager.store(id.clone(), transport.clone()).await;
            if let Some(hook) = &config.on_session_initialized {
                hook(&id);
            }
            (transport, true)
        }
        None => return HTTPResponse::empty(400),
        Some(id) => match manager.transport(&id).await {
            Some(t) => (t, false),
            None => return HTTPResponse::empty(404),
        },
    };

    let message = match decoded {
        Decoded::Message(msg) => msg,
        Decoded::ParseError { .. } => {
            return HTTPResponse::json(400, br#"{"error":"parse error"}"#.to_vec());
        }
    };

    let mut awaited_ids = Vec::new();
    request_ids_awaiting_reply(&message, &mut awaited_ids);

    if awaited_ids.is_empty() {
        session.deliver_inbound(req.body.clone());
        return maybe_with_session(HTTPResponse::empty(202), is_new, &session.session_id);
    }

    let mut receivers = Vec::with_capacity(awaited_ids.len());
    for id in &awaited_ids {
        receivers.push(session.register_pending_reply(id.clone()).await);
    }
    session.deliver_inbound(req.body.clone());

    let mut bodies = Vec::with_capacity(receivers.len());
    for rx in receivers {
        match rx.await {
            Ok(bytes) => bodies.push(bytes),
            Err(_) => continue,
        }
    }

    maybe_with_session(HTTPResponse::json(200, combine_reply_bodies(bodies)), is_new, &session.session_id)
}

fn maybe_with_session(resp: HTTPResponse, is_new: bool, session_id: &str) -> HTTPResponse {
    if is_new {
        resp.with_session_header(session_id)
    } else {
        resp
    }
}

fn combine_reply_bodies(bodies: Vec<Vec<u8>>) -> Vec<u8> {
    if bodies.len() == 1 {
        bodies.into_iter().next().unwrap()
    } else {
        let values: Vec<serde_json::Value> = bodies.iter().filter_map(|b| serde_json::from_slice(b).ok()).collect();
        serde_json::to_vec(&values).unwrap_or_default()
    }
}

/// §4.6/§10.3 stateless mode: no session is created, stored, or required —
/// each POST gets its own short-lived transport/peer pair that is discarded
/// once this request's replies are collected, and no `Mcp-Session-Id`
/// header is read or emitted.
async fn handle_post_stateless(installer: &HandlerInstaller, req: &HTTPRequest) -> HTTPResponse {
    let message = match jsonrpc::decode(&req.body) {
        Decoded::Message(msg) => msg,
        Decoded::ParseError { .. } => {
            return HTTPResponse::json(400, br#"{"error":"parse error"}"#.to_vec());
        }
    };

    let mut awaited_ids = Vec::new();
    request_ids_awaiting_reply(&message, &mut awaited_ids);

    let transport = HttpSessionTransport::new(String::new());
    let peer = Peer::new(transport.clone(), lucentmcp_core::PeerConfig::new(lucentmcp_core::Role::Server));
    installer(peer.clone()).await;
    lucentmcp_core::spawn_dispatch_loop(transport.clone(), peer);

    if awaited_ids.is_empty() {
        transport.deliver_inbound(req.body.clone());
        return HTTPResponse::empty(202);
    }

    let mut receivers = Vec::with_capacity(awaited_ids.len());
    for id in &awaited_ids {
        receivers.push(transport.register_pending_reply(id.clone()).await);
    }
    transport.deliver_inbound(req.body.clone());

    let mut bodies = Vec::with_capacity(receivers.len());
    for rx in receivers {
        if let Ok(bytes) = rx.await {
            bodies.push(bytes);
        }
    }

    HTTPResponse::json(200, combine_reply_bodies(bodies))
}

fn body_is_initialize(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("method").and_then(|m| m.as_str()).map(|s| s == "initialize"))
        .unwrap_or(false)
}

/// `GET /mcp` (§4.6): opens the server-to-client SSE stream for a session.
/// Unsupported in stateless mode (§4.6/§10.3), where there is no session to
/// stream to.
pub async fn handle_get(manager: &HttpSessionManager, config: &ServerTransportConfig, req: &HTTPRequest) -> HTTPResponse {
    if config.stateless {
        return HTTPResponse::empty(400);
    }
    let Some(session_id) = req.header(MCP_SESSION_ID_HEADER) else {
        return HTTPResponse::empty(400);
    };
    let Some(session) = manager.transport(session_id).await else {
        return HTTPResponse::empty(404);
    };
    let rx = session.attach_sse().await;
    let mut headers = BTreeMap::new();
    headers.insert("content-type".into(), "text/event-stream".into());
    HTTPResponse { status: 200, headers, body: None, stream: Some(rx) }
}

/// `DELETE /mcp` (§4.6): terminates the session and runs `on_session_closed`.
pub async fn handle_delete(manager: &HttpSessionManager, config: &ServerTransportConfig, req: &HTTPRequest) -> HTTPResponse {
    let Some(session_id) = req.header(MCP_SESSION_ID_HEADER) else {
        return HTTPResponse::empty(400);
    };
    if let Some(transport) = manager.remove(session_id).await {
        let _ = transport.disconnect().await;
        if let Some(hook) = &config.on_session_closed {
            hook(session_id);
        }
    }
    HTTPResponse::empty(204)
}
