//! HTTP client transport (§4.5): translates the peer engine's byte-level
//! `send`/`receive` to HTTP. Session/header lifecycle follows the streamable
//! HTTP client pattern; SSE parsing uses
//! `response.bytes_stream().eventsource()` rather than hand-rolled buffer
//! scanning.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, StatusCode};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};
use url::Url;

use lucentmcp_transport::{InboundItem, Transport, TransportError, TransportResult};

pub const MCP_SESSION_ID_HEADER: &str = "Mcp-Session-Id";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

fn header_name(name: &str) -> HeaderName {
    HeaderName::from_bytes(name.as_bytes()).expect("static header names are valid")
}

/// Configuration for [`HttpClientTransport`] (§10.3).
#[derive(Clone)]
pub struct HttpClientConfig {
    pub endpoint: Url,
    /// Overrides the session id this transport presents, skipping capture
    /// from the first response — used to resume a previously issued session.
    pub session_id: Option<String>,
    /// Whether to open the long-lived `GET` SSE channel for server-initiated
    /// traffic once a session id is known (§4.5).
    pub open_sse_stream: bool,
    pub protocol_version: String,
    pub request_timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            session_id: None,
            open_sse_stream: true,
            protocol_version: lucentmcp_protocol::methods::DEFAULT_PROTOCOL_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The per-connection client-side [`Transport`]. Outbound bytes are POSTed;
/// inbound bytes (POST responses, and anything the background SSE reader
/// picks up) are funneled through a single channel so `receive()` stays a
/// plain pull, matching the other transports in this crate family.
pub struct HttpClientTransport {
    config: HttpClientConfig,
    http: HttpClient,
    session_id: RwLock<Option<String>>,
    last_event_id: RwLock<Option<String>>,
    inbound_tx: mpsc::UnboundedSender<InboundItem>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<InboundItem>>,
    sse_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Lets `&self` methods (like `send`) spawn the background SSE reader,
    /// which needs an owned `Arc<Self>`, without requiring every caller to
    /// route through an `Arc`-taking entry point.
    weak_self: Weak<Self>,
}

impl HttpClientTransport {
    pub fn new(config: HttpClientConfig) -> Arc<Self> {
        let http = HttpClient::builder().timeout(config.request_timeout).build().expect("reqwest client builds");
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let session_id = config.session_id.clone();
        Arc::new_cyclic(|weak_self| Self {
            config,
            http,
            session_id: RwLock::new(session_id),
            last_event_id: RwLock::new(None),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            sse_task: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn build_headers(&self, accept: &str) -> TransportResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_str(accept).map_err(|e| TransportError::SendFailed(e.to_string()))?);
        if let Some(session_id) = self.session_id.read().await.as_ref() {
            headers.insert(
                header_name(MCP_SESSION_ID_HEADER),
                HeaderValue::from_str(session_id).map_err(|e| TransportError::SendFailed(e.to_string()))?,
            );
            headers.insert(
                header_name(MCP_PROTOCOL_VERSION_HEADER),
                HeaderValue::from_str(&self.config.protocol_version).map_err(|e| TransportError::SendFailed(e.to_string()))?,
            );
        }
        if let Some(last_id) = self.last_event_id.read().await.as_ref() {
            headers.insert(
                header_name(LAST_EVENT_ID_HEADER),
                HeaderValue::from_str(last_id).map_err(|e| TransportError::SendFailed(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    /// Captures `Mcp-Session-Id` from a response if this is the first time
    /// we've seen one, then opens the background SSE `GET` stream (§4.5:
    /// "the GET stream ... is deferred until that signal fires").
    async fn adopt_session_if_new(&self, session_id: &str) {
        {
            let mut current = self.session_id.write().await;
            if current.is_some() {
                return;
            }
            *current = Some(session_id.to_string());
        }
        if self.config.open_sse_stream {
            if let Some(arc_self) = self.weak_self.upgrade() {
                arc_self.spawn_sse_reader();
            }
        }
    }

    fn spawn_sse_reader(self: Arc<Self>) {
        let task_self = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_self.run_sse_reader().await {
                warn!(error = %e, "SSE reader stream ended");
            }
        });
        // No prior task should exist for a freshly adopted session, but guard
        // against re-entrancy anyway.
        if let Ok(mut slot) = self.sse_task.try_lock() {
            *slot = Some(handle);
        }
    }

    async fn run_sse_reader(self: Arc<Self>) -> TransportResult<()> {
        let headers = self.build_headers("text/event-stream").await?;
        let response = self
            .http
            .get(self.config.endpoint.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            // §4.5: "On 404 from that channel, the transport proactively
            // signals session expiration to listeners."
            let _ = self.inbound_tx.send(InboundItem::Error(TransportError::SessionExpired(
                "session expired (GET stream returned 404)".into(),
            )));
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(TransportError::ConnectionFailed(format!("SSE GET failed: {}", response.status())));
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if !event.id.is_empty() {
                        *self.last_event_id.write().await = Some(event.id.clone());
                    }
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if self.inbound_tx.send(InboundItem::Message(data.as_bytes().to_vec())).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    let _ = self.inbound_tx.send(InboundItem::Error(TransportError::ReceiveFailed(e.to_string())));
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpClientTransport {
    async fn connect(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        let headers = self.build_headers("application/json, text/event-stream").await?;
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .headers(headers)
            .header(CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            // §7/§8 scenario 4: a 404 on a POST against a session we'd
            // already adopted means the server has dropped it.
            let had_session = self.session_id.read().await.is_some();
            let detail = "session expired (POST returned 404)".to_string();
            return Err(if had_session { TransportError::SessionExpired(detail) } else { TransportError::SendFailed(detail) });
        }
        if !response.status().is_success() && response.status() != StatusCode::ACCEPTED {
            return Err(TransportError::SendFailed(format!("POST failed: {}", response.status())));
        }

        let session_header = response.headers().get(MCP_SESSION_ID_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
        if let Some(session_id) = &session_header {
            self.adopt_session_if_new(session_id).await;
        }

        if response.status() == StatusCode::ACCEPTED {
            debug!("POST accepted (notification, no body expected)");
            return Ok(());
        }

        let content_type = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();

        if content_type.contains("text/event-stream") {
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if !event.id.is_empty() {
                            *self.last_event_id.write().await = Some(event.id.clone());
                        }
                        let data = event.data.trim();
                        if data.is_empty() {
                            continue;
                        }
                        let _ = self.inbound_tx.send(InboundItem::Message(data.as_bytes().to_vec()));
                    }
                    Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
                }
            }
            Ok(())
        } else {
            let body = response.bytes().await.map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            let _ = self.inbound_tx.send(InboundItem::Message(body.to_vec()));
            Ok(())
        }
    }

    async fn receive(&self) -> InboundItem {
        self.inbound_rx.lock().await.recv().await.unwrap_or(InboundItem::Closed)
    }

    async fn disconnect(&self) -> TransportResult<()> {
        if let Some(task) = self.sse_task.lock().await.take() {
            task.abort();
        }
        if let Some(session_id) = self.session_id.read().await.as_ref() {
            let _ = self.http.delete(self.config.endpoint.clone()).header(MCP_SESSION_ID_HEADER, session_id.as_str()).send().await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http-client"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_open_the_sse_stream() {
        let config = HttpClientConfig::new(Url::parse("http://127.0.0.1:8080/mcp").unwrap());
        assert!(config.open_sse_stream);
        assert!(config.session_id.is_none());
    }
}
