//! Thin `axum` adapter translating `axum` requests into the
//! framework-agnostic [`HTTPRequest`]/[`HTTPResponse`] pair that
//! [`crate::server::handle_post`]/`handle_get`/`handle_delete` operate on.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::server::{handle_delete, handle_get, handle_post, HTTPRequest, HTTPResponse, HandlerInstaller, HttpMethod, HttpSessionManager, ServerTransportConfig};

/// Shared state for the router built by [`router`]. `manager` is an `Arc`
/// so callers can spawn [`crate::session::SessionManager::spawn_reaper`] on
/// the same instance the router serves from before wrapping it here.
pub struct AppState {
    pub manager: Arc<HttpSessionManager>,
    pub config: ServerTransportConfig,
    pub installer: HandlerInstaller,
}

/// Build an `axum::Router` exposing `POST|GET|DELETE {endpoint_path}`, all
/// backed by the same [`AppState`]. The caller owns binding/serving (e.g.
/// via `axum::serve`).
pub fn router(state: Arc<AppState>) -> Router {
    let path = state.config.endpoint_path.clone();
    Router::new().route(&path, get(get_handler).post(post_handler).delete(delete_handler)).with_state(state)
}

fn to_http_request(method: HttpMethod, headers: &HeaderMap, body: Bytes) -> HTTPRequest {
    let mut out = std::collections::BTreeMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            out.insert(name.as_str().to_ascii_lowercase(), v.to_string());
        }
    }
    HTTPRequest { method, headers: out, body: body.to_vec() }
}

fn from_http_response(resp: HTTPResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (k, v) in &resp.headers {
        builder = builder.header(k.as_str(), v.as_str());
    }
    match resp.stream {
        Some(rx) => {
            let stream = UnboundedReceiverStream::new(rx).map(|bytes| {
                Ok::<_, std::convert::Infallible>(format_sse_event(&bytes))
            });
            builder.body(Body::from_stream(stream)).unwrap()
        }
        None => builder.body(Body::from(resp.body.unwrap_or_default())).unwrap(),
    }
}

/// §6: "standard `event:`/`data:`/`id:` lines, blank-line terminated."
/// One event per JSON-RPC envelope (§9 open-question decision).
fn format_sse_event(payload: &[u8]) -> Bytes {
    let data = String::from_utf8_lossy(payload);
    Bytes::from(format!("event: message\ndata: {data}\n\n"))
}

async fn post_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let req = to_http_request(HttpMethod::Post, &headers, body);
    from_http_response(handle_post(&state.manager, &state.config, &state.installer, &req).await)
}

async fn get_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let req = to_http_request(HttpMethod::Get, &headers, Bytes::new());
    from_http_response(handle_get(&state.manager, &state.config, &req).await)
}

async fn delete_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let req = to_http_request(HttpMethod::Delete, &headers, Bytes::new());
    from_http_response(handle_delete(&state.manager, &state.config, &req).await)
}
