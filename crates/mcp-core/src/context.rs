//! Per-request handler context (§4.2 inbound dispatch step 3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lucentmcp_protocol::{ProgressToken, RequestId, Result, Value};

use crate::peer::PeerHandle;

/// Context handed to a registered request handler: the request id, a
/// cancellation flag flipped by an inbound `notifications/cancelled`
/// carrying this id, the progress token supplied in `_meta` (if any), and a
/// way to emit `notifications/progress` back to the same peer.
#[derive(Clone)]
pub struct RequestContext {
    pub(crate) request_id: RequestId,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) progress_token: Option<ProgressToken>,
    pub(crate) peer: PeerHandle,
}

impl RequestContext {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Handlers should call this at natural checkpoints; a cancelled
    /// handler's eventual return value is discarded (§5), so long-running
    /// work should poll this and bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails with `requestCancelled` if the handler has been cancelled,
    /// otherwise a no-op — a convenient call site for "checkCancellation".
    pub fn check_cancellation(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(lucentmcp_protocol::Error::RequestCancelled(self.request_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Emit a `notifications/progress` for this request's progress token, if
    /// the caller supplied one. A no-op (not an error) when absent, since a
    /// caller that never asked for progress shouldn't force handlers to
    /// branch on it.
    pub async fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) {
        let Some(token) = self.progress_token.clone() else { return };
        self.peer.emit_progress(token, progress, total, message).await;
    }
}
