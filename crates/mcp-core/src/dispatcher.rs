//! Drives a transport's inbound sequence into a peer's dispatch loop (§5,
//! §9: "a single task per connected transport pumps `transport.receive()`
//! into `engine.dispatch()`; nothing else reads from the transport").

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lucentmcp_transport::{InboundItem, Transport};

use crate::peer::Peer;

/// Spawn the reader task for one transport/peer pair. The task exits after
/// the transport reports `Closed` or an unrecoverable error; callers that
/// need to know when the connection ends should await the returned
/// `JoinHandle`.
pub fn spawn_dispatch_loop(transport: Arc<dyn Transport>, peer: Peer) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match transport.receive().await {
                InboundItem::Message(bytes) => peer.dispatch(&bytes).await,
                InboundItem::Closed => {
                    debug!(transport = transport.name(), "transport closed, stopping dispatch loop");
                    break;
                }
                InboundItem::Error(e) => {
                    warn!(transport = transport.name(), error = %e, "transport error, stopping dispatch loop");
                    break;
                }
            }
        }
    })
}
