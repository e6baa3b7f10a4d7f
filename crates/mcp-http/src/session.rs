//! Session manager (§4.7): a concurrency-safe `sessionId -> transport` map
//! with capacity enforcement and stale-session reaping.
//!
//! Generic over the concrete transport type `T` rather than `dyn Transport`:
//! the HTTP server is the only caller, and it always wants its own
//! [`crate::server::HttpSessionTransport`] back out, not a trait object it
//! would have to downcast.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use lucentmcp_transport::Transport;

/// Generates a fresh session identifier. The default is a UUIDv4; a server
/// can supply its own via `ServerTransportConfig::session_id_generator` (§6).
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

struct Entry<T> {
    transport: Arc<T>,
    last_activity: Instant,
    /// Insertion ordinal. The map is keyed by session id (for `O(log n)`
    /// lookup), which sorts lexicographically rather than by arrival order,
    /// so cleanup sweeps by this field instead of map order.
    seq: u64,
}

/// Maps session ids to their transport, insertion-ordered for deterministic
/// cleanup sweeps (§4.7).
pub struct SessionManager<T> {
    sessions: RwLock<BTreeMap<String, Entry<T>>>,
    max_sessions: usize,
    next_seq: AtomicU64,
}

impl<T: Transport + 'static> SessionManager<T> {
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: RwLock::new(BTreeMap::new()), max_sessions, next_seq: AtomicU64::new(0) }
    }

    pub async fn can_add_session(&self) -> bool {
        self.sessions.read().await.len() < self.max_sessions
    }

    pub async fn store(&self, session_id: String, transport: Arc<T>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().await.insert(session_id, Entry { transport, last_activity: Instant::now(), seq });
    }

    pub async fn transport(&self, session_id: &str) -> Option<Arc<T>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id)?;
        entry.last_activity = Instant::now();
        Some(entry.transport.clone())
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<T>> {
        self.sessions.write().await.remove(session_id).map(|e| e.transport)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// §4.7: `cleanupStaleSessions` — disconnect and drop every session whose
    /// `last_activity` predates `now - older_than`. Returns the removed ids
    /// so the caller can run `on_session_closed` hooks.
    pub async fn cleanup_stale_sessions(&self, older_than: Duration) -> Vec<String> {
        let cutoff = Instant::now().checked_sub(older_than).unwrap_or_else(Instant::now);
        let mut sessions = self.sessions.write().await;
        let mut stale: Vec<(u64, String)> =
            sessions.iter().filter(|(_, e)| e.last_activity < cutoff).map(|(id, e)| (e.seq, id.clone())).collect();
        stale.sort_by_key(|(seq, _)| *seq);
        let stale: Vec<String> = stale.into_iter().map(|(_, id)| id).collect();
        for id in &stale {
            if let Some(entry) = sessions.remove(id) {
                let _ = entry.transport.disconnect().await;
            }
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "reaped stale HTTP sessions");
        }
        stale
    }

    /// Spawn a background task that periodically calls
    /// [`SessionManager::cleanup_stale_sessions`], invoking `on_closed` for
    /// every reaped session id (§9: "a background task invokes it
    /// periodically").
    pub fn spawn_reaper(
        self: &Arc<Self>,
        check_interval: Duration,
        idle_timeout: Duration,
        on_closed: impl Fn(&str) + Send + Sync + 'static,
    ) -> tokio::task::JoinHandle<()>
    where
        T: Send + Sync,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            loop {
                ticker.tick().await;
                for id in manager.cleanup_stale_sessions(idle_timeout).await {
                    on_closed(&id);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucentmcp_transport::InMemoryTransport;

    #[tokio::test]
    async fn enforces_capacity() {
        let manager: SessionManager<InMemoryTransport> = SessionManager::new(1);
        assert!(manager.can_add_session().await);
        let (a, _b) = InMemoryTransport::pair();
        manager.store("one".into(), Arc::new(a)).await;
        assert!(!manager.can_add_session().await);
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_entries() {
        let manager: SessionManager<InMemoryTransport> = SessionManager::new(10);
        let (a, _ka) = InMemoryTransport::pair();
        let (b, _kb) = InMemoryTransport::pair();
        manager.store("stale".into(), Arc::new(a)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.store("fresh".into(), Arc::new(b)).await;

        let reaped = manager.cleanup_stale_sessions(Duration::from_millis(10)).await;
        assert_eq!(reaped, vec!["stale".to_string()]);
        assert_eq!(manager.len().await, 1);
    }
}
