//! A matched pair of transports cross-wired through unbounded queues (§4.4),
//! used for testing and same-process client/server pairing.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::core::{InboundItem, Transport, TransportResult};

pub struct InMemoryTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundItem>>,
    closed: std::sync::atomic::AtomicBool,
}

impl InMemoryTransport {
    /// Build a connected pair: writes on `a` arrive as inbound items on `b`
    /// and vice versa, in FIFO order.
    pub fn pair() -> (Self, Self) {
        let (a_to_b, b_from_a) = mpsc::unbounded_channel::<Vec<u8>>();
        let (b_to_a, a_from_b) = mpsc::unbounded_channel::<Vec<u8>>();

        let (a_inbound_tx, a_inbound_rx) = mpsc::unbounded_channel();
        let (b_inbound_tx, b_inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(forward(a_from_b, a_inbound_tx));
        tokio::spawn(forward(b_from_a, b_inbound_tx));

        let a = Self {
            outbound: a_to_b,
            inbound: Mutex::new(a_inbound_rx),
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        let b = Self {
            outbound: b_to_a,
            inbound: Mutex::new(b_inbound_rx),
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        (a, b)
    }
}

async fn forward(mut rx: mpsc::UnboundedReceiver<Vec<u8>>, tx: mpsc::UnboundedSender<InboundItem>) {
    while let Some(bytes) = rx.recv().await {
        if tx.send(InboundItem::Message(bytes)).is_err() {
            return;
        }
    }
    let _ = tx.send(InboundItem::Closed);
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()> {
        // A closed half silently drops further writes rather than erroring,
        // matching an unbounded channel whose peer has gone away.
        let _ = self.outbound.send(bytes);
        Ok(())
    }

    async fn receive(&self) -> InboundItem {
        let mut rx = self.inbound.lock().await;
        match rx.recv().await {
            Some(item) => {
                if matches!(item, InboundItem::Closed) {
                    self.closed.store(true, std::sync::atomic::Ordering::Relaxed);
                }
                item
            }
            None => InboundItem::Closed,
        }
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.closed.store(true, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_messages_in_fifo_order() {
        let (a, b) = InMemoryTransport::pair();
        a.send(b"one".to_vec()).await.unwrap();
        a.send(b"two".to_vec()).await.unwrap();

        match b.receive().await {
            InboundItem::Message(m) => assert_eq!(m, b"one"),
            other => panic!("unexpected {other:?}"),
        }
        match b.receive().await {
            InboundItem::Message(m) => assert_eq!(m, b"two"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn closing_one_half_propagates_end_of_stream() {
        let (a, b) = InMemoryTransport::pair();
        drop(a);
        match b.receive().await {
            InboundItem::Closed => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
