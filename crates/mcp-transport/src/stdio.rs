//! Line-delimited JSON-RPC over a pair of byte streams (§4.3).
//!
//! Each write appends a single newline; reads accumulate until newline.
//! Oversize lines fail with [`TransportError::MessageTooLarge`] rather than
//! growing the buffer unbounded. A single outbound mutex guarantees whole-line
//! write atomicity when multiple tasks call `send` concurrently.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::core::{InboundItem, Transport, TransportError, TransportResult};

/// Default oversize-line cutoff (§4.3: "e.g., 4 MiB").
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

pub struct StdioTransport {
    writer: Mutex<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>,
    inbound: Mutex<mpsc::Receiver<InboundItem>>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    max_line_bytes: usize,
}

impl StdioTransport {
    /// Build a transport over the given reader/writer pair, spawning the
    /// single reader task immediately.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
        W: tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_max_line_bytes(reader, writer, DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes<R, W>(reader: R, writer: W, max_line_bytes: usize) -> Self
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
        W: tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let task = tokio::spawn(reader_loop(BufReader::new(reader), tx, max_line_bytes));
        Self {
            writer: Mutex::new(Box::new(writer)),
            inbound: Mutex::new(rx),
            reader_task: Mutex::new(Some(task)),
            max_line_bytes,
        }
    }

    /// Convenience constructor over the process's own stdin/stdout.
    pub fn process_pair() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(
    mut reader: BufReader<R>,
    tx: mpsc::Sender<InboundItem>,
    max_line_bytes: usize,
) {
    loop {
        let mut line = String::new();
        match read_line_limited(&mut reader, &mut line, max_line_bytes).await {
            Ok(0) => {
                let _ = tx.send(InboundItem::Closed).await;
                return;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if trimmed.is_empty() {
                    continue;
                }
                if tx.send(InboundItem::Message(trimmed.as_bytes().to_vec())).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(InboundItem::Error(e)).await;
                return;
            }
        }
    }
}

async fn read_line_limited<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    line: &mut String,
    max_line_bytes: usize,
) -> TransportResult<usize> {
    let n = reader
        .read_line(line)
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;
    if line.len() > max_line_bytes {
        return Err(TransportError::MessageTooLarge { limit: max_line_bytes });
    }
    Ok(n)
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn send(&self, mut bytes: Vec<u8>) -> TransportResult<()> {
        if bytes.len() > self.max_line_bytes {
            return Err(TransportError::MessageTooLarge { limit: self.max_line_bytes });
        }
        bytes.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await.map_err(|e| TransportError::SendFailed(e.to_string()))?;
        writer.flush().await.map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn receive(&self) -> InboundItem {
        let mut rx = self.inbound.lock().await;
        match rx.recv().await {
            Some(item) => item,
            None => InboundItem::Closed,
        }
    }

    async fn disconnect(&self) -> TransportResult<()> {
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_line() {
        let (client, mut server) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = StdioTransport::new(read_half, write_half);

        tokio::io::AsyncWriteExt::write_all(&mut server, b"{\"a\":1}\n").await.unwrap();
        match transport.receive().await {
            InboundItem::Message(bytes) => assert_eq!(bytes, b"{\"a\":1}"),
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn rejects_oversize_line() {
        let (client, mut server) = duplex(1 << 20);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = StdioTransport::with_max_line_bytes(read_half, write_half, 16);

        let mut payload = vec![b'x'; 64];
        payload.push(b'\n');
        tokio::io::AsyncWriteExt::write_all(&mut server, &payload).await.unwrap();
        match transport.receive().await {
            InboundItem::Error(TransportError::MessageTooLarge { limit }) => assert_eq!(limit, 16),
            other => panic!("unexpected {other}"),
        }
    }
}
