//! Bounded byte-message channels between tasks
//!
//! Payloads larger than [`IPC_PAYLOAD_SIZE`] are sliced into consecutive
//! chunks. Every chunk waits at most the channel timeout for queue space;
//! the first chunk that times out aborts the rest of the payload.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tracing::{trace, warn};

use crate::{MonitorError, Result};

/// Maximum payload carried by one queue element.
pub const IPC_PAYLOAD_SIZE: usize = 128;

/// One queue element.
#[derive(Clone, Copy)]
pub struct IpcMessage {
    /// Caller-defined identifier for associating chunks.
    pub tag: u8,
    pub len: usize,
    pub payload: [u8; IPC_PAYLOAD_SIZE],
}

impl IpcMessage {
    pub fn new(tag: u8, bytes: &[u8]) -> Self {
        let len = bytes.len().min(IPC_PAYLOAD_SIZE);
        let mut payload = [0u8; IPC_PAYLOAD_SIZE];
        payload[..len].copy_from_slice(&bytes[..len]);
        Self { tag, len, payload }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

impl std::fmt::Debug for IpcMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcMessage").field("tag", &self.tag).field("bytes", &self.bytes()).finish()
    }
}

/// Create a bounded channel.
///
/// A zero capacity is reported as [`MonitorError::ResourceExhausted`].
pub fn channel(
    name: &'static str,
    capacity: usize,
    timeout: Duration,
) -> Result<(IpcSender, IpcReceiver)> {
    if capacity == 0 {
        return Err(MonitorError::ResourceExhausted { resource: name });
    }
    let (tx, rx) = mpsc::channel(capacity);
    Ok((IpcSender { name, tx, timeout }, IpcReceiver { name, rx, timeout }))
}

/// Producer side. Clone it for each writer.
#[derive(Debug, Clone)]
pub struct IpcSender {
    name: &'static str,
    tx: mpsc::Sender<IpcMessage>,
    timeout: Duration,
}

impl IpcSender {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Slice `bytes` into chunks and enqueue them in order.
    pub async fn enqueue(&self, tag: u8, bytes: &[u8]) -> Result<()> {
        for chunk in bytes.chunks(IPC_PAYLOAD_SIZE) {
            match self.tx.send_timeout(IpcMessage::new(tag, chunk), self.timeout).await {
                Ok(()) => trace!(channel = self.name, len = chunk.len(), "Enqueued chunk"),
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(channel = self.name, timeout = ?self.timeout, "Queue full, dropping rest of payload");
                    return Err(MonitorError::channel_timeout(self.name, self.timeout));
                }
                Err(SendTimeoutError::Closed(_)) => {
                    return Err(MonitorError::ChannelClosed { channel: self.name });
                }
            }
        }
        Ok(())
    }
}

/// Consumer side. Each message is delivered to exactly one reader.
#[derive(Debug)]
pub struct IpcReceiver {
    name: &'static str,
    rx: mpsc::Receiver<IpcMessage>,
    timeout: Duration,
}

impl IpcReceiver {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait up to the channel timeout for the next message.
    pub async fn recv_timeout(&mut self) -> Result<IpcMessage> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(MonitorError::ChannelClosed { channel: self.name }),
            Err(_) => Err(MonitorError::channel_timeout(self.name, self.timeout)),
        }
    }

    pub fn try_recv(&mut self) -> Option<IpcMessage> {
        self.rx.try_recv().ok()
    }

    /// Every message queued right now, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = IpcMessage> + '_ {
        std::iter::from_fn(move || self.rx.try_recv().ok())
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
