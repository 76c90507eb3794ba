//! Transport traits for the radios and sockets the monitor talks through
//!
//! The monitor core never touches hardware directly. Each collaborator is
//! injected through one of these traits:
//!
//! - [`ShortRangeLink`] sends frames to the paired client
//! - [`NetTransport`] opens long-range sockets, yielding [`NetConnection`]s
//! - [`SampleSource`] yields one analog reading per call
//!
//! [`TcpTransport`] is the socket implementation used on hosts with a
//! regular network stack.

use std::net::SocketAddrV4;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::{MonitorError, Result};

/// Outbound side of the short-range radio link.
#[async_trait::async_trait]
pub trait ShortRangeLink: Send + 'static {
    /// Largest frame the link accepts in one send.
    fn mtu(&self) -> usize;

    /// Send one frame to the paired client.
    ///
    /// Frames larger than [`ShortRangeLink::mtu`] are dropped before they
    /// reach this call.
    async fn send(&mut self, frame: &[u8]) -> Result<()>;
}

/// Factory for long-range socket connections.
#[async_trait::async_trait]
pub trait NetTransport: Send + Sync + 'static {
    async fn connect(&self, addr: SocketAddrV4) -> Result<Box<dyn NetConnection>>;
}

/// One open long-range socket.
#[async_trait::async_trait]
pub trait NetConnection: Send + Sync + 'static {
    /// Write all of `bytes`.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read into `buf`. `Ok(0)` means the remote end closed the socket.
    ///
    /// Must be cancel safe: the stream task polls it inside `select!`.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    async fn close(&mut self);
}

/// Analog front end.
pub trait SampleSource: Send + 'static {
    /// Take one reading. Called once per sample period.
    fn read(&mut self) -> u16;
}

/// [`NetTransport`] over tokio TCP sockets.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait::async_trait]
impl NetTransport for TcpTransport {
    async fn connect(&self, addr: SocketAddrV4) -> Result<Box<dyn NetConnection>> {
        debug!(%addr, "Opening TCP connection");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| MonitorError::transport(format!("connect to {addr} timed out")))?
            .map_err(|e| MonitorError::transport_with_source(format!("connect to {addr}"), Box::new(e)))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpConnection { stream: Some(stream), addr }))
    }
}

struct TcpConnection {
    stream: Option<TcpStream>,
    addr: SocketAddrV4,
}

impl TcpConnection {
    fn stream(&mut self) -> Result<&mut TcpStream> {
        let addr = self.addr;
        self.stream.as_mut().ok_or_else(|| MonitorError::transport(format!("{addr} is closed")))
    }
}

#[async_trait::async_trait]
impl NetConnection for TcpConnection {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream()?.write_all(bytes).await?;
        trace!(addr = %self.addr, len = bytes.len(), "Sent");
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream()?.read(buf).await?)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(addr = %self.addr, "Closed TCP connection");
        }
    }
}
