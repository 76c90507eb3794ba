//! Stream task: pull data from the configured remote while enabled and
//! the long-range link is up

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::status::dispatch_status;
use crate::Result;
use crate::bus::EventBus;
use crate::http;
use crate::ipc::IpcSender;
use crate::shared::SharedState;
use crate::transport::{NetConnection, NetTransport};
use crate::types::flag_groups::stream;
use crate::types::{EventFlags, StatusBits};

const TASK: &str = "STREAM";

/// Receive buffer size.
const RECV_BUFFER_SIZE: usize = 512;

pub(crate) struct StreamTask {
    net: Arc<dyn NetTransport>,
    conn: Option<Box<dyn NetConnection>>,
    buf: [u8; RECV_BUFFER_SIZE],
    link_up: bool,
    enabled: bool,
    bytes_received: u64,
    recv_timeout: Duration,
    bus: EventBus,
    shared: Arc<SharedState>,
    outbound: IpcSender,
    cancel: CancellationToken,
}

impl StreamTask {
    pub(crate) fn new(
        net: Arc<dyn NetTransport>,
        recv_timeout: Duration,
        bus: EventBus,
        shared: Arc<SharedState>,
        outbound: IpcSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            net,
            conn: None,
            buf: [0; RECV_BUFFER_SIZE],
            link_up: false,
            enabled: false,
            bytes_received: 0,
            recv_timeout,
            bus,
            shared,
            outbound,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(task = TASK, "Stream task started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                flags = self.bus.wait_any(stream::MASK) => self.handle(flags).await,
                received = recv(&mut self.conn, &mut self.buf, self.recv_timeout), if self.conn.is_some() => {
                    self.on_recv(received).await;
                }
            }
        }
        self.close().await;
        info!(task = TASK, "Stream task stopped");
    }

    async fn handle(&mut self, flags: EventFlags) {
        if flags.contains(stream::LINK_UP) {
            self.link_up = true;
            if self.enabled {
                info!(task = TASK, "Auto-resuming stream");
                self.open().await;
            }
        }

        if flags.contains(stream::LINK_DOWN) {
            self.link_up = false;
            if self.enabled {
                info!(task = TASK, "Auto-halting stream");
                self.close().await;
            }
        }

        if flags.contains(stream::START) {
            if !self.enabled {
                info!(task = TASK, "Streaming enabled");
                self.enabled = true;
                self.shared.set_status_flag(StatusBits::STREAM_ENABLED, true);
                if self.link_up {
                    self.open().await;
                }
            }
            dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
        }

        if flags.contains(stream::STOP) {
            if self.enabled {
                info!(task = TASK, "Streaming disabled");
                self.enabled = false;
                self.close().await;
                self.shared.set_status_flag(StatusBits::STREAM_ENABLED, false);
            }
            dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
        }

        if flags.contains(stream::TICK) && self.enabled {
            info!(task = TASK, bytes = self.bytes_received, "Bytes per tick");
            self.bytes_received = 0;
            if self.active() && self.conn.is_none() {
                debug!(task = TASK, "Retrying stream");
                self.open().await;
            }
        }
    }

    fn active(&self) -> bool {
        self.link_up && self.enabled
    }

    // None means the read timed out with the socket still healthy
    async fn on_recv(&mut self, received: Option<Result<usize>>) {
        match received {
            None => {}
            Some(Ok(0)) => {
                warn!(task = TASK, "Host closed socket, reopening");
                self.reopen().await;
            }
            Some(Ok(n)) => self.bytes_received += n as u64,
            Some(Err(e)) => {
                error!(task = TASK, kind = e.kind(), error = %e, "Socket error, reopening");
                self.reopen().await;
            }
        }
    }

    async fn open(&mut self) {
        if self.conn.is_some() {
            return;
        }
        match self.connect().await {
            Ok(conn) => self.conn = Some(conn),
            Err(e) => error!(task = TASK, kind = e.kind(), error = %e, "Couldn't open stream"),
        }
    }

    async fn connect(&self) -> Result<Box<dyn NetConnection>> {
        let target = self.shared.stream_target();
        let request = http::get_request(&target.path_str())?;
        let mut conn = self.net.connect(target.socket_addr()).await?;
        if let Err(e) = conn.send(&request).await {
            conn.close().await;
            return Err(e);
        }
        debug!(task = TASK, addr = %target.socket_addr(), "Stream opened");
        Ok(conn)
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            debug!(task = TASK, "Stream closed");
        }
    }

    async fn reopen(&mut self) {
        self.close().await;
        self.open().await;
    }
}

async fn recv(
    conn: &mut Option<Box<dyn NetConnection>>,
    buf: &mut [u8],
    timeout: Duration,
) -> Option<Result<usize>> {
    match conn {
        Some(conn) => tokio::time::timeout(timeout, conn.recv(buf)).await.ok(),
        None => std::future::pending().await,
    }
}
