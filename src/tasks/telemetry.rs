//! Telemetry task: post a counter to the configured collector on every tick

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::status::dispatch_status;
use crate::Result;
use crate::bus::EventBus;
use crate::http;
use crate::ipc::IpcSender;
use crate::shared::SharedState;
use crate::transport::{NetConnection, NetTransport};
use crate::types::flag_groups::telemetry;
use crate::types::{EventFlags, StatusBits};

const TASK: &str = "TELE";

pub(crate) struct TelemetryTask {
    net: Arc<dyn NetTransport>,
    conn: Option<Box<dyn NetConnection>>,
    user_agent: String,
    counter: u32,
    link_up: bool,
    enabled: bool,
    bus: EventBus,
    shared: Arc<SharedState>,
    outbound: IpcSender,
    cancel: CancellationToken,
}

impl TelemetryTask {
    pub(crate) fn new(
        net: Arc<dyn NetTransport>,
        user_agent: String,
        bus: EventBus,
        shared: Arc<SharedState>,
        outbound: IpcSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            net,
            conn: None,
            user_agent,
            counter: 0,
            link_up: false,
            enabled: false,
            bus,
            shared,
            outbound,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(task = TASK, "Telemetry task started");
        loop {
            let flags = tokio::select! {
                _ = self.cancel.cancelled() => break,
                flags = self.bus.wait_any(telemetry::MASK) => flags,
            };
            self.handle(flags).await;
        }
        self.close().await;
        info!(task = TASK, sent = self.counter, "Telemetry task stopped");
    }

    fn active(&self) -> bool {
        self.link_up && self.enabled
    }

    async fn handle(&mut self, flags: EventFlags) {
        if flags.contains(telemetry::LINK_UP) {
            self.link_up = true;
            if self.enabled {
                self.open().await;
            }
        }

        if flags.contains(telemetry::LINK_DOWN) {
            self.link_up = false;
            self.close().await;
        }

        if flags.contains(telemetry::START) {
            info!(task = TASK, "Telemetry start");
            self.enabled = true;
            self.shared.set_status_flag(StatusBits::TELEMETRY_ENABLED, true);
            if self.link_up {
                self.open().await;
            }
            dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
        }

        if flags.contains(telemetry::STOP) {
            info!(task = TASK, "Telemetry stop");
            self.enabled = false;
            self.close().await;
            self.shared.set_status_flag(StatusBits::TELEMETRY_ENABLED, false);
            dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
        }

        if flags.contains(telemetry::TICK) && self.active() {
            self.post().await;
        }
    }

    async fn post(&mut self) {
        let counter = self.counter;
        self.counter = self.counter.wrapping_add(1);

        let request = match http::post_request(&self.user_agent, &format!("counter={counter}")) {
            Ok(request) => request,
            Err(e) => {
                error!(task = TASK, kind = e.kind(), error = %e, "Couldn't build telemetry request");
                return;
            }
        };

        self.open().await;
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        match conn.send(&request).await {
            Ok(()) => debug!(task = TASK, counter, "Telemetry sent"),
            Err(e) => {
                warn!(task = TASK, counter, kind = e.kind(), error = %e, "Telemetry send failed, reopening");
                self.close().await;
                self.open().await;
            }
        }
    }

    async fn open(&mut self) {
        if self.conn.is_some() {
            return;
        }
        match self.connect().await {
            Ok(conn) => self.conn = Some(conn),
            Err(e) => error!(task = TASK, kind = e.kind(), error = %e, "Couldn't open telemetry socket"),
        }
    }

    async fn connect(&self) -> Result<Box<dyn NetConnection>> {
        let addr = self.shared.telemetry_target().socket_addr();
        let conn = self.net.connect(addr).await?;
        debug!(task = TASK, %addr, "Telemetry socket opened");
        Ok(conn)
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            debug!(task = TASK, "Telemetry socket closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc;
    use crate::protocol::TelemetryTarget;
    use crate::test_utils::{MemoryTransport, wait_until};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(1);

    struct Harness {
        net: MemoryTransport,
        bus: EventBus,
        shared: Arc<SharedState>,
        outbound: ipc::IpcReceiver,
        cancel: CancellationToken,
    }

    fn spawn() -> Harness {
        let _ = tracing_subscriber::fmt::try_init();
        let (net, _remote) = MemoryTransport::new();
        let bus = EventBus::new();
        let shared = Arc::new(SharedState::default());
        shared.set_telemetry_target(TelemetryTarget::new(Ipv4Addr::new(10, 0, 0, 3), 9000));
        let (tx, rx) = ipc::channel("ble-tx", 16, Duration::from_millis(16)).unwrap();
        let cancel = CancellationToken::new();
        let task = TelemetryTask::new(
            Arc::new(net.clone()),
            "test-agent/1.0".to_string(),
            bus.clone(),
            Arc::clone(&shared),
            tx,
            cancel.clone(),
        );
        tokio::spawn(task.run());
        Harness { net, bus, shared, outbound: rx, cancel }
    }

    fn bodies(net: &MemoryTransport) -> Vec<String> {
        net.sent()
            .into_iter()
            .map(|(_, bytes)| String::from_utf8(bytes).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn ticks_post_increasing_counter() {
        let h = spawn();
        h.bus.set(telemetry::LINK_UP | telemetry::START);
        assert!(wait_until(WAIT, || h.net.connects().len() == 1).await);
        assert_eq!(h.net.connects()[0].port(), 9000);

        h.bus.set(telemetry::TICK);
        assert!(wait_until(WAIT, || h.net.sent().len() == 1).await);
        h.bus.set(telemetry::TICK);
        assert!(wait_until(WAIT, || h.net.sent().len() == 2).await);

        let bodies = bodies(&h.net);
        assert!(bodies[0].starts_with("POST /telemetry HTTP/1.1\r\nUser-Agent: test-agent/1.0\r\n"));
        assert!(bodies[0].ends_with("counter=0\r\n\r\n"));
        assert!(bodies[1].ends_with("counter=1\r\n\r\n"));
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn tick_while_inactive_sends_nothing() {
        let h = spawn();
        h.bus.set(telemetry::START);
        assert!(wait_until(WAIT, || h.shared.status().telemetry_enabled()).await);
        h.bus.set(telemetry::TICK);
        assert!(wait_until(WAIT, || !h.bus.peek().intersects(telemetry::MASK)).await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.net.sent().is_empty());
        assert!(h.net.connects().is_empty());
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn send_failure_reopens_and_counter_advances() {
        let h = spawn();
        h.bus.set(telemetry::LINK_UP | telemetry::START);
        assert!(wait_until(WAIT, || h.net.connects().len() == 1).await);

        h.net.fail_send(true);
        h.bus.set(telemetry::TICK);
        assert!(wait_until(WAIT, || h.net.connects().len() == 2).await);
        assert_eq!(h.net.closes(), 1);

        h.net.fail_send(false);
        h.bus.set(telemetry::TICK);
        assert!(wait_until(WAIT, || h.net.sent().len() == 1).await);
        assert!(bodies(&h.net)[0].ends_with("counter=1\r\n\r\n"));
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn start_and_stop_always_report_status() {
        let h = spawn();
        h.bus.set(telemetry::START);
        assert!(wait_until(WAIT, || h.outbound.len() == 1).await);
        h.bus.set(telemetry::START);
        assert!(wait_until(WAIT, || h.outbound.len() == 2).await);
        h.bus.set(telemetry::STOP);
        assert!(wait_until(WAIT, || h.outbound.len() == 3).await);
        assert!(!h.shared.status().telemetry_enabled());
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn link_down_closes_socket() {
        let h = spawn();
        h.bus.set(telemetry::LINK_UP | telemetry::START);
        assert!(wait_until(WAIT, || h.net.connects().len() == 1).await);
        h.bus.set(telemetry::LINK_DOWN);
        assert!(wait_until(WAIT, || h.net.closes() == 1).await);
        assert!(h.shared.status().telemetry_enabled());
        h.cancel.cancel();
    }
}
