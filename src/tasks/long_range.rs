//! Long-range link task
//!
//! Drives the [`LinkStateMachine`] from two sources: the WIFI flag group
//! (requests from other tasks) and the driver's completion events. Link
//! changes are fanned out to the stream and telemetry groups.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::status::dispatch_status;
use crate::bus::EventBus;
use crate::ipc::IpcSender;
use crate::link::{ConnectionState, Credentials, DriverEvent, LinkNotification, LinkStateMachine, RadioDriver};
use crate::shared::SharedState;
use crate::types::flag_groups::{stream, telemetry, wifi};
use crate::types::{EventFlags, StatusBits};
use crate::{MonitorError, Result};

const TASK: &str = "WIFI";

pub(crate) struct LongRangeTask<D> {
    link: LinkStateMachine<D>,
    events: mpsc::UnboundedReceiver<DriverEvent>,
    hostname: String,
    retries: u32,
    connected: bool,
    reconnect_pending: bool,
    bus: EventBus,
    shared: Arc<SharedState>,
    outbound: IpcSender,
    cancel: CancellationToken,
}

impl<D: RadioDriver> LongRangeTask<D> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        driver: D,
        events: mpsc::UnboundedReceiver<DriverEvent>,
        hostname: String,
        retries: u32,
        bus: EventBus,
        shared: Arc<SharedState>,
        outbound: IpcSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            link: LinkStateMachine::new(driver),
            events,
            hostname,
            retries,
            connected: false,
            reconnect_pending: false,
            bus,
            shared,
            outbound,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(task = TASK, "Long-range link task started");
        let mut events_open = true;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.on_driver_event(event),
                    None => {
                        warn!(task = TASK, "Driver event channel closed");
                        events_open = false;
                    }
                },
                flags = self.bus.wait_any(wifi::MASK) => self.handle(flags).await,
            }
        }
        info!(task = TASK, state = ?self.link.state(), "Long-range link task stopped");
    }

    fn on_driver_event(&mut self, event: DriverEvent) {
        debug!(task = TASK, ?event, "Driver event");
        let outcome = match event {
            DriverEvent::Associated(addr) => self.link.on_associated(addr),
            DriverEvent::LinkLost => self.link.on_link_lost(),
        };
        match outcome {
            Ok(Some(LinkNotification::Connected(_))) => self.bus.set(wifi::CONNECTED),
            Ok(Some(LinkNotification::Disconnected)) => self.bus.set(wifi::DISCONNECTED),
            Ok(None) => {}
            Err(e) => debug!(task = TASK, kind = e.kind(), error = %e, "Ignoring stale driver event"),
        }
    }

    async fn handle(&mut self, flags: EventFlags) {
        if flags.contains(wifi::CONNECTED) {
            self.on_connected().await;
        }

        if flags.contains(wifi::DISCONNECTED) && self.on_disconnected().await {
            return;
        }

        if flags.contains(wifi::START) && self.on_start() {
            return;
        }

        if flags.contains(wifi::STOP) {
            self.on_stop().await;
        }
    }

    async fn on_connected(&mut self) {
        self.connected = true;
        self.shared.set_lan_addr(self.link.lan_addr());
        self.shared.set_status_flag(StatusBits::WIFI_CONNECTED, true);
        self.bus.set(stream::LINK_UP | telemetry::LINK_UP);
        info!(task = TASK, addr = %std::net::Ipv4Addr::from(self.link.lan_addr()), "Connected");
        dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
    }

    // Returns true when the rest of this wake should be skipped
    async fn on_disconnected(&mut self) -> bool {
        self.connected = false;
        self.shared.set_lan_addr(0);
        self.shared.set_status_flag(StatusBits::WIFI_CONNECTED, false);
        self.bus.set(stream::LINK_DOWN | telemetry::LINK_DOWN);
        info!(task = TASK, "Disconnected");

        if let Err(e) = self.link.stop() {
            error!(task = TASK, kind = e.kind(), error = %e, "Couldn't stop radio");
        }

        if self.reconnect_pending {
            self.reconnect_pending = false;
            self.bus.set(wifi::START);
            return true;
        }
        dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
        false
    }

    // Returns true when the rest of this wake should be skipped
    fn on_start(&mut self) -> bool {
        if self.connected {
            match self.link.disconnect() {
                Ok(()) => self.reconnect_pending = true,
                Err(e) => error!(task = TASK, kind = e.kind(), error = %e, "Couldn't disconnect"),
            }
            return true;
        }

        if let Err(e) = self.connect() {
            error!(task = TASK, kind = e.kind(), error = %e, "Couldn't connect");
            return true;
        }
        false
    }

    async fn on_stop(&mut self) {
        self.reconnect_pending = false;
        if self.connected {
            if let Err(e) = self.link.disconnect() {
                error!(task = TASK, kind = e.kind(), error = %e, "Couldn't disconnect");
            }
            return;
        }
        // Still associating
        if self.link.state() == ConnectionState::Disconnected {
            if let Err(e) = self.link.stop() {
                error!(task = TASK, kind = e.kind(), error = %e, "Couldn't stop radio");
            }
        }
        dispatch_status(TASK, &self.shared, &self.outbound, &self.bus).await;
    }

    fn connect(&mut self) -> Result<()> {
        if self.link.state() == ConnectionState::Uninit {
            self.link.initialize(&self.hostname)?;
        }
        let credentials = Credentials::from(&self.shared.credentials());
        if credentials.ssid.is_empty() {
            return Err(MonitorError::config("credentials", "no SSID has been provided"));
        }
        debug!(task = TASK, ssid = %credentials.ssid, "Configuring");
        self.link.configure(credentials, self.retries)?;
        self.link.start()
    }
}
