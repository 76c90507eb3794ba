//! Runtime assembly: wire the bus, queues and shared state, then spawn
//! every task

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::bus::EventBus;
use crate::classifier::Classifier;
use crate::config::MonitorConfig;
use crate::ipc;
use crate::link::{DriverEvent, RadioDriver};
use crate::sample_buffer::SharedSampleBuffer;
use crate::shared::SharedState;
use crate::tasks::ShortRangeIngress;
use crate::tasks::{
    ekg::EkgTask, long_range::LongRangeTask, sampling, short_range::ShortRangeTask,
    stream::StreamTask, telemetry::TelemetryTask, ticker,
};
use crate::transport::{NetTransport, SampleSource, ShortRangeLink};
use crate::types::StatusBits;
use crate::types::flag_groups::{stream, telemetry};

/// Hardware collaborators handed to [`Monitor::spawn`].
pub struct Drivers<L, R, S> {
    /// Outbound side of the paired-client link.
    pub short_range: L,
    pub radio: R,
    /// Completion events from `radio`.
    pub radio_events: mpsc::UnboundedReceiver<DriverEvent>,
    pub net: Arc<dyn NetTransport>,
    pub sampler: S,
}

/// Entry point for starting the monitor.
pub struct Monitor;

impl Monitor {
    /// Validate `config` and spawn every task on the current runtime.
    ///
    /// Must be called from within a tokio runtime. Fails without spawning
    /// anything if the configuration is invalid.
    pub fn spawn<L, R, S>(config: MonitorConfig, drivers: Drivers<L, R, S>) -> Result<MonitorHandle>
    where
        L: ShortRangeLink,
        R: RadioDriver,
        S: SampleSource,
    {
        config.validate()?;
        let Drivers { short_range, radio, radio_events, net, sampler } = drivers;

        let bus = EventBus::new();
        let (inbound_tx, inbound_rx) =
            ipc::channel("ble-rx", config.queue_capacity, config.queue_timeout())?;
        let (outbound_tx, outbound_rx) =
            ipc::channel("ble-tx", config.queue_capacity, config.queue_timeout())?;
        let shared = Arc::new(SharedState::new(config.detector()));
        let buffer = Arc::new(SharedSampleBuffer::new());
        let cancel = CancellationToken::new();

        let mut tasks = Vec::with_capacity(8);

        let task = ShortRangeTask::new(
            short_range,
            inbound_rx,
            outbound_rx,
            bus.clone(),
            Arc::clone(&shared),
            cancel.clone(),
        );
        tasks.push(tokio::spawn(task.run()));

        let task = LongRangeTask::new(
            radio,
            radio_events,
            config.device_name.clone(),
            config.association_retries,
            bus.clone(),
            Arc::clone(&shared),
            outbound_tx.clone(),
            cancel.clone(),
        );
        tasks.push(tokio::spawn(task.run()));

        tasks.push(tokio::spawn(sampling::run(
            sampler,
            config.sample_period(),
            Arc::clone(&buffer),
            bus.clone(),
            cancel.clone(),
        )));

        let task = EkgTask::new(
            buffer,
            Classifier::new(config.classifier_k),
            config.sample_period_ms,
            bus.clone(),
            Arc::clone(&shared),
            outbound_tx.clone(),
            cancel.clone(),
        );
        tasks.push(tokio::spawn(task.run()));

        let task = StreamTask::new(
            Arc::clone(&net),
            config.stream_recv_timeout(),
            bus.clone(),
            Arc::clone(&shared),
            outbound_tx.clone(),
            cancel.clone(),
        );
        tasks.push(tokio::spawn(task.run()));

        let task = TelemetryTask::new(
            net,
            config.http_user_agent.clone(),
            bus.clone(),
            Arc::clone(&shared),
            outbound_tx,
            cancel.clone(),
        );
        tasks.push(tokio::spawn(task.run()));

        tasks.push(tokio::spawn(ticker::run(
            "stream",
            config.stream_tick(),
            stream::TICK,
            bus.clone(),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(ticker::run(
            "telemetry",
            config.telemetry_period(),
            telemetry::TICK,
            bus.clone(),
            cancel.clone(),
        )));

        info!(device = %config.device_name, tasks = tasks.len(), "Monitor started");

        Ok(MonitorHandle {
            ingress: ShortRangeIngress::new(inbound_tx, bus.clone()),
            bus,
            shared,
            tasks,
            cancel,
        })
    }
}

/// Handle to a running monitor. Dropping it cancels every task.
pub struct MonitorHandle {
    ingress: ShortRangeIngress,
    bus: EventBus,
    shared: Arc<SharedState>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl MonitorHandle {
    /// Entry point for the short-range radio glue.
    pub fn ingress(&self) -> ShortRangeIngress {
        self.ingress.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn status(&self) -> StatusBits {
        self.shared.status()
    }

    /// Stream of status changes, starting with the current value.
    pub fn status_updates(&self) -> BoxStream<'static, StatusBits> {
        WatchStream::new(self.shared.subscribe_status()).boxed()
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        info!("Monitor stopped");
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        debug!("Dropping monitor handle");
        self.cancel.cancel();
    }
}
