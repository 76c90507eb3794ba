//! EKG pipeline task: detect, classify and relay one beat per burst

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::EventBus;
use crate::classifier::Classifier;
use crate::detector::detect_beat;
use crate::ipc::IpcSender;
use crate::protocol::{Message, SampleObservation};
use crate::sample_buffer::{BURST_LEN, Burst, SharedSampleBuffer};
use crate::shared::SharedState;
use crate::types::flag_groups::{ble, ekg};
use crate::types::{EventFlags, StatusBits};

const TASK: &str = "EKG";

pub(crate) struct EkgTask {
    buffer: Arc<SharedSampleBuffer>,
    burst: Burst,
    classifier: Classifier,
    period_ms: u32,
    relay: bool,
    bus: EventBus,
    shared: Arc<SharedState>,
    outbound: IpcSender,
    cancel: CancellationToken,
}

impl EkgTask {
    pub(crate) fn new(
        buffer: Arc<SharedSampleBuffer>,
        classifier: Classifier,
        period_ms: u32,
        bus: EventBus,
        shared: Arc<SharedState>,
        outbound: IpcSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            buffer,
            burst: [0; BURST_LEN],
            classifier,
            period_ms,
            relay: false,
            bus,
            shared,
            outbound,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(task = TASK, k = self.classifier.k(), "EKG task started");
        loop {
            let flags = tokio::select! {
                _ = self.cancel.cancelled() => break,
                flags = self.bus.wait_any(ekg::MASK) => flags,
            };
            self.handle(flags).await;
        }
        info!(task = TASK, "EKG task stopped");
    }

    async fn handle(&mut self, flags: EventFlags) {
        if flags.contains(ekg::START) {
            info!(task = TASK, "Relay enabled");
            self.relay = true;
            self.shared.set_status_flag(StatusBits::RELAY_ENABLED, true);
        }

        if flags.contains(ekg::STOP) {
            info!(task = TASK, "Relay disabled");
            self.relay = false;
            self.shared.set_status_flag(StatusBits::RELAY_ENABLED, false);
        }

        if flags.contains(ekg::TICK) {
            self.tick().await;
        }
    }

    async fn tick(&mut self) {
        let generation = self.buffer.snapshot(&mut self.burst);
        let config = self.shared.detector_config();

        let Some(beat) = detect_beat(&self.burst, &config, self.period_ms) else {
            trace!(task = TASK, generation, "No complete beat in burst");
            return;
        };

        let set = self.shared.training_set();
        let label = self.classifier.classify(&set, beat.amplitude, beat.rr_interval);
        debug!(
            task = TASK,
            generation,
            amplitude = beat.amplitude,
            rr = beat.rr_interval,
            ?label,
            "Beat"
        );

        if !self.relay {
            return;
        }

        let observation =
            SampleObservation { label, amplitude: beat.amplitude, period: beat.rr_interval };
        let frame = Message::SampleObservation(observation).to_frame();
        match self.outbound.enqueue(0, frame.as_bytes()).await {
            Ok(()) => self.bus.set(ble::SEND_MSG),
            Err(e) => warn!(task = TASK, kind = e.kind(), error = %e, "Dropped observation"),
        }
    }
}
