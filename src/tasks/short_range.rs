//! Short-range link task
//!
//! Owns both IPC queues of the paired-client link. Inbound frames are
//! reassembled, decoded and dispatched; outbound frames are sent whenever
//! the link is up and someone raised `SEND_MSG`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::bus::EventBus;
use crate::error::CodecError;
use crate::ipc::{IpcReceiver, IpcSender};
use crate::protocol::{FrameAssembler, Instruction, Message};
use crate::shared::SharedState;
use crate::transport::ShortRangeLink;
use crate::types::EventFlags;
use crate::types::flag_groups::{ble, ekg, stream, telemetry, wifi};

const TASK: &str = "BLE";

/// Handle the radio glue uses to report link events and received bytes.
#[derive(Debug, Clone)]
pub struct ShortRangeIngress {
    inbound: IpcSender,
    bus: EventBus,
}

impl ShortRangeIngress {
    pub(crate) fn new(inbound: IpcSender, bus: EventBus) -> Self {
        Self { inbound, bus }
    }

    pub fn connected(&self) {
        self.bus.set(ble::CONNECTED);
    }

    pub fn disconnected(&self) {
        self.bus.set(ble::DISCONNECTED);
    }

    /// Queue one received write for the link task.
    ///
    /// `RECV_MSG` is raised even when the queue overflows part way, so the
    /// chunks that did make it are still processed.
    pub async fn deliver(&self, bytes: &[u8]) -> Result<()> {
        let result = self.inbound.enqueue(0, bytes).await;
        self.bus.set(ble::RECV_MSG);
        result
    }
}

pub(crate) struct ShortRangeTask<L> {
    link: L,
    link_up: bool,
    inbound: IpcReceiver,
    outbound: IpcReceiver,
    assembler: FrameAssembler,
    bus: EventBus,
    shared: Arc<SharedState>,
    cancel: CancellationToken,
}

impl<L: ShortRangeLink> ShortRangeTask<L> {
    pub(crate) fn new(
        link: L,
        inbound: IpcReceiver,
        outbound: IpcReceiver,
        bus: EventBus,
        shared: Arc<SharedState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            link,
            link_up: false,
            inbound,
            outbound,
            assembler: FrameAssembler::new(),
            bus,
            shared,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(task = TASK, "Short-range link task started");
        loop {
            let flags = tokio::select! {
                _ = self.cancel.cancelled() => break,
                flags = self.bus.wait_any(ble::MASK) => flags,
            };
            self.handle(flags).await;
        }
        info!(task = TASK, "Short-range link task stopped");
    }

    async fn handle(&mut self, flags: EventFlags) {
        if flags.contains(ble::CONNECTED) {
            info!(task = TASK, "Client connected");
            self.link_up = true;
            if !self.outbound.is_empty() && !flags.contains(ble::SEND_MSG) {
                self.bus.set(ble::SEND_MSG);
            }
        }

        if flags.contains(ble::DISCONNECTED) {
            info!(task = TASK, "Client disconnected");
            self.link_up = false;
        }

        if flags.contains(ble::RECV_MSG) {
            self.receive();
        }

        if flags.contains(ble::SEND_MSG) {
            self.send().await;
        }
    }

    fn receive(&mut self) {
        let Self { inbound, assembler, bus, shared, .. } = self;
        for chunk in inbound.drain() {
            assembler.push(chunk.bytes(), |decoded| dispatch(bus, shared, decoded));
        }
    }

    async fn send(&mut self) {
        if !self.link_up {
            debug!(task = TASK, queued = self.outbound.len(), "Link down, holding outbound frames");
            return;
        }
        let mtu = self.link.mtu();
        while let Some(msg) = self.outbound.try_recv() {
            if msg.len > mtu {
                warn!(task = TASK, len = msg.len, mtu, "Frame exceeds link MTU, dropping");
                continue;
            }
            debug!(task = TASK, len = msg.len, "Sending frame");
            if let Err(e) = self.link.send(msg.bytes()).await {
                error!(task = TASK, kind = e.kind(), error = %e, "Couldn't send frame");
            }
        }
    }
}

fn dispatch(bus: &EventBus, shared: &SharedState, decoded: std::result::Result<Message, CodecError>) {
    let message = match decoded {
        Ok(message) => message,
        Err(e) => {
            error!(task = TASK, kind = "codec", error = %e, "Couldn't unpack message");
            return;
        }
    };

    match message {
        Message::Instruction(code) => match Instruction::try_from(code) {
            Ok(instruction) => {
                info!(task = TASK, instruction = instruction.name(), "Instruction");
                bus.set(instruction_flags(instruction));
            }
            Err(e) => warn!(task = TASK, kind = e.kind(), error = %e, "Unhandled instruction"),
        },
        Message::WifiCredentials(credentials) => shared.set_credentials(credentials),
        Message::StreamTarget(target) => shared.set_stream_target(target),
        Message::TelemetryTarget(target) => shared.set_telemetry_target(target),
        Message::TrainingSet(set) => shared.set_training_set(set),
        Message::Configuration(config) => match config.detector_config() {
            Some(config) => shared.set_detector_config(config),
            None => warn!(
                task = TASK,
                comparator = config.comparator,
                "Unknown comparator, keeping {:?}",
                shared.detector_config().comparator
            ),
        },
        Message::Status { .. } | Message::SampleObservation(_) => {
            warn!(task = TASK, kind = ?message.kind(), "This device has no use for this message");
        }
    }
}

fn instruction_flags(instruction: Instruction) -> EventFlags {
    match instruction {
        Instruction::WifiEnable => wifi::START,
        Instruction::WifiDisable => wifi::STOP,
        Instruction::StreamEnable => stream::START,
        Instruction::StreamDisable => stream::STOP,
        Instruction::TelemetryEnable => telemetry::START,
        Instruction::TelemetryDisable => telemetry::STOP,
        Instruction::SamplingStart => ekg::START,
        Instruction::SamplingStop => ekg::STOP,
    }
}
