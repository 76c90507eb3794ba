//! Sampling task: fill a burst at a fixed rate and publish it

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::bus::EventBus;
use crate::sample_buffer::{BURST_LEN, Burst, SharedSampleBuffer};
use crate::transport::SampleSource;
use crate::types::flag_groups::ekg;

const TASK: &str = "SAMPLE";

pub(crate) async fn run<S: SampleSource>(
    mut source: S,
    period: Duration,
    buffer: Arc<SharedSampleBuffer>,
    bus: EventBus,
    cancel: CancellationToken,
) {
    info!(task = TASK, period_ms = period.as_millis() as u64, "Sampling task started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    let mut burst: Burst = [0; BURST_LEN];
    let mut filled = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        burst[filled] = source.read();
        filled += 1;
        if filled == BURST_LEN {
            let generation = buffer.publish(&burst);
            trace!(task = TASK, generation, "Burst published");
            bus.set(ekg::TICK);
            filled = 0;
        }
    }
    info!(task = TASK, "Sampling task stopped");
}
