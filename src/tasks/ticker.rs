//! Periodic tick sources for the stream and telemetry tasks

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::EventBus;
use crate::types::EventFlags;

/// Set `flag` every `period` until cancelled. The first tick fires one full
/// period after start.
pub(crate) async fn run(name: &'static str, period: Duration, flag: EventFlags, bus: EventBus, cancel: CancellationToken) {
    debug!(ticker = name, period_ms = period.as_millis() as u64, "Ticker started");
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => bus.set(flag),
        }
    }
    debug!(ticker = name, "Ticker stopped");
}
