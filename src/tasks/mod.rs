//! Long-running tasks spawned by [`Monitor`](crate::monitor::Monitor)
//!
//! Each task owns one flag group on the [`EventBus`](crate::bus::EventBus)
//! and runs until the shared cancellation token fires.
//!
//! - `short_range`: paired-client link, both IPC queues
//! - `long_range`: radio association and its fan-out
//! - `sampling` / `ekg`: acquisition and beat classification
//! - `stream` / `telemetry`: network sessions over the long-range link
//! - `ticker`: periodic `TICK` sources

pub(crate) mod ekg;
pub(crate) mod long_range;
pub(crate) mod sampling;
pub(crate) mod short_range;
mod status;
pub(crate) mod stream;
pub(crate) mod telemetry;
pub(crate) mod ticker;

pub use short_range::ShortRangeIngress;
pub use status::dispatch_status;
