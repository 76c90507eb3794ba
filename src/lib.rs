//! Control core for a wearable EKG monitor.
//!
//! Heartlink relays classified heartbeats from an analog front end to a
//! paired client over a short-range radio link, and optionally streams data
//! and telemetry over a long-range network link.
//!
//! # Features
//!
//! - **Wire protocol**: fixed-size framed messages with a resynchronising
//!   reassembler
//! - **Beat classification**: threshold peak detection and weighted k-NN
//!   against a client-supplied training set
//! - **Link management**: association retries, reconnects and fan-out of
//!   link state to the network tasks
//! - **Hardware seams**: radios, sockets and the sampler are traits, so the
//!   core runs against real drivers or the in-memory mocks in `test_utils`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heartlink::{Drivers, Monitor, MonitorConfig, TcpTransport};
//! # use heartlink::{Credentials, RadioDriver, SampleSource, ShortRangeLink};
//! # struct Ble; struct Radio; struct Adc;
//! # #[async_trait::async_trait]
//! # impl ShortRangeLink for Ble {
//! #     fn mtu(&self) -> usize { 163 }
//! #     async fn send(&mut self, _: &[u8]) -> heartlink::Result<()> { Ok(()) }
//! # }
//! # impl RadioDriver for Radio {
//! #     fn init(&mut self, _: &str) -> heartlink::Result<()> { Ok(()) }
//! #     fn configure(&mut self, _: &Credentials) -> heartlink::Result<()> { Ok(()) }
//! #     fn start(&mut self) -> heartlink::Result<()> { Ok(()) }
//! #     fn associate(&mut self) -> heartlink::Result<()> { Ok(()) }
//! #     fn disconnect(&mut self) -> heartlink::Result<()> { Ok(()) }
//! #     fn stop(&mut self) -> heartlink::Result<()> { Ok(()) }
//! #     fn deinit(&mut self) -> heartlink::Result<()> { Ok(()) }
//! # }
//! # impl SampleSource for Adc { fn read(&mut self) -> u16 { 0 } }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     heartlink::init_logging();
//!     let config = MonitorConfig::from_file("heartlink.yaml")?;
//!     let (_events_tx, radio_events) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let handle = Monitor::spawn(config, Drivers {
//!         short_range: Ble,
//!         radio: Radio,
//!         radio_events,
//!         net: Arc::new(TcpTransport::default()),
//!         sampler: Adc,
//!     })?;
//!
//!     // Feed radio callbacks through the ingress handle
//!     let ingress = handle.ingress();
//!     ingress.connected();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire format and primitives
pub mod bus;
pub mod http;
pub mod ipc;
pub mod protocol;
pub mod sample_buffer;
pub mod shared;

// Signal processing
pub mod classifier;
pub mod detector;

// Links and runtime
pub mod config;
pub mod link;
pub mod monitor;
pub mod tasks;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use bus::EventBus;
pub use classifier::{Classifier, TrainingPoint, TrainingSet};
pub use config::MonitorConfig;
pub use detector::{Beat, Comparator, DetectorConfig};
pub use link::{ConnectionState, Credentials, DriverEvent, RadioDriver};
pub use monitor::{Drivers, Monitor, MonitorHandle};
pub use protocol::{Message, MessageKind};
pub use shared::SharedState;
pub use tasks::ShortRangeIngress;
pub use transport::{NetConnection, NetTransport, SampleSource, ShortRangeLink, TcpTransport};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
