//! Values written by the short-range task and read by everyone else
//!
//! Each value is replaced wholesale through a `watch` channel, so a reader
//! always sees either the previous value or the new one, never a mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::classifier::TrainingSet;
use crate::detector::DetectorConfig;
use crate::protocol::{StreamTarget, TelemetryTarget, WifiCredentials};
use crate::types::StatusBits;

/// Process-wide shared state.
#[derive(Debug)]
pub struct SharedState {
    credentials: watch::Sender<WifiCredentials>,
    stream_target: watch::Sender<StreamTarget>,
    telemetry_target: watch::Sender<TelemetryTarget>,
    training_set: watch::Sender<Arc<TrainingSet>>,
    detector: watch::Sender<DetectorConfig>,
    status: watch::Sender<StatusBits>,
    lan_addr: AtomicU32,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl SharedState {
    pub fn new(detector: DetectorConfig) -> Self {
        Self {
            credentials: watch::Sender::new(WifiCredentials::default()),
            stream_target: watch::Sender::new(StreamTarget::default()),
            telemetry_target: watch::Sender::new(TelemetryTarget::default()),
            training_set: watch::Sender::new(Arc::new(TrainingSet::default())),
            detector: watch::Sender::new(detector),
            status: watch::Sender::new(StatusBits::default()),
            lan_addr: AtomicU32::new(0),
        }
    }

    pub fn credentials(&self) -> WifiCredentials {
        *self.credentials.borrow()
    }

    pub fn set_credentials(&self, credentials: WifiCredentials) {
        debug!(ssid = %credentials.ssid_str(), "Credentials updated");
        self.credentials.send_replace(credentials);
    }

    pub fn stream_target(&self) -> StreamTarget {
        *self.stream_target.borrow()
    }

    pub fn set_stream_target(&self, target: StreamTarget) {
        debug!(addr = %target.socket_addr(), path = %target.path_str(), "Stream target updated");
        self.stream_target.send_replace(target);
    }

    pub fn telemetry_target(&self) -> TelemetryTarget {
        *self.telemetry_target.borrow()
    }

    pub fn set_telemetry_target(&self, target: TelemetryTarget) {
        debug!(addr = %target.socket_addr(), "Telemetry target updated");
        self.telemetry_target.send_replace(target);
    }

    pub fn training_set(&self) -> Arc<TrainingSet> {
        Arc::clone(&self.training_set.borrow())
    }

    pub fn set_training_set(&self, set: TrainingSet) {
        debug!("Training set replaced");
        self.training_set.send_replace(Arc::new(set));
    }

    pub fn detector_config(&self) -> DetectorConfig {
        *self.detector.borrow()
    }

    pub fn set_detector_config(&self, config: DetectorConfig) {
        debug!(threshold = config.threshold, comparator = ?config.comparator, "Detector reconfigured");
        self.detector.send_replace(config);
    }

    pub fn status(&self) -> StatusBits {
        *self.status.borrow()
    }

    /// Set or clear one status bit. Subscribers are only woken on change.
    pub fn set_status_flag(&self, flag: u8, on: bool) {
        self.status.send_if_modified(|bits| {
            let next = if on { bits.0 | flag } else { bits.0 & !flag };
            let changed = next != bits.0;
            bits.0 = next;
            changed
        });
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusBits> {
        self.status.subscribe()
    }

    /// Address on the long-range network, 0 while disconnected.
    pub fn lan_addr(&self) -> u32 {
        self.lan_addr.load(Ordering::Acquire)
    }

    pub fn set_lan_addr(&self, addr: u32) {
        self.lan_addr.store(addr, Ordering::Release);
    }
}
