//! Typed messages exchanged over both transports

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::classifier::TrainingSet;
use crate::detector::{Comparator, DetectorConfig};
use crate::types::{Label, StatusBits};

/// Capacity of the SSID field.
pub const SSID_LEN: usize = 32;
/// Capacity of the password field.
pub const PSWD_LEN: usize = 64;
/// Capacity of the stream path field.
pub const PATH_LEN: usize = 64;

/// Discriminant byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Status = 0,
    WifiCredentials = 1,
    StreamTarget = 2,
    TelemetryTarget = 3,
    TrainingSet = 4,
    SampleObservation = 5,
    Instruction = 6,
    Configuration = 7,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::Status,
        MessageKind::WifiCredentials,
        MessageKind::StreamTarget,
        MessageKind::TelemetryTarget,
        MessageKind::TrainingSet,
        MessageKind::SampleObservation,
        MessageKind::Instruction,
        MessageKind::Configuration,
    ];

    pub const fn from_byte(byte: u8) -> Option<MessageKind> {
        match byte {
            0 => Some(MessageKind::Status),
            1 => Some(MessageKind::WifiCredentials),
            2 => Some(MessageKind::StreamTarget),
            3 => Some(MessageKind::TelemetryTarget),
            4 => Some(MessageKind::TrainingSet),
            5 => Some(MessageKind::SampleObservation),
            6 => Some(MessageKind::Instruction),
            7 => Some(MessageKind::Configuration),
            _ => None,
        }
    }

    /// Fixed body size in bytes.
    pub const fn body_size(self) -> usize {
        match self {
            MessageKind::Status => 1 + 4,
            MessageKind::WifiCredentials => SSID_LEN + PSWD_LEN,
            MessageKind::StreamTarget => 4 + 2 + PATH_LEN,
            MessageKind::TelemetryTarget => 4 + 2,
            MessageKind::TrainingSet => 2 * 2 * crate::classifier::TRAINING_POINTS,
            MessageKind::SampleObservation => 1 + 2 + 2,
            MessageKind::Instruction => 1,
            MessageKind::Configuration => 1 + 2,
        }
    }
}

/// Long-range network credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: [u8; SSID_LEN],
    pub pswd: [u8; PSWD_LEN],
}

impl Default for WifiCredentials {
    fn default() -> Self {
        Self { ssid: [0; SSID_LEN], pswd: [0; PSWD_LEN] }
    }
}

impl WifiCredentials {
    /// Build credentials from strings, truncating to field capacity.
    pub fn new(ssid: &str, pswd: &str) -> Self {
        let mut creds = Self::default();
        copy_truncated(&mut creds.ssid, ssid.as_bytes());
        copy_truncated(&mut creds.pswd, pswd.as_bytes());
        creds
    }

    /// SSID up to the first NUL byte.
    pub fn ssid_str(&self) -> String {
        nul_terminated(&self.ssid)
    }

    /// Password up to the first NUL byte.
    pub fn pswd_str(&self) -> String {
        nul_terminated(&self.pswd)
    }
}

/// Remote endpoint the stream task reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTarget {
    pub addr: u32,
    pub port: u16,
    pub path: [u8; PATH_LEN],
}

impl Default for StreamTarget {
    fn default() -> Self {
        Self { addr: 0, port: 0, path: [0; PATH_LEN] }
    }
}

impl StreamTarget {
    pub fn new(addr: Ipv4Addr, port: u16, path: &str) -> Self {
        let mut target = Self { addr: u32::from(addr), port, path: [0; PATH_LEN] };
        copy_truncated(&mut target.path, path.as_bytes());
        target
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(self.addr), self.port)
    }

    /// Request path up to the first NUL byte.
    pub fn path_str(&self) -> String {
        nul_terminated(&self.path)
    }
}

/// Remote endpoint the telemetry task writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryTarget {
    pub addr: u32,
    pub port: u16,
}

impl TelemetryTarget {
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr: u32::from(addr), port }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(self.addr), self.port)
    }
}

/// One classified beat relayed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleObservation {
    pub label: Label,
    pub amplitude: u16,
    /// RR interval in milliseconds.
    pub period: u16,
}

/// Detector tuning as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Configuration {
    pub comparator: u8,
    pub threshold: u16,
}

impl Configuration {
    /// Detector settings, or `None` if the comparator byte is unknown.
    pub fn detector_config(&self) -> Option<DetectorConfig> {
        let comparator = Comparator::from_byte(self.comparator)?;
        Some(DetectorConfig { threshold: self.threshold, comparator })
    }
}

impl From<DetectorConfig> for Configuration {
    fn from(config: DetectorConfig) -> Self {
        Self { comparator: config.comparator.as_byte(), threshold: config.threshold }
    }
}

/// A protocol message. The wire size is fully determined by the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Status { status: StatusBits, addr: u32 },
    WifiCredentials(WifiCredentials),
    StreamTarget(StreamTarget),
    TelemetryTarget(TelemetryTarget),
    TrainingSet(TrainingSet),
    SampleObservation(SampleObservation),
    /// Raw instruction code; validated when dispatched.
    Instruction(u8),
    Configuration(Configuration),
}

impl Message {
    pub const fn kind(&self) -> MessageKind {
        match self {
            Message::Status { .. } => MessageKind::Status,
            Message::WifiCredentials(_) => MessageKind::WifiCredentials,
            Message::StreamTarget(_) => MessageKind::StreamTarget,
            Message::TelemetryTarget(_) => MessageKind::TelemetryTarget,
            Message::TrainingSet(_) => MessageKind::TrainingSet,
            Message::SampleObservation(_) => MessageKind::SampleObservation,
            Message::Instruction(_) => MessageKind::Instruction,
            Message::Configuration(_) => MessageKind::Configuration,
        }
    }
}

fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn nul_terminated(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}
