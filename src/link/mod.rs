//! Long-range radio link: driver seam and connection state machine

mod state_machine;

pub use state_machine::{ConnectionState, LinkNotification, LinkStateMachine};

use crate::Result;
use crate::protocol::WifiCredentials;

/// Network credentials handed to the radio driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self { ssid: ssid.into(), password: password.into() }
    }
}

impl From<&WifiCredentials> for Credentials {
    fn from(creds: &WifiCredentials) -> Self {
        Self { ssid: creds.ssid_str(), password: creds.pswd_str() }
    }
}

/// Asynchronous completion reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// Association finished with this LAN address.
    Associated(u32),
    /// Association failed, or an established link dropped.
    LinkLost,
}

/// Low-level long-range radio operations.
///
/// Calls return once the request is accepted. Association results arrive
/// later as [`DriverEvent`]s on the channel handed to the monitor.
pub trait RadioDriver: Send + 'static {
    fn init(&mut self, hostname: &str) -> Result<()>;
    fn configure(&mut self, credentials: &Credentials) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn associate(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn deinit(&mut self) -> Result<()>;
}
