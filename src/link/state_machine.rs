//! Long-range connection state machine
//!
//! ```text
//!  Uninit --initialize--> Initialized --configure--> Configured
//!    ^                        |                        |  ^
//!    +--------unload----------+------------------------+  | stop
//!                                                start |  |
//!                                                      v  |
//!                 Connected <--on_associated-- Disconnected
//!                     |                          ^      |
//!                     +------on_link_lost--------+      +-- on_link_lost
//!                                                           (retry or give up)
//! ```
//!
//! Illegal calls fail with [`MonitorError::StateConflict`] and leave both the
//! state and the driver untouched. A driver error also leaves the state
//! where it was.

use tracing::{debug, info, warn};

use super::{Credentials, RadioDriver};
use crate::config::MAX_DEVICE_NAME_LEN;
use crate::{MonitorError, Result};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Uninit,
    Initialized,
    Configured,
    Disconnected,
    Connected,
}

/// Connectivity change reported to the owning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkNotification {
    /// Associated, with the assigned LAN address.
    Connected(u32),
    /// The link dropped, or association gave up.
    Disconnected,
}

/// Connection lifecycle over a [`RadioDriver`].
#[derive(Debug)]
pub struct LinkStateMachine<D> {
    driver: D,
    state: ConnectionState,
    hostname: String,
    credentials: Option<Credentials>,
    max_retries: u32,
    remaining_retries: u32,
    lan_addr: u32,
}

impl<D: RadioDriver> LinkStateMachine<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: ConnectionState::Uninit,
            hostname: String::new(),
            credentials: None,
            max_retries: 0,
            remaining_retries: 0,
            lan_addr: 0,
        }
    }

    /// Bring up the adapter under `hostname` (truncated to 32 bytes).
    pub fn initialize(&mut self, hostname: &str) -> Result<()> {
        self.require("initialize", &[ConnectionState::Uninit])?;
        let hostname = truncate(hostname, MAX_DEVICE_NAME_LEN);
        self.driver.init(hostname)?;
        self.hostname = hostname.to_string();
        self.transition(ConnectionState::Initialized);
        Ok(())
    }

    /// Store credentials and the re-association budget.
    pub fn configure(&mut self, credentials: Credentials, retries: u32) -> Result<()> {
        self.require("configure", &[ConnectionState::Initialized, ConnectionState::Configured])?;
        self.driver.configure(&credentials)?;
        self.credentials = Some(credentials);
        self.max_retries = retries;
        self.transition(ConnectionState::Configured);
        Ok(())
    }

    /// Start the radio and begin associating.
    ///
    /// If association cannot be started, a radio started by this call is
    /// stopped again and the state is left unchanged.
    pub fn start(&mut self) -> Result<()> {
        self.require("start", &[ConnectionState::Configured, ConnectionState::Disconnected])?;
        self.driver.start()?;
        if let Err(e) = self.driver.associate() {
            if self.state == ConnectionState::Configured {
                if let Err(stop) = self.driver.stop() {
                    warn!(error = %stop, "Couldn't stop radio after failed association");
                }
            }
            return Err(e);
        }
        self.remaining_retries = self.max_retries;
        self.transition(ConnectionState::Disconnected);
        Ok(())
    }

    /// Association succeeded with LAN address `addr`.
    pub fn on_associated(&mut self, addr: u32) -> Result<Option<LinkNotification>> {
        self.require("complete association", &[ConnectionState::Disconnected])?;
        self.lan_addr = addr;
        self.transition(ConnectionState::Connected);
        info!(addr = %std::net::Ipv4Addr::from(addr), "Associated");
        Ok(Some(LinkNotification::Connected(addr)))
    }

    /// The driver reported the link down, or an association attempt failed.
    pub fn on_link_lost(&mut self) -> Result<Option<LinkNotification>> {
        match self.state {
            ConnectionState::Connected => {
                self.lan_addr = 0;
                self.transition(ConnectionState::Disconnected);
                Ok(Some(LinkNotification::Disconnected))
            }
            ConnectionState::Disconnected if self.remaining_retries > 0 => {
                self.remaining_retries -= 1;
                warn!(remaining = self.remaining_retries, "Association failed, retrying");
                match self.driver.associate() {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        warn!(error = %e, "Re-association could not be started");
                        Ok(Some(LinkNotification::Disconnected))
                    }
                }
            }
            ConnectionState::Disconnected => {
                warn!("Association failed, retries exhausted");
                Ok(Some(LinkNotification::Disconnected))
            }
            state => Err(MonitorError::state_conflict("handle link loss", state)),
        }
    }

    /// Drop the current association. The state changes when the driver
    /// reports the loss.
    pub fn disconnect(&mut self) -> Result<()> {
        self.require("disconnect", &[ConnectionState::Connected])?;
        self.driver.disconnect()
    }

    /// Stop the radio, keeping its configuration.
    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", &[ConnectionState::Disconnected])?;
        self.driver.stop()?;
        self.transition(ConnectionState::Configured);
        Ok(())
    }

    /// Release the adapter entirely.
    pub fn unload(&mut self) -> Result<()> {
        self.require("unload", &[ConnectionState::Initialized, ConnectionState::Configured])?;
        self.driver.deinit()?;
        self.credentials = None;
        self.transition(ConnectionState::Uninit);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// LAN address while connected, otherwise 0.
    pub fn lan_addr(&self) -> u32 {
        if self.state == ConnectionState::Connected { self.lan_addr } else { 0 }
    }

    pub fn remaining_retries(&self) -> u32 {
        self.remaining_retries
    }

    /// Credentials in use, once configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        match self.state {
            ConnectionState::Uninit | ConnectionState::Initialized => None,
            _ => self.credentials.as_ref(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn require(&self, operation: &'static str, allowed: &[ConnectionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(MonitorError::state_conflict(operation, self.state))
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "Link state");
        self.state = next;
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockRadio, RadioCall};

    fn credentials() -> Credentials {
        Credentials::new("ward-4", "secret")
    }

    fn configured(retries: u32) -> LinkStateMachine<MockRadio> {
        let mut link = LinkStateMachine::new(MockRadio::new());
        link.initialize("EKG-ESP32").unwrap();
        link.configure(credentials(), retries).unwrap();
        link
    }

    fn connected(retries: u32) -> LinkStateMachine<MockRadio> {
        let mut link = configured(retries);
        link.start().unwrap();
        link.on_associated(0x0A00_0001).unwrap();
        link
    }

    #[test]
    fn happy_path() {
        let mut link = configured(3);
        assert_eq!(link.state(), ConnectionState::Configured);
        assert_eq!(link.credentials(), Some(&credentials()));

        link.start().unwrap();
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(link.remaining_retries(), 3);

        let note = link.on_associated(42).unwrap();
        assert_eq!(note, Some(LinkNotification::Connected(42)));
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.lan_addr(), 42);

        assert_eq!(
            link.driver().calls(),
            vec![
                RadioCall::Init("EKG-ESP32".to_string()),
                RadioCall::Configure(credentials()),
                RadioCall::Start,
                RadioCall::Associate,
            ]
        );
    }

    #[test]
    fn retries_are_consumed_then_reported() {
        let mut link = configured(2);
        link.start().unwrap();

        assert_eq!(link.on_link_lost().unwrap(), None);
        assert_eq!(link.remaining_retries(), 1);
        assert_eq!(link.on_link_lost().unwrap(), None);
        assert_eq!(link.remaining_retries(), 0);
        assert_eq!(link.on_link_lost().unwrap(), Some(LinkNotification::Disconnected));
        assert_eq!(link.state(), ConnectionState::Disconnected);

        let associations = link.driver().calls().iter().filter(|c| **c == RadioCall::Associate).count();
        assert_eq!(associations, 3);
    }

    #[test]
    fn zero_retries_reports_first_failure() {
        let mut link = configured(0);
        link.start().unwrap();
        assert_eq!(link.on_link_lost().unwrap(), Some(LinkNotification::Disconnected));
    }

    #[test]
    fn restart_refreshes_retry_budget() {
        let mut link = configured(1);
        link.start().unwrap();
        link.on_link_lost().unwrap();
        assert_eq!(link.remaining_retries(), 0);
        link.start().unwrap();
        assert_eq!(link.remaining_retries(), 1);
    }

    #[test]
    fn loss_while_connected_notifies_without_retry() {
        let mut link = connected(3);
        assert_eq!(link.on_link_lost().unwrap(), Some(LinkNotification::Disconnected));
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(link.lan_addr(), 0);
        assert_eq!(link.remaining_retries(), 3);
    }

    #[test]
    fn disconnect_then_stop() {
        let mut link = connected(3);
        link.disconnect().unwrap();
        assert_eq!(link.state(), ConnectionState::Connected);
        link.on_link_lost().unwrap();
        link.stop().unwrap();
        assert_eq!(link.state(), ConnectionState::Configured);
        link.unload().unwrap();
        assert_eq!(link.state(), ConnectionState::Uninit);
        assert_eq!(link.credentials(), None);
    }

    #[test]
    fn illegal_calls_conflict_without_touching_driver() {
        let mut link = LinkStateMachine::new(MockRadio::new());
        assert!(matches!(link.start(), Err(MonitorError::StateConflict { operation: "start", .. })));
        assert!(link.disconnect().is_err());
        assert!(link.stop().is_err());
        assert!(link.on_associated(1).is_err());
        assert!(link.on_link_lost().is_err());
        assert!(link.configure(credentials(), 1).is_err());
        assert!(link.unload().is_err());
        assert!(link.driver().calls().is_empty());
        assert_eq!(link.state(), ConnectionState::Uninit);

        let mut link = connected(1);
        let before = link.driver().calls().len();
        assert!(link.stop().is_err());
        assert!(link.start().is_err());
        assert!(link.initialize("again").is_err());
        assert!(link.unload().is_err());
        assert_eq!(link.driver().calls().len(), before);
        assert_eq!(link.state(), ConnectionState::Connected);
    }

    #[test]
    fn driver_failure_keeps_state() {
        let radio = MockRadio::new();
        radio.fail_on("configure");
        let mut link = LinkStateMachine::new(radio);
        link.initialize("EKG-ESP32").unwrap();
        let err = link.configure(credentials(), 1).unwrap_err();
        assert_eq!(err.kind(), "driver");
        assert_eq!(link.state(), ConnectionState::Initialized);
        assert_eq!(link.credentials(), None);
    }

    #[test]
    fn failed_association_start_rolls_back() {
        let mut link = configured(2);
        link.driver().fail_on("associate");
        let err = link.start().unwrap_err();
        assert_eq!(err.kind(), "driver");
        assert_eq!(link.state(), ConnectionState::Configured);
        assert_eq!(link.remaining_retries(), 0);
        assert_eq!(&link.driver().calls()[2..], &[RadioCall::Start, RadioCall::Stop]);
    }

    #[test]
    fn long_hostnames_are_truncated() {
        let mut link = LinkStateMachine::new(MockRadio::new());
        link.initialize(&"h".repeat(40)).unwrap();
        assert_eq!(link.hostname().len(), MAX_DEVICE_NAME_LEN);
    }
}
