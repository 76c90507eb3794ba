//! Device status word reported to the paired client

use serde::{Deserialize, Serialize};

/// Status bit-field carried by `Status` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatusBits(pub u8);

impl StatusBits {
    pub const WIFI_CONNECTED: u8 = 0x01;
    pub const STREAM_ENABLED: u8 = 0x02;
    pub const TELEMETRY_ENABLED: u8 = 0x04;
    pub const RELAY_ENABLED: u8 = 0x08;

    /// Create a new StatusBits from a raw byte.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific flag is set using a bitmask.
    pub const fn has_flag(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// Get the raw byte.
    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn wifi_connected(self) -> bool {
        self.has_flag(Self::WIFI_CONNECTED)
    }

    pub const fn stream_enabled(self) -> bool {
        self.has_flag(Self::STREAM_ENABLED)
    }

    pub const fn telemetry_enabled(self) -> bool {
        self.has_flag(Self::TELEMETRY_ENABLED)
    }

    pub const fn relay_enabled(self) -> bool {
        self.has_flag(Self::RELAY_ENABLED)
    }
}
