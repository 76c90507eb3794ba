//! Control instructions sent by the paired client

use crate::error::MonitorError;

/// A validated instruction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    WifiEnable = 0,
    WifiDisable = 1,
    StreamEnable = 2,
    StreamDisable = 3,
    TelemetryEnable = 4,
    TelemetryDisable = 5,
    SamplingStart = 6,
    SamplingStop = 7,
}

impl Instruction {
    pub const ALL: [Instruction; 8] = [
        Instruction::WifiEnable,
        Instruction::WifiDisable,
        Instruction::StreamEnable,
        Instruction::StreamDisable,
        Instruction::TelemetryEnable,
        Instruction::TelemetryDisable,
        Instruction::SamplingStart,
        Instruction::SamplingStop,
    ];

    /// Stable name used in log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Instruction::WifiEnable => "WIFI_ENABLE",
            Instruction::WifiDisable => "WIFI_DISABLE",
            Instruction::StreamEnable => "STREAM_ENABLE",
            Instruction::StreamDisable => "STREAM_DISABLE",
            Instruction::TelemetryEnable => "TELEMETRY_ENABLE",
            Instruction::TelemetryDisable => "TELEMETRY_DISABLE",
            Instruction::SamplingStart => "SAMPLING_START",
            Instruction::SamplingStop => "SAMPLING_STOP",
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Instruction {
    type Error = MonitorError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Instruction::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(MonitorError::InvalidInstruction { code })
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for instruction in Instruction::ALL {
            assert_eq!(Instruction::try_from(instruction.code()).ok(), Some(instruction));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = Instruction::try_from(8).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidInstruction { code: 8 }));
        assert!(Instruction::try_from(0xFF).is_err());
    }

    #[test]
    fn names_are_distinct() {
        let mut names: Vec<_> = Instruction::ALL.iter().map(|i| i.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Instruction::ALL.len());
        assert_eq!(Instruction::SamplingStart.to_string(), "SAMPLING_START");
    }
}
