//! R-peak detection over one sampling burst

use serde::{Deserialize, Serialize};

/// Default threshold at or over which a reading counts as an R peak.
pub const DEFAULT_PEAK_THRESHOLD: u16 = 2450;

/// Threshold at or under which a reading counts as an R dip.
pub const DEFAULT_DIP_THRESHOLD: u16 = 930;

/// Direction in which a sample must cross the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// `sample >= threshold`
    #[default]
    Above,
    /// `sample <= threshold`
    Below,
}

impl Comparator {
    /// Decode the wire byte used by `Configuration` messages.
    pub const fn from_byte(byte: u8) -> Option<Comparator> {
        match byte {
            0 => Some(Comparator::Above),
            1 => Some(Comparator::Below),
            _ => None,
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Comparator::Above => 0,
            Comparator::Below => 1,
        }
    }

    /// Whether `sample` crosses `threshold` in this direction.
    pub const fn crosses(self, sample: u16, threshold: u16) -> bool {
        match self {
            Comparator::Above => sample >= threshold,
            Comparator::Below => sample <= threshold,
        }
    }
}

/// Runtime-tunable detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub threshold: u16,
    pub comparator: Comparator,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { threshold: DEFAULT_PEAK_THRESHOLD, comparator: Comparator::Above }
    }
}

/// Features of one detected beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    /// Index of the first crossing.
    pub first: usize,
    /// Index of the second crossing.
    pub second: usize,
    /// `(second - first) * sample period`, in milliseconds, saturating.
    pub rr_interval: u16,
    /// Sample value at the second crossing.
    pub amplitude: u16,
}

/// Find the first two threshold crossings in `samples`.
///
/// Returns `None` when either scan reaches the end of the burst, so a
/// partial beat is never reported.
pub fn detect_beat(samples: &[u16], config: &DetectorConfig, period_ms: u32) -> Option<Beat> {
    let crossing = |s: &u16| config.comparator.crosses(*s, config.threshold);

    let first = samples.iter().position(crossing)?;
    let second = first + 1 + samples[first + 1..].iter().position(crossing)?;

    let rr = (second - first) as u64 * u64::from(period_ms);
    Some(Beat {
        first,
        second,
        rr_interval: rr.min(u64::from(u16::MAX)) as u16,
        amplitude: samples[second],
    })
}
