//! Beat classification labels

use serde::{Deserialize, Serialize};

/// Class assigned to a detected beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Label {
    /// No label won a strict majority.
    #[default]
    Unknown = 0,
    /// Normal sinus beat.
    Normal = 1,
    /// Atrial premature beat.
    Atrial = 2,
    /// Premature ventricular contraction.
    Ventricular = 3,
}

impl Label {
    /// Decode a wire byte. Out-of-range values map to `Unknown`.
    pub const fn from_byte(byte: u8) -> Label {
        match byte {
            1 => Label::Normal,
            2 => Label::Atrial,
            3 => Label::Ventricular,
            _ => Label::Unknown,
        }
    }

    /// Wire byte for this label.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}
