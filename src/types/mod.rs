//! Core value types shared across the monitor.
//!
//! - [`EventFlags`] is the event-bus word, with per-task groups in
//!   [`flag_groups`]
//! - [`StatusBits`] is the device status byte reported to the paired client
//! - [`Label`] is the class assigned to a detected beat

mod event_flags;
pub mod flag_groups;
mod label;
mod status;

pub use event_flags::EventFlags;
pub use label::Label;
pub use status::StatusBits;
