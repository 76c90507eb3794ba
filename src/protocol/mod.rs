//! Wire protocol shared by the short-range link and its paired client
//!
//! Every frame is `0xFF 0xFF <kind> <body>` with a fixed body size per kind,
//! so the decoder never needs a length field. See [`codec`] for the layout of
//! each body.

mod assembler;
pub mod codec;
mod instruction;
mod message;

pub use assembler::FrameAssembler;
pub use codec::{Frame, HEADER_SIZE, MARKER, MAX_FRAME_SIZE, frame_len, pack, unpack};
pub use instruction::Instruction;
pub use message::{
    Configuration, Message, MessageKind, PATH_LEN, PSWD_LEN, SSID_LEN, SampleObservation,
    StreamTarget, TelemetryTarget, WifiCredentials,
};
