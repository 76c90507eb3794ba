//! Frame packing and unpacking
//!
//! ## Frame Layout
//!
//! ```text
//! +------+------+------+----------------------------+
//! | 0xFF | 0xFF | kind | body (fixed size per kind) |
//! +------+------+------+----------------------------+
//! ```
//!
//! Multi-byte numbers are little-endian. Fixed-size string fields are copied
//! verbatim, NUL padded. Both directions are allocation-free and never
//! read or write outside the buffers they are given.

use tracing::trace;

use super::message::{
    Configuration, Message, MessageKind, PATH_LEN, PSWD_LEN, SSID_LEN, SampleObservation,
    StreamTarget, TelemetryTarget, WifiCredentials,
};
use crate::classifier::{TrainingPoint, TrainingSet};
use crate::error::CodecError;
use crate::types::{Label, StatusBits};

/// Sentinel byte repeated twice at the start of every frame.
pub const MARKER: u8 = 0xFF;
/// Marker pair plus kind byte.
pub const HEADER_SIZE: usize = 3;
/// Largest possible frame (a training set).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MessageKind::TrainingSet.body_size();

/// A packed frame with fixed capacity.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; MAX_FRAME_SIZE],
    len: usize,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.len).field("bytes", &self.as_bytes()).finish()
    }
}

impl Message {
    /// Pack into an owned fixed-capacity frame.
    pub fn to_frame(&self) -> Frame {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = pack(self, &mut buf);
        Frame { buf, len }
    }
}

/// Serialize `message` into `buf`, returning the number of bytes written.
pub fn pack(message: &Message, buf: &mut [u8; MAX_FRAME_SIZE]) -> usize {
    let kind = message.kind();
    buf[0] = MARKER;
    buf[1] = MARKER;
    buf[2] = kind as u8;

    let mut w = Writer { buf: &mut buf[HEADER_SIZE..], pos: 0 };
    match message {
        Message::Status { status, addr } => {
            w.u8(status.value());
            w.u32(*addr);
        }
        Message::WifiCredentials(creds) => {
            w.bytes(&creds.ssid);
            w.bytes(&creds.pswd);
        }
        Message::StreamTarget(target) => {
            w.u32(target.addr);
            w.u16(target.port);
            w.bytes(&target.path);
        }
        Message::TelemetryTarget(target) => {
            w.u32(target.addr);
            w.u16(target.port);
        }
        Message::TrainingSet(set) => {
            for class in [&set.normal[..], &set.atrial[..], &set.ventricular[..]] {
                class.iter().for_each(|p| w.u16(p.period));
                class.iter().for_each(|p| w.u16(p.amplitude));
            }
        }
        Message::SampleObservation(obs) => {
            w.u8(obs.label.as_byte());
            w.u16(obs.amplitude);
            w.u16(obs.period);
        }
        Message::Instruction(code) => w.u8(*code),
        Message::Configuration(config) => {
            w.u8(config.comparator);
            w.u16(config.threshold);
        }
    }
    debug_assert_eq!(w.pos, kind.body_size());

    let len = HEADER_SIZE + w.pos;
    trace!(?kind, len, "Packed frame");
    len
}

/// Decode one frame from the start of `bytes`. Trailing bytes are ignored.
pub fn unpack(bytes: &[u8]) -> Result<Message, CodecError> {
    let kind = parse_header(bytes)?;
    let needed = HEADER_SIZE + kind.body_size();
    if bytes.len() < needed {
        return Err(CodecError::TooShort { needed, available: bytes.len() });
    }

    let mut r = Reader { buf: &bytes[HEADER_SIZE..needed], pos: 0 };
    let message = match kind {
        MessageKind::Status => {
            let status = StatusBits::new(r.u8());
            Message::Status { status, addr: r.u32() }
        }
        MessageKind::WifiCredentials => {
            let mut creds = WifiCredentials::default();
            r.bytes(&mut creds.ssid);
            r.bytes(&mut creds.pswd);
            Message::WifiCredentials(creds)
        }
        MessageKind::StreamTarget => {
            let mut target = StreamTarget { addr: r.u32(), port: r.u16(), ..Default::default() };
            r.bytes(&mut target.path);
            Message::StreamTarget(target)
        }
        MessageKind::TelemetryTarget => {
            Message::TelemetryTarget(TelemetryTarget { addr: r.u32(), port: r.u16() })
        }
        MessageKind::TrainingSet => {
            let mut set = TrainingSet::default();
            read_points(&mut r, &mut set.normal);
            read_points(&mut r, &mut set.atrial);
            read_points(&mut r, &mut set.ventricular);
            Message::TrainingSet(set)
        }
        MessageKind::SampleObservation => Message::SampleObservation(SampleObservation {
            label: Label::from_byte(r.u8()),
            amplitude: r.u16(),
            period: r.u16(),
        }),
        MessageKind::Instruction => Message::Instruction(r.u8()),
        MessageKind::Configuration => {
            Message::Configuration(Configuration { comparator: r.u8(), threshold: r.u16() })
        }
    };
    Ok(message)
}

/// Total frame length announced by the header at the start of `bytes`.
///
/// `None` if the header is incomplete, the markers are wrong, or the kind is
/// unknown.
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    parse_header(bytes).ok().map(|kind| HEADER_SIZE + kind.body_size())
}

pub(crate) fn parse_header(bytes: &[u8]) -> Result<MessageKind, CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::TooShort { needed: HEADER_SIZE, available: bytes.len() });
    }
    if bytes[0] != MARKER || bytes[1] != MARKER {
        return Err(CodecError::BadMarker { found: u16::from_be_bytes([bytes[0], bytes[1]]) });
    }
    MessageKind::from_byte(bytes[2]).ok_or(CodecError::UnknownKind { kind: bytes[2] })
}

// Periods for the whole class first, then amplitudes
fn read_points(r: &mut Reader<'_>, points: &mut [TrainingPoint]) {
    points.iter_mut().for_each(|p| p.period = r.u16());
    points.iter_mut().for_each(|p| p.amplitude = r.u16());
}

// Callers size the slices from the kind's body size, so indexing is in bounds
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn bytes(&mut self, src: &[u8]) {
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn bytes(&mut self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.buf[self.pos..self.pos + dst.len()]);
        self.pos += dst.len();
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let mut b = [0u8; 2];
        self.bytes(&mut b);
        u16::from_le_bytes(b)
    }

    fn u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.bytes(&mut b);
        u32::from_le_bytes(b)
    }
}

const _: () = assert!(MAX_FRAME_SIZE == 163);
const _: () = assert!(MessageKind::WifiCredentials.body_size() == SSID_LEN + PSWD_LEN);
const _: () = assert!(MessageKind::StreamTarget.body_size() == 6 + PATH_LEN);
