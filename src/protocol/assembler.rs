//! Reassembly of frames split across IPC chunks
//!
//! The inbound channel carries at most [`IPC_PAYLOAD_SIZE`] bytes per
//! message, so a training-set frame arrives in two pieces. The assembler
//! buffers chunks until a whole frame is present and hands complete frames
//! to the caller in arrival order.
//!
//! A chunk shorter than the chunk maximum closes the current write. Anything
//! still incomplete at that point can never be completed and is reported as
//! [`CodecError::TooShort`]. After a bad marker or unknown kind the assembler
//! skips ahead to the next `0xFF 0xFF` pair.

use tracing::trace;

use super::codec::{HEADER_SIZE, MARKER, MAX_FRAME_SIZE, parse_header, unpack};
use super::message::Message;
use crate::error::CodecError;
use crate::ipc::IPC_PAYLOAD_SIZE;

const CAPACITY: usize = MAX_FRAME_SIZE + IPC_PAYLOAD_SIZE;

/// Incremental frame decoder for chunked input.
#[derive(Clone)]
pub struct FrameAssembler {
    buf: [u8; CAPACITY],
    len: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAssembler").field("pending", &self.len).finish()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self { buf: [0; CAPACITY], len: 0 }
    }

    /// Bytes buffered towards an incomplete frame.
    pub fn pending(&self) -> usize {
        self.len
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Feed one chunk, calling `on_frame` for every decoded frame or error.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_frame: F)
    where
        F: FnMut(Result<Message, CodecError>),
    {
        let mut last_piece = 0;
        for piece in chunk.chunks(IPC_PAYLOAD_SIZE) {
            self.buf[self.len..self.len + piece.len()].copy_from_slice(piece);
            self.len += piece.len();
            self.extract(&mut on_frame);
            last_piece = piece.len();
        }

        if last_piece < IPC_PAYLOAD_SIZE && self.len > 0 {
            let needed = parse_header(&self.buf[..self.len])
                .map(|kind| HEADER_SIZE + kind.body_size())
                .unwrap_or(HEADER_SIZE);
            trace!(pending = self.len, needed, "Write ended mid-frame");
            on_frame(Err(CodecError::TooShort { needed, available: self.len }));
            self.len = 0;
        }
    }

    fn extract<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(Result<Message, CodecError>),
    {
        while self.len >= HEADER_SIZE {
            match parse_header(&self.buf[..self.len]) {
                Ok(kind) => {
                    let total = HEADER_SIZE + kind.body_size();
                    if self.len < total {
                        return;
                    }
                    on_frame(unpack(&self.buf[..total]));
                    self.consume(total);
                }
                Err(err) => {
                    on_frame(Err(err));
                    let skip = self.resync_offset();
                    self.consume(skip);
                }
            }
        }
    }

    // Offset of the next candidate marker pair after position 0. A lone
    // trailing marker byte is kept since its partner may still arrive.
    fn resync_offset(&self) -> usize {
        let data = &self.buf[..self.len];
        (1..data.len())
            .find(|&i| data[i] == MARKER && data.get(i + 1).is_none_or(|&b| b == MARKER))
            .unwrap_or(data.len())
    }

    fn consume(&mut self, n: usize) {
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }
}
