//! Host-side response reassembly.
//!
//! ```text
//!   read_available() ──► extend() ──► [ receive buffer ] ──► probe()
//!                                                             │
//!         ┌──────────────┬────────────────┬──────────────────┤
//!         ▼              ▼                ▼                  ▼
//!       None        Incomplete         Invalid           Valid(len)
//!   (< 2 bytes)   (wait for more)  (drop 1 byte)   take_frame() / decode()
//! ```
//!
//! Serial reads hand over arbitrary slices of the byte stream: part of a
//! frame, several frames, or line noise. Nothing is consumed until the
//! bytes present decide the outcome. The one exception: while a candidate
//! header waits for more bytes, a complete checksum-valid frame found
//! further on is taken and the candidate dropped, so a damaged byte
//! posing as a header cannot hold back the frames behind it.

use crate::error::FrameError;

use super::checksum::verify;
use super::codec::{Codec, DecodedResponse, is_response_marker, response_len};
use super::RESPONSE_HEADER_LEN;

/// Outcome of one [`Reassembler::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Fewer than two bytes buffered.
    None,
    /// A candidate frame is buffered but not complete.
    Incomplete,
    /// A checksum-valid frame of this length is at the head of the buffer.
    Valid(usize),
    /// The head of the buffer cannot start a frame; one byte was dropped.
    Invalid,
}

/// What [`Reassembler::next_event`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyEvent {
    /// A complete, checksum-valid response frame.
    Frame(Vec<u8>),
    /// A contiguous run of bytes was discarded before the next frame.
    Resynced { discarded: usize },
}

#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
    /// Start of the unconsumed bytes in `buf`; dropped bytes only move it.
    head: usize,
    /// Length of the validated frame at `head`.
    ready: Option<usize>,
    /// Bytes dropped since the last frame was handed out.
    discarded: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Bytes dropped so far that have not yet been reported.
    pub fn pending_discard(&self) -> usize {
        self.discarded
    }

    /// Classify the head of the receive buffer.
    ///
    /// A `Valid` result is sticky until the frame is taken.
    pub fn probe(&mut self) -> ProbeStatus {
        if let Some(len) = self.ready {
            return ProbeStatus::Valid(len);
        }
        let pending = &self.buf[self.head..];
        if pending.len() < 2 {
            return ProbeStatus::None;
        }
        let marker = pending[0];
        if marker != pending[1] || !is_response_marker(marker) {
            self.drop_bytes(1);
            return ProbeStatus::Invalid;
        }
        if pending.len() < RESPONSE_HEADER_LEN {
            return ProbeStatus::Incomplete;
        }
        let len = response_len(pending[2]);
        if pending.len() < len {
            // A damaged byte can pose as a header and claim a long frame.
            // A complete frame already buffered behind it wins.
            if let Some((skip, len)) = Self::later_frame(pending) {
                self.drop_bytes(skip);
                self.ready = Some(len);
                return ProbeStatus::Valid(len);
            }
            return ProbeStatus::Incomplete;
        }
        // Only the first byte goes: a corrupted count byte would otherwise
        // swallow the start of the following frame.
        if !verify(&pending[..len]) {
            self.drop_bytes(1);
            return ProbeStatus::Invalid;
        }
        self.ready = Some(len);
        ProbeStatus::Valid(len)
    }

    /// Remove and return the frame found by the last `Valid` probe.
    pub fn take_frame(&mut self) -> Option<Vec<u8>> {
        let len = self.ready.take()?;
        self.discarded = 0;
        let frame = self.buf[self.head..self.head + len].to_vec();
        self.head += len;
        self.compact();
        Some(frame)
    }

    /// Take the ready frame and decode it.
    pub fn decode(&mut self, codec: &Codec) -> Result<DecodedResponse, FrameError> {
        let frame = self.take_frame().ok_or(FrameError::Incomplete)?;
        codec.decode_response(&frame)
    }

    /// Probe until a frame or a resync report is available, or more input
    /// is needed.
    pub fn next_event(&mut self) -> Option<ReassemblyEvent> {
        loop {
            match self.probe() {
                ProbeStatus::Valid(_) if self.discarded > 0 => {
                    let discarded = core::mem::take(&mut self.discarded);
                    return Some(ReassemblyEvent::Resynced { discarded });
                }
                ProbeStatus::Valid(_) => return self.take_frame().map(ReassemblyEvent::Frame),
                ProbeStatus::Invalid => continue,
                ProbeStatus::None | ProbeStatus::Incomplete => return None,
            }
        }
    }

    /// Forget everything buffered (e.g. after a reconnect).
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.ready = None;
        self.discarded = 0;
    }

    /// First complete, checksum-valid frame starting after `pending[0]`,
    /// as `(offset, len)`.
    fn later_frame(pending: &[u8]) -> Option<(usize, usize)> {
        (1..pending.len().saturating_sub(RESPONSE_HEADER_LEN - 1)).find_map(|at| {
            let rest = &pending[at..];
            let marker = rest[0];
            if marker != rest[1] || !is_response_marker(marker) {
                return None;
            }
            let len = response_len(rest[2]);
            (rest.len() >= len && verify(&rest[..len])).then_some((at, len))
        })
    }

    fn drop_bytes(&mut self, n: usize) {
        self.head += n;
        self.discarded += n;
    }

    /// Release consumed bytes once they make up half the buffer.
    fn compact(&mut self) {
        if self.head == self.buf.len() {
            self.buf.clear();
            self.head = 0;
        } else if self.head * 2 >= self.buf.len() {
            self.buf.drain(..self.head);
            self.head = 0;
        }
    }
}
