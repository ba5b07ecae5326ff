//! Embedded-side request framing.
//!
//! The serial driver hands over whatever bytes arrived since the last
//! poll. [`RequestAssembler`] buffers them, waits until the preamble's
//! count nibble says the frame is complete, then validates it.
//!
//! A rejected candidate yields exactly one [`AssembledRequest::Rejected`];
//! the bytes that follow are skipped silently until a valid request turns
//! up again, so line noise costs one error reply rather than dozens. A
//! candidate still waiting for bytes is also rejected as soon as a complete
//! valid request is buffered behind it.

use log::debug;

use crate::error::FrameError;
use crate::protocol::FRAME_MARKER;
use crate::protocol::codec::{RequestHeader, request_len};

/// Outcome of [`RequestAssembler::next_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledRequest {
    /// A request frame that passed validation.
    Valid { header: RequestHeader, frame: Vec<u8> },
    /// A candidate failed; `sequence` comes from its preamble.
    Rejected { sequence: u8, reason: FrameError },
}

#[derive(Debug, Default)]
pub struct RequestAssembler {
    buf: Vec<u8>,
    /// Start of the unconsumed bytes in `buf`.
    head: usize,
    resyncing: bool,
}

impl RequestAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Pop the next complete request, or `None` if more bytes are needed.
    pub fn next_request(&mut self) -> Option<AssembledRequest> {
        loop {
            // Skip anything that cannot be a preamble.
            let pending = &self.buf[self.head..];
            let Some(start) = pending.iter().position(|b| b & FRAME_MARKER != 0) else {
                self.buf.clear();
                self.head = 0;
                return None;
            };
            self.head += start;

            let pending = &self.buf[self.head..];
            let preamble = pending[0];
            let len = request_len((preamble & 0x0F) as usize);
            let verdict = if pending.len() < len {
                // A noise byte with the marker bit set can announce up to
                // 48 bytes. A complete request already buffered behind it
                // must not wait for those.
                match Self::later_request(pending) {
                    Some(skip) => Err((skip, FrameError::LengthMismatch)),
                    None => return None,
                }
            } else {
                RequestHeader::validate(&pending[..len])
                    .map_err(|reason| (1, reason))
            };

            match verdict {
                Ok(header) => {
                    self.resyncing = false;
                    let frame = pending[..len].to_vec();
                    self.head += len;
                    self.compact();
                    return Some(AssembledRequest::Valid { header, frame });
                }
                Err((skip, reason)) => {
                    self.head += skip;
                    if self.resyncing {
                        continue;
                    }
                    self.resyncing = true;
                    debug!("request rejected: {reason}");
                    return Some(AssembledRequest::Rejected {
                        sequence: (preamble >> 4) & 0x07,
                        reason,
                    });
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.resyncing = false;
    }

    /// Offset of the first complete, valid request after `pending[0]`.
    fn later_request(pending: &[u8]) -> Option<usize> {
        (1..pending.len()).find(|&at| {
            let rest = &pending[at..];
            let len = request_len((rest[0] & 0x0F) as usize);
            rest[0] & FRAME_MARKER != 0
                && rest.len() >= len
                && RequestHeader::validate(&rest[..len]).is_ok()
        })
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
