//! Controller service: request bytes in, response bytes out.
//!
//! ```text
//!  serial RX ──▶ RequestAssembler ──▶ validate ──▶ processor ──▶ ResponseBuilder ──▶ serial TX
//!                                        │
//!                                        └── rejected ──▶ error reply
//! ```
//!
//! The service owns the bank and the actuator port; nothing else mutates
//! channel state.

use log::{info, warn};

use crate::error::Error;
use crate::protocol::MAX_COMMANDS;
use crate::protocol::codec::{RequestHeader, ResponseBuilder, error_reply};
use crate::protocol::commands::RawCommand;

use super::bank::ActuatorBank;
use super::ports::ActuatorIo;
use super::processor::{CommandContext, process_command, reply_blocks};
use super::request::{AssembledRequest, RequestAssembler};

pub struct Controller<A: ActuatorIo> {
    bank: ActuatorBank,
    io: A,
    assembler: RequestAssembler,
    scanning: bool,
}

impl<A: ActuatorIo> Controller<A> {
    /// Build a controller for `channel_count` channels.
    ///
    /// Does **not** touch the hardware. Call [`init`](Self::init) next.
    pub fn new(channel_count: usize, io: A) -> Result<Self, Error> {
        Ok(Self {
            bank: ActuatorBank::new(channel_count)?,
            io,
            assembler: RequestAssembler::new(),
            scanning: false,
        })
    }

    /// Drive every channel to disabled / level 0.
    pub fn init(&mut self) {
        self.bank.init(&mut self.io);
        self.assembler.clear();
        info!("controller ready, {} channels", self.bank.len());
    }

    // ── Status ────────────────────────────────────────────────

    pub fn set_scanning(&mut self, scanning: bool) {
        if scanning != self.scanning {
            info!("MRI scanning {}", if scanning { "started" } else { "stopped" });
        }
        self.scanning = scanning;
    }

    pub fn scanning(&self) -> bool {
        self.scanning
    }

    pub fn bank(&self) -> &ActuatorBank {
        &self.bank
    }

    pub fn io(&self) -> &A {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut A {
        &mut self.io
    }

    // ── Request handling ──────────────────────────────────────

    /// Consume freshly received bytes; returns every reply they produced,
    /// concatenated in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.assembler.extend(bytes);
        let mut replies = Vec::new();
        while let Some(request) = self.assembler.next_request() {
            match request {
                AssembledRequest::Valid { header, frame } => {
                    replies.extend_from_slice(&self.execute(header, &frame));
                }
                AssembledRequest::Rejected { sequence, .. } => {
                    replies.extend_from_slice(&error_reply(sequence));
                }
            }
        }
        replies
    }

    /// Handle one complete request frame.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<u8> {
        match RequestHeader::validate(frame) {
            Ok(header) => self.execute(header, frame),
            Err(e) => {
                warn!("request rejected: {e}");
                let sequence = frame.first().map_or(0, |b| (b >> 4) & 0x07);
                error_reply(sequence)
            }
        }
    }

    fn execute(&mut self, header: RequestHeader, frame: &[u8]) -> Vec<u8> {
        let commands: heapless::Vec<RawCommand, MAX_COMMANDS> = header.blocks(frame).collect();
        let channels = self.bank.len();

        if let Some(bad) = commands.iter().find(|c| usize::from(c.address) > channels) {
            warn!("request {}: channel {} outside bank of {}", header.sequence, bad.address, channels);
            return error_reply(header.sequence);
        }
        let blocks: usize = commands.iter().map(|c| reply_blocks(c, channels)).sum();
        if blocks > MAX_COMMANDS {
            warn!("request {}: reply of {} blocks exceeds {}", header.sequence, blocks, MAX_COMMANDS);
            return error_reply(header.sequence);
        }

        let ctx = CommandContext {
            scanning: self.scanning,
        };
        let mut out = ResponseBuilder::new();
        for cmd in commands {
            process_command(&mut self.bank, &mut self.io, cmd, ctx, &mut out);
        }
        out.finish(header.sequence, self.scanning)
    }
}
