//! Frame encoding and decoding for both link directions.
//!
//! Request frame (host → controller):
//! - PREAMBLE (1 byte): `1 sss cccc` marker, sequence, command count
//! - BLOCKS (3 bytes each): `[addr|ctl][level 11..6][level 5..0]`
//! - POSTAMBLE (1 byte): `sss 0000 1` sequence, status-ok
//! - CHECKSUM (1 byte): fletcher8 of everything before it
//!
//! Response frame (controller → host):
//! - HEADER (2 identical bytes): `1 1 00 t sss` markers, scanning, sequence
//! - COUNTS (1 byte): `rrrr pppp` response blocks, poll blocks
//! - BLOCKS: 3 bytes, plus 2 sensed bytes for each poll block
//! - CHECKSUM (1 byte)

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

use super::checksum::fletcher8;
use super::commands::{ChannelCommand, ChannelCommandSet, CommandFlags, RawCommand, SensedCurrent};
use super::convert::{CurrentScale, join_sensed};
use super::{
    CHECKSUM_LEN, CMD_LEN, FRAME_MARKER, MAX_COMMANDS, POST_LEN, POSTAMBLE_OK, PRE_LEN,
    RESPONSE_HEADER_LEN, RESPONSE_OK, SCANNING_BIT, SENSED_LEN, SEQUENCE_MODULUS,
};

/// Total length of a request frame carrying `count` commands.
pub const fn request_len(count: usize) -> usize {
    PRE_LEN + CMD_LEN * count + POST_LEN + CHECKSUM_LEN
}

/// Total length of a response frame announced by its count byte.
pub const fn response_len(count_byte: u8) -> usize {
    let responses = (count_byte >> 4) as usize;
    let polls = (count_byte & 0x0F) as usize;
    RESPONSE_HEADER_LEN + CMD_LEN * responses + SENSED_LEN * polls + CHECKSUM_LEN
}

/// Byte used for both response header positions.
pub const fn response_marker(sequence: u8, scanning: bool) -> u8 {
    let status = if scanning { SCANNING_BIT } else { 0 };
    FRAME_MARKER | RESPONSE_OK | status | (sequence % SEQUENCE_MODULUS)
}

/// `true` when `byte` carries both response marker bits.
pub const fn is_response_marker(byte: u8) -> bool {
    byte & (FRAME_MARKER | RESPONSE_OK) == FRAME_MARKER | RESPONSE_OK
}

/// A request frame whose framing has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub sequence: u8,
    pub count: usize,
}

impl RequestHeader {
    /// Check marker, length, sequence agreement and checksum of `frame`.
    pub fn validate(frame: &[u8]) -> Result<Self, FrameError> {
        let Some(&preamble) = frame.first() else {
            return Err(FrameError::Incomplete);
        };
        if preamble & FRAME_MARKER == 0 {
            return Err(FrameError::BadMarker);
        }
        let sequence = (preamble >> 4) & 0x07;
        let count = (preamble & 0x0F) as usize;
        let expected = request_len(count);
        if frame.len() < expected {
            return Err(FrameError::Incomplete);
        }
        if frame.len() > expected {
            return Err(FrameError::LengthMismatch);
        }
        let postamble = frame[expected - CHECKSUM_LEN - POST_LEN];
        if (postamble >> 5) & 0x07 != sequence {
            return Err(FrameError::SequenceMismatch);
        }
        if fletcher8(&frame[..expected - CHECKSUM_LEN]) != frame[expected - CHECKSUM_LEN] {
            return Err(FrameError::ChecksumMismatch);
        }
        Ok(Self { sequence, count })
    }

    /// The raw blocks of a frame that passed [`validate`](Self::validate).
    pub fn blocks<'a>(&self, frame: &'a [u8]) -> impl Iterator<Item = RawCommand> + 'a {
        frame[PRE_LEN..PRE_LEN + CMD_LEN * self.count]
            .chunks_exact(CMD_LEN)
            .map(|c| RawCommand::from_block([c[0], c[1], c[2]]))
    }
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRequest {
    pub sequence: u8,
    pub commands: Vec<ChannelCommand>,
}

/// A decoded response frame, as published to status consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedResponse {
    pub sequence: u8,
    /// Controller reported an MRI acquisition in progress.
    pub scanning: bool,
    pub commands: Vec<ChannelCommand>,
}

/// Builds a response frame block by block.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    body: Vec<u8>,
    responses: usize,
    polls: usize,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a 3-byte control block.
    pub fn push_control(&mut self, block: RawCommand) {
        self.body.extend_from_slice(&block.to_block());
        self.responses += 1;
    }

    /// Append a 5-byte poll block carrying a split sensed word.
    pub fn push_poll(&mut self, block: RawCommand, sensed_word: u16) {
        self.body.extend_from_slice(&block.to_block());
        self.body.extend_from_slice(&sensed_word.to_be_bytes());
        self.responses += 1;
        self.polls += 1;
    }

    pub fn responses(&self) -> usize {
        self.responses
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    /// Prepend the header and append the checksum.
    ///
    /// The caller keeps `responses()` within [`MAX_COMMANDS`]; larger
    /// replies cannot be described by the count nibble.
    pub fn finish(self, sequence: u8, scanning: bool) -> Vec<u8> {
        debug_assert!(self.responses <= MAX_COMMANDS);
        let marker = response_marker(sequence, scanning);
        let mut frame = Vec::with_capacity(RESPONSE_HEADER_LEN + self.body.len() + CHECKSUM_LEN);
        frame.push(marker);
        frame.push(marker);
        frame.push(((self.responses as u8) << 4) | (self.polls as u8 & 0x0F));
        frame.extend_from_slice(&self.body);
        frame.push(fletcher8(&frame));
        frame
    }
}

/// Reply sent for a request that failed validation.
pub fn error_reply(sequence: u8) -> Vec<u8> {
    let head = FRAME_MARKER | (sequence % SEQUENCE_MODULUS);
    let mut frame = vec![head, head, 0];
    frame.push(fletcher8(&frame));
    frame
}

/// Encoder/decoder bound to one current scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    scale: CurrentScale,
}

impl Codec {
    pub fn new(scale: CurrentScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> CurrentScale {
        self.scale
    }

    // ── Encode ────────────────────────────────────────────────

    /// Wire block for one host command. `update` is always asserted and
    /// the direction follows the sign of the commanded current.
    pub fn raw_command(&self, cmd: &ChannelCommand) -> RawCommand {
        let current = cmd.commanded_current_milliamp;
        RawCommand {
            address: cmd.channel,
            flags: CommandFlags {
                poll: cmd.poll,
                enable: cmd.enable,
                update: true,
                direction: CurrentScale::direction_of(current),
            },
            level: self.scale.milliamp_to_level(current),
        }
    }

    pub fn encode_command(&self, cmd: &ChannelCommand) -> [u8; CMD_LEN] {
        self.raw_command(cmd).to_block()
    }

    /// Frame `set` with sequence number `sequence` (taken mod 8).
    pub fn encode_set(&self, set: &ChannelCommandSet, sequence: u8) -> Vec<u8> {
        let sequence = sequence % SEQUENCE_MODULUS;
        let commands = if set.commands.len() > MAX_COMMANDS {
            warn!(
                "command set of {} truncated to {} commands",
                set.commands.len(),
                MAX_COMMANDS
            );
            &set.commands[..MAX_COMMANDS]
        } else {
            &set.commands[..]
        };

        let mut frame = Vec::with_capacity(request_len(commands.len()));
        frame.push(FRAME_MARKER | (sequence << 4) | commands.len() as u8);
        for cmd in commands {
            frame.extend_from_slice(&self.encode_command(cmd));
        }
        frame.push((sequence << 5) | POSTAMBLE_OK);
        frame.push(fletcher8(&frame));
        frame
    }

    /// Length of the reply a controller with `channel_count` channels will
    /// send for `set`.
    pub fn expected_response_len(&self, set: &ChannelCommandSet, channel_count: usize) -> usize {
        let mut len = RESPONSE_HEADER_LEN + CHECKSUM_LEN;
        for cmd in set.commands.iter().take(MAX_COMMANDS) {
            let fanout = if cmd.is_global() { channel_count } else { 1 };
            let block = if cmd.poll { CMD_LEN + SENSED_LEN } else { CMD_LEN };
            len += fanout * block;
        }
        len
    }

    // ── Decode ────────────────────────────────────────────────

    fn command_from_raw(&self, raw: RawCommand) -> ChannelCommand {
        ChannelCommand {
            channel: raw.address,
            poll: raw.flags.poll,
            enable: raw.flags.enable,
            update: raw.flags.update,
            direction: raw.flags.direction,
            commanded_current_milliamp: self.scale.level_to_milliamp(raw.level, raw.flags.direction),
            sensed: SensedCurrent::NotSampled,
        }
    }

    /// Decode the block at `*offset` (plus its sensed bytes when it is a
    /// poll) and advance the offset past it.
    pub fn decode_command(&self, bytes: &[u8], offset: &mut usize) -> Result<ChannelCommand, FrameError> {
        let start = *offset;
        let block = bytes.get(start..start + CMD_LEN).ok_or(FrameError::Malformed)?;
        let raw = RawCommand::from_block([block[0], block[1], block[2]]);
        let mut cmd = self.command_from_raw(raw);
        let mut next = start + CMD_LEN;

        if raw.flags.poll {
            let sensed = bytes.get(next..next + SENSED_LEN).ok_or(FrameError::Malformed)?;
            cmd.sensed = match join_sensed(sensed[0], sensed[1]) {
                Ok(level) => SensedCurrent::Milliamp(self.scale.sensed_to_milliamp(level)),
                Err(_) => SensedCurrent::NoValidSample,
            };
            next += SENSED_LEN;
        }

        *offset = next;
        Ok(cmd)
    }

    /// Decode a complete request frame.
    pub fn decode_request(&self, frame: &[u8]) -> Result<DecodedRequest, FrameError> {
        let header = RequestHeader::validate(frame)?;
        let commands = header.blocks(frame).map(|raw| self.command_from_raw(raw)).collect();
        Ok(DecodedRequest {
            sequence: header.sequence,
            commands,
        })
    }

    /// Decode a complete response frame. The frame is accepted or rejected
    /// as a unit.
    pub fn decode_response(&self, frame: &[u8]) -> Result<DecodedResponse, FrameError> {
        if frame.len() < RESPONSE_HEADER_LEN {
            return Err(FrameError::Incomplete);
        }
        let marker = frame[0];
        if marker != frame[1] || !is_response_marker(marker) {
            return Err(FrameError::BadMarker);
        }
        let counts = frame[2];
        let expected = response_len(counts);
        if frame.len() != expected {
            return Err(if frame.len() < expected {
                FrameError::Incomplete
            } else {
                FrameError::LengthMismatch
            });
        }
        let body_end = expected - CHECKSUM_LEN;
        if fletcher8(&frame[..body_end]) != frame[body_end] {
            return Err(FrameError::ChecksumMismatch);
        }

        let mut commands = Vec::with_capacity((counts >> 4) as usize);
        let mut offset = RESPONSE_HEADER_LEN;
        while offset < body_end {
            commands.push(self.decode_command(&frame[..body_end], &mut offset)?);
        }
        let polls = commands.iter().filter(|c| c.poll).count();
        if commands.len() != (counts >> 4) as usize || polls != (counts & 0x0F) as usize {
            return Err(FrameError::Malformed);
        }

        Ok(DecodedResponse {
            sequence: marker & 0x07,
            scanning: marker & SCANNING_BIT != 0,
            commands,
        })
    }
}
