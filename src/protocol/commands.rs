//! Channel commands, command sets and their bit-packed building blocks.
//!
//! [`ChannelCommand`] is the host-side view (currents in milliamps);
//! [`RawCommand`] is the wire view (4-bit address, control nibble, 12-bit
//! level) that the controller consumes directly.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CMD_LEN, GLOBAL_ADDR, SIX_BITS};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// H-bridge drive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Current flows from Load_P to Load_N.
    Positive,
    /// Current flows from Load_N to Load_P.
    #[default]
    Negative,
}

impl Direction {
    pub const fn from_bit(bit: bool) -> Self {
        if bit { Self::Positive } else { Self::Negative }
    }

    pub const fn bit(self) -> bool {
        matches!(self, Self::Positive)
    }
}

// ---------------------------------------------------------------------------
// Control nibble
// ---------------------------------------------------------------------------

/// The 4-bit control field of a command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags {
    pub poll: bool,
    pub enable: bool,
    pub update: bool,
    pub direction: Direction,
}

impl CommandFlags {
    pub const POLL_BIT: u8 = 0;
    pub const ENABLE_BIT: u8 = 1;
    pub const UPDATE_BIT: u8 = 2;
    pub const DIR_BIT: u8 = 3;

    /// Unpack the low nibble of `byte`.
    pub const fn from_nibble(byte: u8) -> Self {
        Self {
            poll: (byte >> Self::POLL_BIT) & 1 == 1,
            enable: (byte >> Self::ENABLE_BIT) & 1 == 1,
            update: (byte >> Self::UPDATE_BIT) & 1 == 1,
            direction: Direction::from_bit((byte >> Self::DIR_BIT) & 1 == 1),
        }
    }

    pub const fn to_nibble(self) -> u8 {
        (self.poll as u8) << Self::POLL_BIT
            | (self.enable as u8) << Self::ENABLE_BIT
            | (self.update as u8) << Self::UPDATE_BIT
            | (self.direction.bit() as u8) << Self::DIR_BIT
    }
}

// ---------------------------------------------------------------------------
// Wire-level command block
// ---------------------------------------------------------------------------

/// One 3-byte command (or response) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCommand {
    /// 0 = all channels, k = physical channel k-1.
    pub address: u8,
    pub flags: CommandFlags,
    /// 12-bit DAC level.
    pub level: u16,
}

impl RawCommand {
    pub fn is_global(&self) -> bool {
        self.address == GLOBAL_ADDR
    }

    /// Pack into `[addr|ctl, level 11..6, level 5..0]`.
    pub fn to_block(&self) -> [u8; CMD_LEN] {
        [
            (self.address & 0x0F) << 4 | self.flags.to_nibble(),
            (self.level >> 6) as u8 & SIX_BITS,
            self.level as u8 & SIX_BITS,
        ]
    }

    /// Unpack a block; reserved high bits of the level bytes are ignored.
    pub fn from_block(block: [u8; CMD_LEN]) -> Self {
        Self {
            address: block[0] >> 4,
            flags: CommandFlags::from_nibble(block[0]),
            level: u16::from(block[1] & SIX_BITS) << 6 | u16::from(block[2] & SIX_BITS),
        }
    }
}

// ---------------------------------------------------------------------------
// Host-side command
// ---------------------------------------------------------------------------

/// Sensed current attached to a decoded poll response.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SensedCurrent {
    /// The block carried no sensed reading (not a poll).
    #[default]
    NotSampled,
    /// The controller could not obtain a valid ADC sample.
    NoValidSample,
    /// Measured coil current magnitude.
    Milliamp(f64),
}

impl SensedCurrent {
    /// The reading in milliamps, if one was actually measured.
    pub fn milliamp(&self) -> Option<f64> {
        match self {
            Self::Milliamp(ma) => Some(*ma),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Milliamp(_))
    }
}

/// One channel command as seen by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelCommand {
    /// 0 = broadcast, 1..N = specific channel.
    pub channel: u8,
    pub poll: bool,
    pub enable: bool,
    pub update: bool,
    pub direction: Direction,
    pub commanded_current_milliamp: f64,
    pub sensed: SensedCurrent,
}

impl ChannelCommand {
    /// Drive `channel` at `milliamp` (sign selects direction).
    pub fn drive(channel: u8, milliamp: f64) -> Self {
        Self {
            channel,
            enable: true,
            update: true,
            direction: super::convert::CurrentScale::direction_of(milliamp),
            commanded_current_milliamp: milliamp,
            ..Self::default()
        }
    }

    /// Read back `channel` without altering it.
    pub fn poll(channel: u8) -> Self {
        Self {
            channel,
            poll: true,
            ..Self::default()
        }
    }

    /// Switch `channel` off and zero its commanded level.
    pub fn disable(channel: u8) -> Self {
        Self {
            channel,
            update: true,
            ..Self::default()
        }
    }

    pub fn is_global(&self) -> bool {
        self.channel == GLOBAL_ADDR
    }
}

// ---------------------------------------------------------------------------
// Command set
// ---------------------------------------------------------------------------

/// An ordered group of commands sent as one frame, followed by a pause
/// before the next set may be sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelCommandSet {
    pub commands: Vec<ChannelCommand>,
    pub delay: Duration,
}

impl ChannelCommandSet {
    pub fn new(commands: Vec<ChannelCommand>, delay: Duration) -> Self {
        Self { commands, delay }
    }

    /// Global disable at zero current.
    pub fn reset() -> Self {
        Self::new(vec![ChannelCommand::disable(GLOBAL_ADDR)], Duration::ZERO)
    }

    /// Global poll of every channel.
    pub fn poll_all() -> Self {
        Self::new(vec![ChannelCommand::poll(GLOBAL_ADDR)], Duration::ZERO)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
