//! Wire protocol shared by the host and the coil controller.
//!
//! ```text
//!  Request (host → controller)
//!  ┌──────────┬──────────────────────┬───────────┬──────────┐
//!  │ 1sss cccc│ N × [addr|ctl][hi][lo]│ sss0 0001 │ fletcher │
//!  └──────────┴──────────────────────┴───────────┴──────────┘
//!
//!  Response (controller → host)
//!  ┌──────────┬──────────┬──────────┬──────────────────────────┬──────────┐
//!  │ 1100 tsss│ 1100 tsss│ rrrr pppp│ r × 3B blocks (+2B polls) │ fletcher │
//!  └──────────┴──────────┴──────────┴──────────────────────────┴──────────┘
//! ```
//!
//! Level bytes keep their top two bits clear. Address bytes and
//! postambles do not, so resynchronization relies on the checksum rather
//! than on markers alone.

pub mod checksum;
pub mod codec;
pub mod commands;
pub mod convert;
pub mod reassembly;
pub mod transport;

/// Bytes per command block (address/control byte + 2 level bytes).
pub const CMD_LEN: usize = 3;

/// Extra bytes a poll block carries for the sensed reading.
pub const SENSED_LEN: usize = 2;

/// Request preamble length.
pub const PRE_LEN: usize = 1;

/// Request postamble length.
pub const POST_LEN: usize = 1;

/// Trailing checksum length.
pub const CHECKSUM_LEN: usize = 1;

/// Response header length (two marker bytes + count byte).
pub const RESPONSE_HEADER_LEN: usize = 3;

/// Largest count a 4-bit header nibble can carry.
pub const MAX_COMMANDS: usize = 15;

/// Highest addressable physical channel (the address nibble is 4 bits).
pub const MAX_CHANNELS: usize = 15;

/// Broadcast address: the command applies to every channel.
pub const GLOBAL_ADDR: u8 = 0;

/// Sequence numbers roll over after this many frames.
pub const SEQUENCE_MODULUS: u8 = 8;

/// Marker bit carried by every frame's first byte.
pub const FRAME_MARKER: u8 = 0x80;

/// Second marker bit carried by both response header bytes.
pub const RESPONSE_OK: u8 = 0x40;

/// Scanning (MRI acquisition) status bit in the response header.
pub const SCANNING_BIT: u8 = 0x08;

/// Status-ok bit in the request postamble.
pub const POSTAMBLE_OK: u8 = 0x01;

/// Mask for the 6-bit payload fields.
pub const SIX_BITS: u8 = 0x3F;

pub use checksum::fletcher8;
pub use codec::{Codec, DecodedRequest, DecodedResponse};
pub use commands::{ChannelCommand, ChannelCommandSet, CommandFlags, Direction, RawCommand, SensedCurrent};
pub use convert::{CurrentScale, realign_adc};
pub use reassembly::{ProbeStatus, ReassemblyEvent, Reassembler};
pub use transport::{NullTransport, Transport};
