//! Port trait: the boundary between the command processor and the coil
//! driver hardware.
//!
//! ```text
//!   ChannelCommand ──▶ processor ──▶ ActuatorIo ──▶ DAC / ADC / H-bridge
//! ```
//!
//! Channel arguments are zero-based bank indices.

use crate::protocol::Direction;

/// Word an [`ActuatorIo`] returns when the ADC could not be read at all.
/// It has no null marker, so it realigns to an invalid sample.
pub const NO_READING: u16 = 0xFFFF;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain ↔ hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorIo {
    /// Raw 16-bit word clocked out of the channel's current-sense ADC.
    fn read_sensed_level(&mut self, channel: usize) -> u16;

    /// Latch a 12-bit level into the channel's DAC.
    fn write_commanded_level(&mut self, channel: usize, level: u16);

    /// Switch the channel's H-bridge on or off.
    fn set_enabled(&mut self, channel: usize, enabled: bool);

    fn set_direction(&mut self, channel: usize, direction: Direction);
}

impl<T: ActuatorIo + ?Sized> ActuatorIo for &mut T {
    fn read_sensed_level(&mut self, channel: usize) -> u16 {
        (**self).read_sensed_level(channel)
    }

    fn write_commanded_level(&mut self, channel: usize, level: u16) {
        (**self).write_commanded_level(channel, level)
    }

    fn set_enabled(&mut self, channel: usize, enabled: bool) {
        (**self).set_enabled(channel, enabled)
    }

    fn set_direction(&mut self, channel: usize, direction: Direction) {
        (**self).set_direction(channel, direction)
    }
}
