//! `embedded-hal` actuator adapter for the coil driver board.
//!
//! Each channel has its own chip selects, so every converter is an
//! [`SpiDevice`]:
//! - MCP4921 DAC: one 16-bit write, 4 control bits + 12-bit level
//! - MCP3201 ADC: one 16-bit read, undefined bits + null marker + 12 bits
//!
//! plus two H-bridge pins (enable, direction). Bus errors are logged and
//! surface as an invalid ADC sample; a failed DAC/pin write leaves the
//! hardware where it was.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::controller::ports::{ActuatorIo, NO_READING};
use crate::protocol::convert::MAX_LEVEL;
use crate::protocol::{Direction, MAX_CHANNELS};

/// MCP4921 control nibble: DAC A, unbuffered Vref, 1x gain, output active.
pub const DAC_CONTROL: u16 = 0x3000;

/// MCP4921 command word for `level`.
pub const fn dac_word(level: u16) -> u16 {
    DAC_CONTROL | (level & MAX_LEVEL)
}

/// The parts making up one coil driver channel.
pub struct HalChannel<DAC, ADC, EN, DIR> {
    pub dac: DAC,
    pub adc: ADC,
    pub enable: EN,
    pub direction: DIR,
}

/// [`ActuatorIo`] over real converters and H-bridge pins.
pub struct HalActuatorIo<DAC, ADC, EN, DIR> {
    channels: heapless::Vec<HalChannel<DAC, ADC, EN, DIR>, MAX_CHANNELS>,
}

impl<DAC, ADC, EN, DIR> HalActuatorIo<DAC, ADC, EN, DIR>
where
    DAC: SpiDevice,
    ADC: SpiDevice,
    EN: OutputPin,
    DIR: OutputPin,
{
    /// Take ownership of up to [`MAX_CHANNELS`] channels; extras are
    /// handed back.
    pub fn new(
        channels: impl IntoIterator<Item = HalChannel<DAC, ADC, EN, DIR>>,
    ) -> Result<Self, HalChannel<DAC, ADC, EN, DIR>> {
        let mut bank = heapless::Vec::new();
        for channel in channels {
            bank.push(channel)?;
        }
        Ok(Self { channels: bank })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<DAC, ADC, EN, DIR> ActuatorIo for HalActuatorIo<DAC, ADC, EN, DIR>
where
    DAC: SpiDevice,
    ADC: SpiDevice,
    EN: OutputPin,
    DIR: OutputPin,
{
    fn read_sensed_level(&mut self, channel: usize) -> u16 {
        let mut word = [0u8; 2];
        match self.channels[channel].adc.read(&mut word) {
            Ok(()) => u16::from_be_bytes(word),
            Err(e) => {
                warn!("ADC {channel} read failed: {e:?}");
                NO_READING
            }
        }
    }

    fn write_commanded_level(&mut self, channel: usize, level: u16) {
        let word = dac_word(level).to_be_bytes();
        if let Err(e) = self.channels[channel].dac.write(&word) {
            warn!("DAC {channel} write failed: {e:?}");
        }
    }

    fn set_enabled(&mut self, channel: usize, enabled: bool) {
        let pin = &mut self.channels[channel].enable;
        let result = if enabled { pin.set_high() } else { pin.set_low() };
        if let Err(e) = result {
            warn!("enable pin {channel} failed: {e:?}");
        }
    }

    fn set_direction(&mut self, channel: usize, direction: Direction) {
        let pin = &mut self.channels[channel].direction;
        let result = match direction {
            Direction::Positive => pin.set_high(),
            Direction::Negative => pin.set_low(),
        };
        if let Err(e) = result {
            warn!("direction pin {channel} failed: {e:?}");
        }
    }
}
