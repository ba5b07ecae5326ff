//! Per-channel actuator state owned by the controller.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::protocol::{Direction, MAX_CHANNELS};

use super::ports::ActuatorIo;

/// Last state written to one coil driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorChannelState {
    pub enabled: bool,
    pub direction: Direction,
    /// 12-bit DAC code.
    pub commanded_level: u16,
    /// Last valid realigned ADC reading.
    pub last_sensed_level: u16,
}

/// Fixed-size bank of channel states, indexed 0..N-1.
#[derive(Debug, Clone)]
pub struct ActuatorBank {
    channels: heapless::Vec<ActuatorChannelState, MAX_CHANNELS>,
}

impl ActuatorBank {
    /// A bank of `count` channels in their reset state.
    pub fn new(count: usize) -> Result<Self, Error> {
        if count == 0 || count > MAX_CHANNELS {
            return Err(Error::Config("channel count must be 1..=15"));
        }
        let mut channels = heapless::Vec::new();
        for _ in 0..count {
            channels
                .push(ActuatorChannelState::default())
                .map_err(|_| Error::Config("channel count must be 1..=15"))?;
        }
        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ActuatorChannelState> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[ActuatorChannelState] {
        &self.channels
    }

    pub(crate) fn state_mut(&mut self, index: usize) -> &mut ActuatorChannelState {
        &mut self.channels[index]
    }

    /// Reset every channel and drive the hardware to match: disabled,
    /// negative direction, level 0.
    pub fn init(&mut self, io: &mut impl ActuatorIo) {
        for (index, state) in self.channels.iter_mut().enumerate() {
            *state = ActuatorChannelState::default();
            io.set_enabled(index, false);
            io.write_commanded_level(index, 0);
            io.set_direction(index, state.direction);
        }
    }
}
