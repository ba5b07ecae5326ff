//! Simulated coil hardware and an in-process controller link.
//!
//! Enables bench work and end-to-end tests without a controller board:
//! [`SimulatedLink`] implements [`Transport`] by feeding every written
//! request straight into a [`Controller`] driving [`SimCoils`], and
//! queueing the replies for the next read.
//!
//! ```text
//!  DispatchLoop ──write──▶ SimulatedLink ──feed──▶ Controller ──▶ SimCoils
//!        ▲                      │
//!        └──────read────── reply buffer
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::controller::ports::NO_READING;
use crate::controller::{ActuatorIo, Controller};
use crate::error::{Error, TransportError};
use crate::protocol::convert::{MAX_LEVEL, MAX_MARKER_SHIFT};
use crate::protocol::{Direction, MAX_CHANNELS, Transport};

// ───────────────────────────────────────────────────────────────
// Simulated coil drivers
// ───────────────────────────────────────────────────────────────

/// Observable state of one simulated coil driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCoil {
    pub enabled: bool,
    pub direction: Direction,
    pub dac_level: u16,
    /// Sense path returns garbage when set.
    pub sense_fault: bool,
}

impl SimCoil {
    /// Current-sense level the ADC would report: the DAC level while the
    /// bridge is enabled, zero otherwise.
    pub fn sensed_level(&self) -> u16 {
        if self.enabled { self.dac_level.min(MAX_LEVEL) } else { 0 }
    }
}

/// A bank of simulated coils behaving like MCP4921/MCP3201 channels.
///
/// ADC words come out with a rotating number (0..=3) of undefined leading
/// bits ahead of the null marker, as the real converter does depending on
/// when chip-select lands relative to the clock.
#[derive(Debug, Clone)]
pub struct SimCoils {
    coils: heapless::Vec<SimCoil, MAX_CHANNELS>,
    next_shift: u32,
}

impl SimCoils {
    pub fn new(count: usize) -> Self {
        let mut coils = heapless::Vec::new();
        for _ in 0..count.min(MAX_CHANNELS) {
            let _ = coils.push(SimCoil::default());
        }
        Self { coils, next_shift: 0 }
    }

    pub fn coil(&self, channel: usize) -> Option<&SimCoil> {
        self.coils.get(channel)
    }

    pub fn coils(&self) -> &[SimCoil] {
        &self.coils
    }

    /// Make `channel`'s ADC return words without a marker bit.
    pub fn set_sense_fault(&mut self, channel: usize, fault: bool) {
        if let Some(coil) = self.coils.get_mut(channel) {
            coil.sense_fault = fault;
        }
    }

    /// Encode `level` the way an MCP3201 clocks it out after `shift`
    /// undefined bits.
    pub fn adc_word(level: u16, shift: u32) -> u16 {
        let undefined = if shift == 0 { 0 } else { !0u16 << (16 - shift) };
        undefined | ((level & MAX_LEVEL) << (3 - shift))
    }
}

impl ActuatorIo for SimCoils {
    fn read_sensed_level(&mut self, channel: usize) -> u16 {
        let coil = self.coils[channel];
        if coil.sense_fault {
            return NO_READING;
        }
        let shift = self.next_shift;
        self.next_shift = (self.next_shift + 1) % (MAX_MARKER_SHIFT + 1);
        Self::adc_word(coil.sensed_level(), shift)
    }

    fn write_commanded_level(&mut self, channel: usize, level: u16) {
        self.coils[channel].dac_level = level;
    }

    fn set_enabled(&mut self, channel: usize, enabled: bool) {
        self.coils[channel].enabled = enabled;
    }

    fn set_direction(&mut self, channel: usize, direction: Direction) {
        self.coils[channel].direction = direction;
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated link
// ───────────────────────────────────────────────────────────────

/// Controller shared between the link and whoever inspects it.
pub type SharedController = Arc<Mutex<Controller<SimCoils>>>;

/// In-process [`Transport`] backed by a simulated controller.
pub struct SimulatedLink {
    controller: SharedController,
    replies: VecDeque<u8>,
    /// Largest slice handed out per read; `None` returns everything.
    read_chunk: Option<usize>,
    open: bool,
}

impl SimulatedLink {
    /// A closed link to a freshly initialised `channel_count` controller.
    pub fn new(channel_count: usize) -> Result<Self, Error> {
        let mut controller = Controller::new(channel_count, SimCoils::new(channel_count))?;
        controller.init();
        Ok(Self {
            controller: Arc::new(Mutex::new(controller)),
            replies: VecDeque::new(),
            read_chunk: None,
            open: false,
        })
    }

    /// Hand out replies at most `chunk` bytes at a time.
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = Some(chunk.max(1));
        self
    }

    /// Handle on the simulated controller (scanning flag, coil state).
    pub fn controller(&self) -> SharedController {
        Arc::clone(&self.controller)
    }

    /// Queue raw bytes ahead of the next replies, as line noise would.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.replies.extend(bytes);
    }
}

impl Transport for SimulatedLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self, identifier: &str) -> Result<(), TransportError> {
        info!("simulated controller attached as {identifier}");
        self.replies.clear();
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.replies.clear();
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let reply = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .feed(data);
        self.replies.extend(reply);
        Ok(data.len())
    }

    fn has_pending_data(&mut self) -> Result<bool, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        Ok(!self.replies.is_empty())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let n = self.read_chunk.map_or(self.replies.len(), |c| c.min(self.replies.len()));
        Ok(self.replies.drain(..n).collect())
    }
}
