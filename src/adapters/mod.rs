//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements  | Connects to                          |
//! |------------|-------------|--------------------------------------|
//! | `hal`      | ActuatorIo  | MCP4921 DAC, MCP3201 ADC, H-bridge   |
//! | `log_sink` | StatusSink  | `log` facade                         |
//! | `serial`   | Transport   | Serial port (`serial` feature)       |
//! | `sim`      | Transport   | In-process simulated controller      |
//! |            | ActuatorIo  | Simulated coil drivers               |

pub mod hal;
pub mod log_sink;
#[cfg(feature = "serial")]
pub mod serial;
pub mod sim;

use crate::config::{LinkConfig, TransportKind};
use crate::error::Error;
use crate::protocol::Transport;

/// A transport owned by the dispatch thread.
pub type BoxedTransport = Box<dyn Transport + Send>;

/// Build the (still closed) transport `config` selects.
pub fn open_transport(config: &LinkConfig) -> Result<BoxedTransport, Error> {
    match config.transport {
        #[cfg(feature = "serial")]
        TransportKind::Serial => Ok(Box::new(serial::SerialTransport::new(config.baud_rate))),
        #[cfg(not(feature = "serial"))]
        TransportKind::Serial => Err(Error::Config("built without serial port support")),
        TransportKind::Simulated => Ok(Box::new(sim::SimulatedLink::new(config.channel_count)?)),
    }
}
