//! Embedded side of the link: the coil controller.
//!
//! Pure logic over the [`ActuatorIo`](ports::ActuatorIo) port, so the same
//! code runs on the bench simulator, in tests, and against real DAC/ADC
//! hardware through [`crate::adapters::hal`].

pub mod bank;
pub mod ports;
pub mod processor;
pub mod request;
pub mod service;

pub use bank::{ActuatorBank, ActuatorChannelState};
pub use ports::ActuatorIo;
pub use processor::{CommandContext, process_command};
pub use request::{AssembledRequest, RequestAssembler};
pub use service::Controller;
