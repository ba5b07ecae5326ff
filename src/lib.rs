//! Coil driver link library.
//!
//! Serial protocol, controller state machine and host dispatch loop for
//! MRI-guided catheter coil drivers:
//!
//! - [`protocol`]: checksum, frame codec, conversions, reassembly, transport
//! - [`controller`]: embedded side (actuator bank, command processor)
//! - [`host`]: command queue, dispatch loop thread, status delivery
//! - [`adapters`]: serial port, simulated controller, embedded-hal, log sink
//!
//! The crate installs no logger; the embedding application picks one.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod protocol;

pub use config::{LinkConfig, TransportKind};
pub use error::{Error, FrameError, Result, SampleError, TransportError};
