//! Transport abstraction: any byte-oriented channel to the controller.
//!
//! Concrete implementations live in [`crate::adapters`]:
//! - USB/RS-232 serial port (`serial` feature)
//! - Simulated controller, for bench work without hardware
//!
//! The dispatch loop is generic over `Transport`, so a new link type needs
//! no change to the protocol logic. Errors are the fixed
//! [`TransportError`] so trait objects stay usable.

use crate::error::TransportError;

/// Byte-oriented, non-blocking transport channel.
pub trait Transport {
    /// `true` while the channel is open.
    fn is_open(&self) -> bool;

    /// Open the channel named by `identifier` (e.g. a serial port path).
    fn open(&mut self, identifier: &str) -> Result<(), TransportError>;

    /// Close the channel. Closing a closed channel is a no-op.
    fn close(&mut self);

    /// Write `data`; returns the number of bytes accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// `true` if a read would return at least one byte.
    fn has_pending_data(&mut self) -> Result<bool, TransportError>;

    /// Everything currently available; empty if nothing is pending.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn open(&mut self, identifier: &str) -> Result<(), TransportError> {
        (**self).open(identifier)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write_bytes(data)
    }

    fn has_pending_data(&mut self) -> Result<bool, TransportError> {
        (**self).has_pending_data()
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_available()
    }
}

/// A transport that accepts every write and never has data.
/// Useful as a placeholder when no controller is attached.
#[derive(Debug, Default)]
pub struct NullTransport {
    open: bool,
}

impl Transport for NullTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self, _identifier: &str) -> Result<(), TransportError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        Ok(data.len())
    }

    fn has_pending_data(&mut self) -> Result<bool, TransportError> {
        Ok(false)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }
}
