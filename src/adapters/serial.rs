//! Serial-port transport (USB CDC or RS-232 to the controller board).
//!
//! Implements [`Transport`] over the `serialport` crate. Reads never
//! block: the dispatch loop asks [`Transport::has_pending_data`] first and
//! then drains exactly what the driver has buffered.

use std::io::{Read, Write};
use std::time::Duration;

use log::{info, warn};

use crate::error::TransportError;
use crate::protocol::Transport;

/// Serial framing used by the controller firmware: 8 data bits, no
/// parity, one stop bit.
pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
pub const PARITY: serialport::Parity = serialport::Parity::None;
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;

/// Write timeout; reads are only issued for bytes already buffered.
pub const TIMEOUT_MS: u64 = 50;

pub struct SerialTransport {
    baud_rate: u32,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            port: None,
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&mut self, identifier: &str) -> Result<(), TransportError> {
        self.port = None;
        let port = serialport::new(identifier, self.baud_rate)
            .data_bits(DATA_BITS)
            .parity(PARITY)
            .stop_bits(STOP_BITS)
            .timeout(Duration::from_millis(TIMEOUT_MS))
            .open()
            .map_err(|e| {
                warn!("serial open {identifier} failed: {e}");
                TransportError::OpenFailed
            })?;
        info!("serial port {identifier} open at {} baud", self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let port = self.port()?;
        port.write_all(data).map_err(io_error)?;
        port.flush().map_err(io_error)?;
        Ok(data.len())
    }

    fn has_pending_data(&mut self) -> Result<bool, TransportError> {
        let pending = self.port()?.bytes_to_read().map_err(serial_error)?;
        Ok(pending > 0)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let port = self.port()?;
        let pending = port.bytes_to_read().map_err(serial_error)? as usize;
        let mut buf = vec![0; pending];
        if pending == 0 {
            return Ok(buf);
        }
        let read = port.read(&mut buf).map_err(io_error)?;
        buf.truncate(read);
        Ok(buf)
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports().map_err(serial_error)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn io_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => TransportError::Disconnected,
        _ => TransportError::Io,
    }
}

fn serial_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::Disconnected,
        _ => TransportError::Io,
    }
}
