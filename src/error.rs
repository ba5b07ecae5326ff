//! Unified error types for the coil driver link.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! dispatch loop's error handling uniform. All variants are `Copy` so they
//! can be passed between the reassembler, codec and dispatch thread without
//! allocation.
//!
//! Only [`TransportError`] is ever surfaced to the operator. Framing and
//! sampling errors are recovered locally.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame could not be decoded.
    Frame(FrameError),
    /// An ADC sample carried no valid reading.
    Sample(SampleError),
    /// The byte transport failed or is closed.
    Transport(TransportError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Sample(e) => write!(f, "sample: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes yet. Not a failure: wait for more input.
    Incomplete,
    /// Leading marker bits missing or header bytes disagree.
    BadMarker,
    /// Header counts do not predict the frame length.
    LengthMismatch,
    /// Preamble and postamble sequence numbers differ.
    SequenceMismatch,
    /// Trailing checksum does not match the frame contents.
    ChecksumMismatch,
    /// Block structure disagrees with the header counts.
    Malformed,
}

impl FrameError {
    /// `true` for every variant that invalidates the frame as a unit.
    pub const fn is_invalid(self) -> bool {
        !matches!(self, Self::Incomplete)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete frame"),
            Self::BadMarker => write!(f, "bad frame marker"),
            Self::LengthMismatch => write!(f, "length mismatch"),
            Self::SequenceMismatch => write!(f, "sequence mismatch"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::Malformed => write!(f, "malformed block structure"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Sample errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    /// The ADC null-marker bit was not found inside the shift window.
    NoValidSample,
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidSample => write!(f, "no valid ADC sample"),
        }
    }
}

impl From<SampleError> for Error {
    fn from(e: SampleError) -> Self {
        Self::Sample(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The link dropped while in use.
    Disconnected,
    /// The requested endpoint could not be opened.
    OpenFailed,
    /// An operation was attempted on a closed transport.
    NotOpen,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::OpenFailed => write!(f, "open failed"),
            Self::NotOpen => write!(f, "not open"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
