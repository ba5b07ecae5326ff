//! Link diagnostics.
//!
//! Counters are bumped by the dispatch thread and read by the operator
//! side at any time, so they are plain atomics. [`LinkStats::snapshot`]
//! freezes them into a serializable [`LinkMetrics`] for display or export.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Longest transport failure description kept in a snapshot.
const FAILURE_TEXT_LEN: usize = 32;

#[derive(Debug, Default)]
pub struct LinkStats {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    resyncs: AtomicU64,
    discarded_bytes: AtomicU64,
    malformed_frames: AtomicU64,
    transport_failures: AtomicU64,
    last_failure: Mutex<Option<TransportError>>,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_read(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resync(&self, discarded: usize) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
        self.discarded_bytes.fetch_add(discarded as u64, Ordering::Relaxed);
    }

    /// A checksum-valid frame whose blocks disagreed with its header.
    pub fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: TransportError) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(error);
        }
    }

    pub fn snapshot(&self) -> LinkMetrics {
        let last_failure = self
            .last_failure
            .lock()
            .ok()
            .and_then(|last| *last)
            .map(|e| {
                let mut text = heapless::String::new();
                let _ = core::fmt::Write::write_fmt(&mut text, format_args!("{e}"));
                text
            });

        LinkMetrics {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            discarded_bytes: self.discarded_bytes.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            last_failure,
        }
    }
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetrics {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub resyncs: u64,
    pub discarded_bytes: u64,
    pub malformed_frames: u64,
    pub transport_failures: u64,
    pub last_failure: Option<heapless::String<FAILURE_TEXT_LEN>>,
}
