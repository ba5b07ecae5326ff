//! Status sink port: where decoded controller responses go.
//!
//! ```text
//!   dispatch loop ──▶ StatusSink ──▶ operator UI / log / test recorder
//! ```

use std::sync::{Arc, Mutex};

use crate::protocol::DecodedResponse;

/// Receives every decoded response and connection change.
///
/// Called from the dispatch thread, hence `Send`.
pub trait StatusSink: Send {
    fn publish(&mut self, response: &DecodedResponse);

    /// The transport opened (`true`) or was lost/closed (`false`).
    fn connection_changed(&mut self, _connected: bool) {}
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn publish(&mut self, response: &DecodedResponse) {
        (**self).publish(response)
    }

    fn connection_changed(&mut self, connected: bool) {
        (**self).connection_changed(connected)
    }
}

/// A sink that keeps the most recent response for polling callers.
///
/// Clones share the same slot, so one clone can be handed to the
/// dispatch loop and another kept by the operator side.
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    latest: Arc<Mutex<Option<DecodedResponse>>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<DecodedResponse> {
        self.latest.lock().ok().and_then(|slot| slot.clone())
    }

    /// Remove and return the most recent response.
    pub fn take(&self) -> Option<DecodedResponse> {
        self.latest.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl StatusSink for SharedStatus {
    fn publish(&mut self, response: &DecodedResponse) {
        if let Ok(mut slot) = self.latest.lock() {
            *slot = Some(response.clone());
        }
    }
}
