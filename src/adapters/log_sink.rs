//! Log-based status sink adapter.
//!
//! Implements [`StatusSink`] by writing every decoded controller response
//! to the `log` facade, one record per channel block. Useful on its own
//! for bench sessions, or alongside a UI sink.

use log::info;

use crate::host::StatusSink;
use crate::protocol::{DecodedResponse, SensedCurrent};

/// Adapter that logs every [`DecodedResponse`].
#[derive(Debug, Default)]
pub struct LogStatusSink;

impl LogStatusSink {
    pub fn new() -> Self {
        Self
    }
}

impl StatusSink for LogStatusSink {
    fn publish(&mut self, response: &DecodedResponse) {
        info!(
            "RESP | seq={} | blocks={} | scanning={}",
            response.sequence,
            response.commands.len(),
            response.scanning
        );
        for cmd in &response.commands {
            info!(
                "CHAN | ch={} | en={} | dir={:?} | cmd={:.2}mA | sensed={}",
                cmd.channel,
                u8::from(cmd.enable),
                cmd.direction,
                cmd.commanded_current_milliamp,
                sensed_text(cmd.sensed),
            );
        }
    }

    fn connection_changed(&mut self, connected: bool) {
        info!("LINK | {}", if connected { "connected" } else { "disconnected" });
    }
}

fn sensed_text(sensed: SensedCurrent) -> String {
    match sensed {
        SensedCurrent::NotSampled => String::from("-"),
        SensedCurrent::NoValidSample => String::from("invalid"),
        SensedCurrent::Milliamp(ma) => format!("{ma:.2}mA"),
    }
}
