//! Fuzz target: `Controller::feed`
//!
//! Feeds arbitrary bytes to a simulated six-channel controller. The
//! controller must never panic, and every reply must be either a
//! checksum-valid response or a four-byte error reply.
//!
//! cargo fuzz run fuzz_controller_request

#![no_main]

use coilctl::adapters::sim::SimCoils;
use coilctl::controller::Controller;
use coilctl::protocol::Codec;
use coilctl::protocol::codec::{error_reply, response_len};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut controller) = Controller::new(6, SimCoils::new(6)) else {
        return;
    };
    controller.init();
    // First byte toggles the MRI scanning flag.
    if let Some(&flag) = data.first() {
        controller.set_scanning(flag & 1 == 1);
    }

    let codec = Codec::default();
    let replies = controller.feed(data);
    let mut pos = 0;
    while pos < replies.len() {
        let head = replies[pos];
        if head & 0xC0 == 0xC0 {
            let len = response_len(replies[pos + 2]);
            assert!(codec.decode_response(&replies[pos..pos + len]).is_ok());
            pos += len;
        } else {
            assert_eq!(replies[pos..pos + 4], error_reply(head & 0x07)[..]);
            pos += 4;
        }
    }
    assert_eq!(pos, replies.len());
});
