//! Fuzz target: `Reassembler::next_event`
//!
//! Drives arbitrary byte streams, split at a fuzzer-chosen point, into the
//! host-side response reassembler. Every frame it yields must carry a
//! valid checksum and a length that matches its count byte, and every
//! input byte must end up in exactly one frame, discard or the buffer.
//!
//! cargo fuzz run fuzz_reassembler

#![no_main]

use coilctl::protocol::checksum::verify;
use coilctl::protocol::codec::response_len;
use coilctl::protocol::{Codec, ReassemblyEvent, Reassembler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(stream.len());
    let codec = Codec::default();
    let mut reassembler = Reassembler::new();
    let mut accounted = 0;

    for chunk in [&stream[..split], &stream[split..]] {
        reassembler.extend(chunk);
        while let Some(event) = reassembler.next_event() {
            match event {
                ReassemblyEvent::Frame(frame) => {
                    assert!(verify(&frame), "frame with bad checksum");
                    assert_eq!(frame.len(), response_len(frame[2]));
                    // Decoding may reject it, but must not panic.
                    let _ = codec.decode_response(&frame);
                    accounted += frame.len();
                }
                ReassemblyEvent::Resynced { discarded } => accounted += discarded,
            }
        }
    }

    let pending = reassembler.pending_discard() + reassembler.buffered();
    assert_eq!(accounted + pending, stream.len(), "bytes lost or duplicated");
});
