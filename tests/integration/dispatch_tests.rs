//! Dispatch loop stepped by hand against scripted and simulated
//! transports.

use std::time::{Duration, Instant};

use coilctl::adapters::sim::SimulatedLink;
use coilctl::host::DispatchLoop;
use coilctl::protocol::codec::{ResponseBuilder, error_reply};
use coilctl::protocol::{
    ChannelCommand, ChannelCommandSet, Codec, CommandFlags, Direction, RawCommand, SensedCurrent,
    Transport, fletcher8,
};

use crate::mock_hw::{RecordingSink, ScriptedTransport};

// ── Helpers ───────────────────────────────────────────────────

fn single(cmd: ChannelCommand, delay: Duration) -> ChannelCommandSet {
    ChannelCommandSet::new(vec![cmd], delay)
}

fn scripted() -> (DispatchLoop<ScriptedTransport, RecordingSink>, ScriptedTransport, RecordingSink) {
    let transport = ScriptedTransport::new();
    let sink = RecordingSink::new();
    let dl = DispatchLoop::new(transport.clone(), sink.clone(), Codec::default());
    (dl, transport, sink)
}

fn simulated(link: SimulatedLink) -> (DispatchLoop<SimulatedLink, RecordingSink>, RecordingSink) {
    let sink = RecordingSink::new();
    let mut dl = DispatchLoop::new(link, sink.clone(), Codec::default());
    dl.request_open("sim");
    (dl, sink)
}

/// One-block control response, as a controller would send it.
fn control_response(sequence: u8, address: u8) -> Vec<u8> {
    let mut builder = ResponseBuilder::new();
    builder.push_control(RawCommand {
        address,
        flags: CommandFlags::from_nibble(0b0110),
        level: 64,
    });
    builder.finish(sequence, false)
}

// ── Round trips through the simulated controller ──────────────

#[test]
fn drive_command_reaches_coil_and_reply_is_published() {
    let link = SimulatedLink::new(6).unwrap();
    let controller = link.controller();
    let (mut dl, sink) = simulated(link);

    dl.enqueue(single(ChannelCommand::drive(3, 50.0), Duration::ZERO), false);
    let now = Instant::now();
    dl.step(now);
    dl.step(now);

    {
        let controller = controller.lock().unwrap();
        let coil = controller.io().coil(2).unwrap();
        assert!(coil.enabled);
        assert_eq!(coil.dac_level, 640);
        assert_eq!(coil.direction, Direction::Positive);
    }

    let responses = sink.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].sequence, 0);
    assert_eq!(responses[0].commands[0].channel, 3);
    assert_eq!(sink.connection_events(), vec![true]);

    let metrics = dl.diagnostics();
    assert_eq!(metrics.frames_sent, 1);
    assert_eq!(metrics.bytes_sent, 6);
    assert_eq!(metrics.frames_received, 1);
    assert_eq!(metrics.bytes_received, 7);
    assert_eq!(metrics.resyncs, 0);
}

#[test]
fn poll_reports_sensed_current() {
    let (mut dl, sink) = simulated(SimulatedLink::new(6).unwrap());
    let now = Instant::now();
    dl.enqueue_sets(now, vec![
        single(ChannelCommand::drive(2, -100.0), Duration::ZERO),
        ChannelCommandSet::poll_all(),
    ]);

    let responses = sink.responses();
    assert_eq!(responses.len(), 2);
    let poll = &responses[1];
    assert_eq!(poll.commands.len(), 6);
    assert_eq!(poll.commands[1].direction, Direction::Negative);
    assert_eq!(poll.commands[1].sensed, SensedCurrent::Milliamp(100.0));
    assert_eq!(poll.commands[0].sensed, SensedCurrent::Milliamp(0.0));
}

#[test]
fn sequence_numbers_wrap_modulo_eight() {
    let (mut dl, sink) = simulated(SimulatedLink::new(2).unwrap());
    let now = Instant::now();
    let sets = (0..9)
        .map(|_| single(ChannelCommand::poll(1), Duration::ZERO))
        .collect();
    dl.enqueue_sets(now, sets);

    let sequences: Vec<u8> = sink.responses().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5, 6, 7, 0]);
    assert_eq!(dl.next_sequence(), 1);
}

#[test]
fn chunked_replies_are_reassembled() {
    let (mut dl, sink) = simulated(SimulatedLink::new(6).unwrap().with_read_chunk(5));
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    let now = Instant::now();
    for _ in 0..10 {
        dl.step(now);
    }
    let responses = sink.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].commands.len(), 6);
    assert_eq!(dl.diagnostics().bytes_received, 34);
}

#[test]
fn scanning_flag_travels_with_replies() {
    let link = SimulatedLink::new(3).unwrap();
    link.controller().lock().unwrap().set_scanning(true);
    let (mut dl, sink) = simulated(link);
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    let now = Instant::now();
    dl.step(now);
    dl.step(now);
    assert!(sink.responses()[0].scanning);
}

#[test]
fn line_noise_before_reply_is_counted_once() {
    let mut link = SimulatedLink::new(6).unwrap();
    link.open("sim").unwrap();
    link.inject(&[0x01, 0x02, 0x55]);
    let sink = RecordingSink::new();
    let mut dl = DispatchLoop::new(link, sink.clone(), Codec::default());
    assert!(dl.is_connected());
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    let now = Instant::now();
    dl.step(now);
    dl.step(now);

    assert_eq!(sink.responses().len(), 1);
    let metrics = dl.diagnostics();
    assert_eq!(metrics.resyncs, 1);
    assert_eq!(metrics.discarded_bytes, 3);
}

// ── Queue behaviour ───────────────────────────────────────────

#[test]
fn delay_holds_back_the_next_set() {
    let (mut dl, transport, _sink) = scripted();
    dl.request_open("mock");
    dl.enqueue(single(ChannelCommand::drive(1, 5.0), Duration::from_millis(50)), false);
    dl.enqueue(ChannelCommandSet::poll_all(), false);

    let t0 = Instant::now();
    dl.step(t0);
    assert_eq!(transport.written().len(), 1);
    dl.step(t0 + Duration::from_millis(49));
    assert_eq!(transport.written().len(), 1);
    assert_eq!(dl.queued(), 1);
    dl.step(t0 + Duration::from_millis(50));
    assert_eq!(transport.written().len(), 2);
}

#[test]
fn flush_replaces_the_backlog() {
    let (mut dl, transport, _sink) = scripted();
    for ch in 1..=3 {
        dl.enqueue(single(ChannelCommand::drive(ch, 1.0), Duration::ZERO), false);
    }
    dl.enqueue(ChannelCommandSet::reset(), true);
    assert_eq!(dl.queued(), 1);

    dl.request_open("mock");
    dl.step(Instant::now());
    let sent = Codec::default().decode_request(&transport.written()[0]).unwrap();
    assert_eq!(sent.commands.len(), 1);
    assert_eq!(sent.commands[0].channel, 0);
    assert!(!sent.commands[0].enable);
}

#[test]
fn closed_link_keeps_the_queue() {
    let (mut dl, transport, _sink) = scripted();
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    dl.step(Instant::now());
    assert_eq!(dl.queued(), 1);
    assert!(transport.written().is_empty());
}

// ── Receive path ──────────────────────────────────────────────

#[test]
fn error_reply_and_noise_are_skipped() {
    let (mut dl, transport, sink) = scripted();
    let mut inbound = error_reply(3);
    inbound.push(0x7F);
    inbound.extend(control_response(4, 2));
    transport.push_inbound(&inbound);

    dl.request_open("mock");
    dl.step(Instant::now());

    let responses = sink.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].sequence, 4);
    let metrics = dl.diagnostics();
    assert_eq!(metrics.resyncs, 1);
    assert_eq!(metrics.discarded_bytes, 5);
}

#[test]
fn reply_split_byte_by_byte() {
    let (mut dl, transport, sink) = scripted();
    for byte in control_response(1, 1) {
        transport.push_inbound(&[byte]);
    }
    dl.request_open("mock");
    let now = Instant::now();
    for _ in 0..7 {
        assert!(sink.responses().is_empty());
        dl.step(now);
    }
    assert_eq!(sink.responses().len(), 1);
}

#[test]
fn checksum_valid_but_malformed_reply_is_counted() {
    let (mut dl, transport, sink) = scripted();
    let mut frame = vec![0xC0, 0xC0, 0x11];
    frame.extend_from_slice(
        &RawCommand {
            address: 1,
            flags: CommandFlags::from_nibble(0b0110),
            level: 1,
        }
        .to_block(),
    );
    frame.extend_from_slice(&[0, 0]);
    let sum = fletcher8(&frame);
    frame.push(sum);
    transport.push_inbound(&frame);

    dl.request_open("mock");
    dl.step(Instant::now());
    assert!(sink.responses().is_empty());
    assert_eq!(dl.diagnostics().malformed_frames, 1);
}

// ── Failures and reconnects ───────────────────────────────────

#[test]
fn write_failure_drops_link_until_reconnect() {
    let (mut dl, transport, sink) = scripted();
    let t0 = Instant::now();
    dl.request_open("mock");
    dl.step(t0);
    assert!(dl.is_connected());

    transport.wire.lock().unwrap().fail_next_write = true;
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    dl.step(t0);

    assert!(!dl.is_connected());
    assert_eq!(sink.connection_events(), vec![true, false]);
    // The set that failed is gone, not retried.
    assert_eq!(dl.queued(), 0);
    assert_eq!(dl.next_sequence(), 0);
    let metrics = dl.diagnostics();
    assert_eq!(metrics.transport_failures, 1);
    assert_eq!(metrics.last_failure.as_deref(), Some("disconnected"));

    // No I/O while disconnected.
    dl.enqueue(ChannelCommandSet::poll_all(), false);
    dl.step(t0);
    assert_eq!(dl.queued(), 1);

    dl.request_open("mock");
    dl.step(t0);
    assert!(dl.is_connected());
    let written = transport.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0][0], 0x80 | 1);
    assert_eq!(transport.wire.lock().unwrap().opened, vec!["mock", "mock"]);
}

#[test]
fn short_write_counts_as_failure() {
    let (mut dl, transport, sink) = scripted();
    let t0 = Instant::now();
    dl.request_open("mock");
    dl.step(t0);

    transport.wire.lock().unwrap().short_next_write = true;
    dl.enqueue(single(ChannelCommand::drive(1, 5.0), Duration::ZERO), false);
    dl.step(t0);

    assert!(!dl.is_connected());
    assert_eq!(sink.connection_events(), vec![true, false]);
    assert_eq!(dl.next_sequence(), 0);
    let metrics = dl.diagnostics();
    assert_eq!(metrics.frames_sent, 0);
    assert_eq!(metrics.bytes_sent, 0);
    assert_eq!(metrics.transport_failures, 1);
    assert_eq!(metrics.last_failure.as_deref(), Some("I/O error"));

    // The next full write reuses the sequence number.
    dl.request_open("mock");
    dl.enqueue(single(ChannelCommand::drive(1, 5.0), Duration::ZERO), false);
    dl.step(t0);
    let written = transport.written();
    assert_eq!(written.len(), 2);
    assert_eq!(written[1][0], 0x80 | 1);
    assert_eq!(dl.next_sequence(), 1);
    assert_eq!(dl.diagnostics().frames_sent, 1);
}

#[test]
fn read_failure_drops_link() {
    let (mut dl, transport, sink) = scripted();
    dl.request_open("mock");
    dl.step(Instant::now());
    transport.wire.lock().unwrap().fail_next_read = true;
    dl.step(Instant::now());

    assert!(!dl.is_connected());
    assert_eq!(sink.connection_events(), vec![true, false]);
    assert_eq!(dl.diagnostics().last_failure.as_deref(), Some("I/O error"));
}

#[test]
fn open_failure_is_recorded() {
    let (mut dl, _transport, sink) = scripted();
    dl.request_open("");
    dl.step(Instant::now());
    assert!(!dl.is_connected());
    assert!(sink.connection_events().is_empty());
    assert_eq!(dl.diagnostics().last_failure.as_deref(), Some("open failed"));
}

#[test]
fn sequence_survives_reconnect() {
    let (mut dl, _transport, sink) = scripted();
    let now = Instant::now();
    dl.request_open("mock");
    for _ in 0..3 {
        dl.enqueue(ChannelCommandSet::poll_all(), false);
        dl.step(now);
    }
    dl.request_close();
    dl.step(now);
    assert!(!dl.is_connected());
    dl.request_open("mock");
    dl.step(now);
    assert_eq!(dl.next_sequence(), 3);
    assert_eq!(sink.connection_events(), vec![true, false, true]);
}

// ── Step helper ───────────────────────────────────────────────

trait StepAll {
    /// Enqueue `sets` and step until every reply has been read.
    fn enqueue_sets(&mut self, now: Instant, sets: Vec<ChannelCommandSet>);
}

impl StepAll for DispatchLoop<SimulatedLink, RecordingSink> {
    fn enqueue_sets(&mut self, now: Instant, sets: Vec<ChannelCommandSet>) {
        let steps = sets.len() + 1;
        for set in sets {
            self.enqueue(set, false);
        }
        for _ in 0..steps {
            self.step(now);
        }
    }
}
