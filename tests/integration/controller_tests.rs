//! Controller service driven with raw request bytes, as the serial
//! interrupt handler would deliver them.

use std::time::Duration;

use coilctl::adapters::sim::SimCoils;
use coilctl::controller::Controller;
use coilctl::protocol::codec::{error_reply, response_len};
use coilctl::protocol::{
    ChannelCommand, ChannelCommandSet, Codec, Direction, ReassemblyEvent, Reassembler,
    SensedCurrent, fletcher8,
};

use crate::mock_hw::{ActuatorCall, MockCoils};

// ── Helpers ───────────────────────────────────────────────────

fn controller() -> Controller<MockCoils> {
    let mut c = Controller::new(6, MockCoils::new(6)).unwrap();
    c.init();
    c.io_mut().calls.clear();
    c
}

fn request(commands: Vec<ChannelCommand>, sequence: u8) -> Vec<u8> {
    Codec::default().encode_set(&ChannelCommandSet::new(commands, Duration::ZERO), sequence)
}

// ── Init ──────────────────────────────────────────────────────

#[test]
fn init_drives_every_channel_off() {
    let mut c = Controller::new(3, MockCoils::new(3)).unwrap();
    c.init();

    let mut expected = Vec::new();
    for channel in 0..3 {
        expected.push(ActuatorCall::Enable { channel, enabled: false });
        expected.push(ActuatorCall::WriteLevel { channel, level: 0 });
        expected.push(ActuatorCall::Direction {
            channel,
            direction: Direction::Negative,
        });
    }
    assert_eq!(c.io().calls, expected);
    assert!(c.bank().channels().iter().all(|ch| !ch.enabled && ch.commanded_level == 0));
}

// ── Control commands ──────────────────────────────────────────

#[test]
fn fifty_milliamp_on_channel_three() {
    let mut c = controller();
    let reply = c.feed(&request(vec![ChannelCommand::drive(3, 50.0)], 2));

    // Level and direction are set before the bridge is enabled.
    assert_eq!(
        c.io().output_calls(),
        vec![
            ActuatorCall::WriteLevel { channel: 2, level: 640 },
            ActuatorCall::Direction {
                channel: 2,
                direction: Direction::Positive
            },
            ActuatorCall::Enable { channel: 2, enabled: true },
        ]
    );
    let state = c.bank().get(2).unwrap();
    assert!(state.enabled);
    assert_eq!(state.commanded_level, 640);

    assert_eq!(reply.len(), 7);
    let response = Codec::default().decode_response(&reply).unwrap();
    assert_eq!(response.sequence, 2);
    assert!(!response.scanning);
    let cmd = response.commands[0];
    assert_eq!(cmd.channel, 3);
    assert!(cmd.enable);
    assert!(cmd.update);
    assert_eq!(cmd.direction, Direction::Positive);
    assert!((cmd.commanded_current_milliamp - 50.0).abs() < 1e-9);
    assert_eq!(cmd.sensed, SensedCurrent::NotSampled);
}

#[test]
fn disable_switches_off_before_level_changes() {
    let mut c = controller();
    c.feed(&request(vec![ChannelCommand::drive(1, 20.0)], 0));
    c.io_mut().calls.clear();

    c.feed(&request(vec![ChannelCommand::disable(1)], 1));
    let calls = c.io().output_calls();
    assert_eq!(calls[0], ActuatorCall::Enable { channel: 0, enabled: false });
    assert_eq!(c.io().last_level(0), Some(0));
    assert!(!calls.contains(&ActuatorCall::Enable { channel: 0, enabled: true }));
}

#[test]
fn global_reset_touches_every_channel() {
    let mut c = controller();
    let reply = c.feed(&Codec::default().encode_set(&ChannelCommandSet::reset(), 4));

    assert_eq!(reply.len(), 22);
    let response = Codec::default().decode_response(&reply).unwrap();
    let channels: Vec<u8> = response.commands.iter().map(|cmd| cmd.channel).collect();
    assert_eq!(channels, vec![1, 2, 3, 4, 5, 6]);
    assert!(response.commands.iter().all(|cmd| !cmd.enable));
}

// ── Polls ─────────────────────────────────────────────────────

#[test]
fn broadcast_poll_reports_every_channel() {
    let mut c = controller();
    c.io_mut().adc[1] = SimCoils::adc_word(1280, 2);
    c.io_mut().adc[4] = 0xFFFF;

    let reply = c.feed(&Codec::default().encode_set(&ChannelCommandSet::poll_all(), 0));
    assert_eq!(reply.len(), 34);
    assert_eq!(reply[2], (6 << 4) | 6);

    let response = Codec::default().decode_response(&reply).unwrap();
    assert_eq!(response.commands.len(), 6);
    assert!(response.commands.iter().all(|cmd| cmd.poll));
    assert_eq!(response.commands[1].sensed, SensedCurrent::Milliamp(100.0));
    assert_eq!(response.commands[4].sensed, SensedCurrent::NoValidSample);
    assert_eq!(response.commands[0].sensed, SensedCurrent::Milliamp(0.0));

    // Polls leave outputs alone.
    assert!(c.io().output_calls().is_empty());
    assert_eq!(c.bank().get(1).unwrap().last_sensed_level, 1280);
}

#[test]
fn failed_sample_keeps_last_good_level() {
    let mut c = controller();
    c.io_mut().adc[0] = SimCoils::adc_word(300, 1);
    c.feed(&request(vec![ChannelCommand::poll(1)], 0));
    c.io_mut().adc[0] = 0xFFFF;
    c.feed(&request(vec![ChannelCommand::poll(1)], 1));
    assert_eq!(c.bank().get(0).unwrap().last_sensed_level, 300);
}

// ── Scanning ──────────────────────────────────────────────────

#[test]
fn scanning_holds_direction_and_is_reported() {
    let mut c = controller();
    c.feed(&request(vec![ChannelCommand::drive(1, 10.0)], 0));
    c.set_scanning(true);

    let reply = c.feed(&request(vec![ChannelCommand::drive(1, -30.0)], 1));
    assert_eq!(reply[0] & 0x08, 0x08);
    let response = Codec::default().decode_response(&reply).unwrap();
    assert!(response.scanning);
    let cmd = response.commands[0];
    assert_eq!(cmd.direction, Direction::Positive);
    assert_eq!(c.bank().get(0).unwrap().direction, Direction::Positive);
    // The new magnitude still applies.
    assert!((cmd.commanded_current_milliamp - 30.0).abs() < 1e-9);

    c.set_scanning(false);
    c.feed(&request(vec![ChannelCommand::drive(1, -30.0)], 2));
    assert_eq!(c.bank().get(0).unwrap().direction, Direction::Negative);
}

// ── Rejections ────────────────────────────────────────────────

#[test]
fn bad_checksum_gets_error_reply() {
    let mut c = controller();
    let mut frame = request(vec![ChannelCommand::drive(3, 50.0)], 2);
    let last = frame.len() - 1;
    frame[last] ^= 0x10;

    let reply = c.handle_frame(&frame);
    assert_eq!(reply, error_reply(2));
    assert_eq!(reply[..3], [0x82, 0x82, 0x00]);
    assert_eq!(reply[3], fletcher8(&reply[..3]));
    assert!(c.io().calls.is_empty());
}

#[test]
fn channel_beyond_bank_is_rejected_whole() {
    let mut c = controller();
    let reply = c.feed(&request(
        vec![ChannelCommand::drive(1, 5.0), ChannelCommand::drive(7, 5.0)],
        3,
    ));
    assert_eq!(reply, error_reply(3));
    // Nothing from the request is applied, not even the valid first block.
    assert!(c.io().calls.is_empty());
}

#[test]
fn reply_over_fifteen_blocks_is_rejected() {
    let mut c = controller();
    let polls = vec![ChannelCommand::poll(0); 3];
    let reply = c.feed(&request(polls, 5));
    assert_eq!(reply, error_reply(5));
    assert!(c.io().calls.is_empty());
}

// ── Framing ───────────────────────────────────────────────────

#[test]
fn request_split_across_feeds() {
    let mut c = controller();
    let frame = request(vec![ChannelCommand::drive(2, 12.5)], 6);
    assert!(c.feed(&frame[..2]).is_empty());
    assert!(c.feed(&frame[2..4]).is_empty());
    let reply = c.feed(&frame[4..]);
    assert_eq!(Codec::default().decode_response(&reply).unwrap().sequence, 6);
}

#[test]
fn back_to_back_requests_answer_in_order() {
    let mut c = controller();
    let mut bytes = request(vec![ChannelCommand::drive(1, 1.0)], 0);
    bytes.extend(request(vec![ChannelCommand::poll(1)], 1));

    let replies = c.feed(&bytes);
    assert_eq!(replies.len(), response_len(0x10) + response_len(0x11));

    let mut host = Reassembler::new();
    host.extend(&replies);
    let mut sequences = Vec::new();
    while let Some(event) = host.next_event() {
        match event {
            ReassemblyEvent::Frame(frame) => {
                sequences.push(Codec::default().decode_response(&frame).unwrap().sequence)
            }
            ReassemblyEvent::Resynced { .. } => panic!("unexpected resync"),
        }
    }
    assert_eq!(sequences, vec![0, 1]);
}

#[test]
fn stray_marker_byte_costs_one_error_reply() {
    let mut c = controller();
    // 0xFF reads as a preamble announcing fifteen blocks.
    assert!(c.feed(&[0xFF]).is_empty());

    let codec = Codec::default();
    for step in 1u16..=9 {
        let sequence = (step % 8) as u8;
        let milliamp = f64::from(step) * 10.0;
        let reply = c.feed(&request(vec![ChannelCommand::drive(1, milliamp)], sequence));
        let response = if step == 1 {
            assert_eq!(reply[..4], error_reply(7));
            &reply[4..]
        } else {
            &reply[..]
        };
        assert_eq!(codec.decode_response(response).unwrap().sequence, sequence);
        // Applied at once, not held until 48 bytes have piled up.
        assert_eq!(c.io().last_level(0), Some(step * 128));
    }
}
