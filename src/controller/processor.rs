//! Channel command processor.
//!
//! Applies one decoded command block to the actuator bank and appends the
//! matching reply block(s):
//!
//! | Command | Hardware effect                         | Reply block |
//! |---------|-----------------------------------------|-------------|
//! | poll    | ADC read only                           | 5 bytes     |
//! | control | enable, DAC level (if update), direction | 3 bytes     |
//!
//! Address 0 fans out to every channel in index order.

use log::debug;

use crate::protocol::codec::ResponseBuilder;
use crate::protocol::commands::{CommandFlags, RawCommand};
use crate::protocol::convert::{realign_adc, split_sensed};

use super::bank::ActuatorBank;
use super::ports::ActuatorIo;

/// Controller-wide conditions that shape how commands are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandContext {
    /// An MRI acquisition is running: direction changes are held off.
    pub scanning: bool,
}

/// Number of reply blocks `cmd` will produce on a bank of `channels`.
pub fn reply_blocks(cmd: &RawCommand, channels: usize) -> usize {
    if cmd.is_global() { channels } else { 1 }
}

/// Apply `cmd` and append its reply.
///
/// # Panics
///
/// If `cmd.address` names a channel beyond the bank. Callers validate
/// addresses first.
pub fn process_command(
    bank: &mut ActuatorBank,
    io: &mut impl ActuatorIo,
    cmd: RawCommand,
    ctx: CommandContext,
    out: &mut ResponseBuilder,
) {
    if cmd.is_global() {
        for index in 0..bank.len() {
            process_channel(bank, io, index, cmd, ctx, out);
        }
    } else {
        let index = usize::from(cmd.address) - 1;
        assert!(
            index < bank.len(),
            "channel {} outside bank of {}",
            cmd.address,
            bank.len()
        );
        process_channel(bank, io, index, cmd, ctx, out);
    }
}

fn process_channel(
    bank: &mut ActuatorBank,
    io: &mut impl ActuatorIo,
    index: usize,
    cmd: RawCommand,
    ctx: CommandContext,
    out: &mut ResponseBuilder,
) {
    let address = (index + 1) as u8;
    let state = bank.state_mut(index);

    if cmd.flags.poll {
        let reading = realign_adc(io.read_sensed_level(index));
        match reading {
            Ok(level) => state.last_sensed_level = level,
            Err(e) => debug!("channel {address}: {e}"),
        }
        let block = RawCommand {
            address,
            flags: CommandFlags {
                poll: true,
                enable: state.enabled,
                update: false,
                direction: state.direction,
            },
            level: state.commanded_level,
        };
        out.push_poll(block, split_sensed(reading));
        return;
    }

    // Disable before touching level/direction; enable only once they are set.
    if !cmd.flags.enable {
        io.set_enabled(index, false);
    }
    if cmd.flags.update {
        state.commanded_level = cmd.level;
        io.write_commanded_level(index, cmd.level);
    }
    if cmd.flags.direction != state.direction && ctx.scanning {
        debug!("channel {address}: direction change held during scan");
    } else {
        state.direction = cmd.flags.direction;
        io.set_direction(index, state.direction);
    }
    if cmd.flags.enable {
        io.set_enabled(index, true);
    }
    state.enabled = cmd.flags.enable;

    let block = RawCommand {
        address,
        flags: CommandFlags {
            poll: false,
            enable: state.enabled,
            update: cmd.flags.update,
            direction: state.direction,
        },
        level: state.commanded_level,
    };
    out.push_control(block);
}
