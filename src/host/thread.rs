//! Named worker thread spawning.
//!
//! The dispatch loop runs on its own OS thread. Naming it makes it easy
//! to spot in debuggers and in log records that include the thread name.

use std::io;
use std::thread::JoinHandle;

/// Stack size for link worker threads. Frames are tiny; this leaves room
/// for the logger backend.
pub const WORKER_STACK_KB: usize = 64;

/// Spawn `f` on a thread called `name`.
pub fn spawn_named(name: &str, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::info!("Spawning '{}' (stack={}KB)", name, WORKER_STACK_KB);
    std::thread::Builder::new()
        .name(name.into())
        .stack_size(WORKER_STACK_KB * 1024)
        .spawn(f)
}
