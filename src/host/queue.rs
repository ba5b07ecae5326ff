//! FIFO of command sets waiting for the dispatch loop.
//!
//! Each set carries the pause that must follow it; the queue releases the
//! next set only once the pause of the previously released one has run
//! out. The first set is released immediately.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::ChannelCommandSet;

#[derive(Debug, Default)]
pub struct CommandQueue {
    sets: VecDeque<ChannelCommandSet>,
    /// When the last set was released, and the pause it asked for.
    last_release: Option<(Instant, Duration)>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `set`; with `flush` everything still queued is dropped first.
    pub fn push(&mut self, set: ChannelCommandSet, flush: bool) {
        if flush {
            self.sets.clear();
        }
        self.sets.push_back(set);
    }

    /// Append several sets in order, optionally dropping the backlog first.
    pub fn extend(&mut self, sets: impl IntoIterator<Item = ChannelCommandSet>, flush: bool) {
        if flush {
            self.sets.clear();
        }
        self.sets.extend(sets);
    }

    /// `true` if a set is queued and the previous pause has elapsed.
    pub fn is_ready(&self, now: Instant) -> bool {
        if self.sets.is_empty() {
            return false;
        }
        match self.last_release {
            Some((at, delay)) => now.saturating_duration_since(at) >= delay,
            None => true,
        }
    }

    /// Release the next set if [`is_ready`](Self::is_ready).
    pub fn pop_ready(&mut self, now: Instant) -> Option<ChannelCommandSet> {
        if !self.is_ready(now) {
            return None;
        }
        let set = self.sets.pop_front()?;
        self.last_release = Some((now, set.delay));
        Some(set)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}
