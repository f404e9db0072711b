/// Bounded buffer of recent live ticks for the selected symbol
use std::collections::VecDeque;

use crate::types::LiveTick;

pub const DEFAULT_LIVE_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct LiveTickBuffer {
    ticks: VecDeque<LiveTick>,
    capacity: usize,
}

impl LiveTickBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LiveTickBuffer {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a tick. Returns `false` when its price repeats the last tick's price.
    /// The oldest tick is evicted once the buffer is full.
    pub fn push(&mut self, tick: LiveTick) -> bool {
        if self.ticks.back().is_some_and(|last| last.price == tick.price) {
            return false;
        }

        if self.ticks.len() >= self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
        true
    }

    pub fn last(&self) -> Option<&LiveTick> {
        self.ticks.back()
    }

    pub fn all(&self) -> Vec<LiveTick> {
        self.ticks.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
    }
}

impl Default for LiveTickBuffer {
    fn default() -> Self {
        LiveTickBuffer::new(DEFAULT_LIVE_CAPACITY)
    }
}
