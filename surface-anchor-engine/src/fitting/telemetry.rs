//! Rolling hit-rate of the detection loop, for the status readout.

use std::collections::VecDeque;

use bevy::prelude::Resource;

use constants::detection::FOUND_TIMER_CAPACITY;

/// Fixed-capacity ring of found/not-found samples, one per detection tick.
#[derive(Resource, Debug)]
pub struct FoundTimer {
    samples: VecDeque<bool>,
    capacity: usize,
}

impl Default for FoundTimer {
    fn default() -> Self {
        FoundTimer::with_capacity(FOUND_TIMER_CAPACITY)
    }
}

impl FoundTimer {
    pub fn with_capacity(capacity: usize) -> Self {
        FoundTimer {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, found: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(found);
    }

    /// Fraction of recent ticks that found a surface, 0.0 when idle.
    pub fn found_rate(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let hits = self.samples.iter().filter(|found| **found).count();
        hits as f32 / self.samples.len() as f32
    }

    pub fn last(&self) -> Option<bool> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
