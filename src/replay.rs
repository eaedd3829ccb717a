use std::collections::VecDeque;

use rand::{Rng, seq::IteratorRandom};

use crate::{
    error::{Error, Result},
    experience::Transition,
};

/// Bounded FIFO store of transitions for experience replay.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest one when full.
    pub fn store(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `min(k, len)` distinct transitions uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<Vec<&Transition>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.buffer.is_empty() {
            return Err(Error::EmptyBufferSample);
        }
        Ok(self.buffer.iter().choose_multiple(rng, k))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
