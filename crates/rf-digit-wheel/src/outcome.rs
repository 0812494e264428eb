//! Pluggable outcome overrides
//!
//! The engine's outcome is a uniform draw per wheel. A product may still want
//! to force a specific number on particular spins ("lucky number on the
//! fifth spin"). That rule lives behind [`OutcomeOverride`] and is consulted
//! once per accepted `spin()`; the forced digits are still committed at
//! wheel start and revealed unchanged.

use std::collections::VecDeque;

/// Source of forced outcomes
pub trait OutcomeOverride: Send {
    /// Number to force on the spin with this 1-based index, if any
    fn forced_number(&mut self, spin_index: u64) -> Option<u64>;
}

/// Forces queued numbers, one per spin, starting at a given spin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuckySchedule {
    first_spin: u64,
    queue: VecDeque<u64>,
}

impl LuckySchedule {
    /// Force `numbers` in order from spin `first_spin` (1-based) onward
    pub fn new(first_spin: u64, numbers: impl IntoIterator<Item = u64>) -> Self {
        Self {
            first_spin: first_spin.max(1),
            queue: numbers.into_iter().collect(),
        }
    }

    /// Numbers not yet forced
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// True once every number has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

impl OutcomeOverride for LuckySchedule {
    fn forced_number(&mut self, spin_index: u64) -> Option<u64> {
        if spin_index < self.first_spin {
            return None;
        }
        self.queue.pop_front()
    }
}

/// Never forces anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverride;

impl OutcomeOverride for NoOverride {
    fn forced_number(&mut self, _spin_index: u64) -> Option<u64> {
        None
    }
}
