//! Logical-time timer queue
//!
//! Every cosmetic tick, cascade step and watchdog is a one-shot timer tagged
//! with the session generation that scheduled it. Timers of a generation can
//! be cancelled as a set. Due timers fire in deadline order; timers with the
//! same deadline fire in the order they were scheduled.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer popped from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer<T> {
    pub id: TimerId,
    pub deadline_ms: u64,
    pub generation: u64,
    pub payload: T,
}

#[derive(Debug)]
struct Entry<T> {
    deadline_ms: u64,
    id: TimerId,
    generation: u64,
    payload: T,
}

impl<T> Entry<T> {
    fn key(&self) -> (u64, TimerId) {
        (self.deadline_ms, self.id)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Min-heap of one-shot timers with lazy cancellation
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    live: HashSet<TimerId>,
    next_id: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedule `payload` to fire at `deadline_ms`
    pub fn schedule(&mut self, deadline_ms: u64, generation: u64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        self.heap.push(Reverse(Entry {
            deadline_ms,
            id,
            generation,
            payload,
        }));
        id
    }

    /// Cancel one timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id)
    }

    /// Cancel every pending timer of a generation
    pub fn cancel_generation(&mut self, generation: u64) -> usize {
        let doomed: Vec<TimerId> = self
            .heap
            .iter()
            .filter(|Reverse(e)| e.generation == generation && self.live.contains(&e.id))
            .map(|Reverse(e)| e.id)
            .collect();
        for id in &doomed {
            self.live.remove(id);
        }
        self.compact();
        doomed.len()
    }

    /// Pop the earliest timer due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Timer<T>> {
        self.skip_cancelled();
        let due = matches!(self.heap.peek(), Some(Reverse(e)) if e.deadline_ms <= now_ms);
        if !due {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.id);
        Some(Timer {
            id: entry.id,
            deadline_ms: entry.deadline_ms,
            generation: entry.generation,
            payload: entry.payload,
        })
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.skip_cancelled();
        self.heap.peek().map(|Reverse(e)| e.deadline_ms)
    }

    /// Is this timer still pending?
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.live.contains(&id)
    }

    /// Number of pending timers
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Number of pending timers of one generation
    pub fn pending_for(&self, generation: u64) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(e)| e.generation == generation && self.live.contains(&e.id))
            .count()
    }

    /// Pending timers sorted by firing order
    pub fn snapshot(&self) -> Vec<Timer<T>> {
        let mut pending: Vec<Timer<T>> = self
            .heap
            .iter()
            .filter(|Reverse(e)| self.live.contains(&e.id))
            .map(|Reverse(e)| Timer {
                id: e.id,
                deadline_ms: e.deadline_ms,
                generation: e.generation,
                payload: e.payload.clone(),
            })
            .collect();
        pending.sort_by_key(|t| (t.deadline_ms, t.id));
        pending
    }

    /// Drop every timer
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn skip_cancelled(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.live.contains(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }

    fn compact(&mut self) {
        let live = &self.live;
        self.heap.retain(|Reverse(e)| live.contains(&e.id));
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
