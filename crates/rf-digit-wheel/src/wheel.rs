//! WheelEngine — one digit position
//!
//! Commit-then-reveal: the outcome is drawn once in [`WheelEngine::start`]
//! and only *displayed* by [`WheelEngine::stop`]. The cosmetic tick shuffles
//! `display_value` for show and never feeds the outcome, so tick speed and
//! tick count have no effect on the outcome distribution.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::WheelSpec;
use crate::coordinator::TimerEvent;
use crate::timers::{TimerId, TimerQueue};

/// What a renderer needs to draw one wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelView {
    pub index: usize,
    pub display_value: u8,
    pub spinning: bool,
}

/// Single wheel state machine
#[derive(Debug)]
pub struct WheelEngine {
    index: usize,
    spec: WheelSpec,
    /// Outcome of the current spin, hidden until reveal
    committed: Option<u8>,
    display: u8,
    spinning: bool,
    /// Pending cosmetic tick
    tick: Option<TimerId>,
    ticks: u64,
    rng: StdRng,
}

impl WheelEngine {
    pub fn new(index: usize, spec: WheelSpec, rng: StdRng) -> Self {
        Self {
            index,
            spec,
            committed: None,
            display: spec.min,
            spinning: false,
            tick: None,
            ticks: 0,
            rng,
        }
    }

    /// Commit an outcome and start the cosmetic tick.
    ///
    /// `forced` replaces the uniform draw when it lies inside the wheel range.
    /// Returns false (no-op) if the wheel is already spinning.
    pub fn start(
        &mut self,
        timers: &mut TimerQueue<TimerEvent>,
        now_ms: u64,
        generation: u64,
        forced: Option<u8>,
    ) -> bool {
        if self.spinning {
            return false;
        }

        let committed = match forced {
            Some(digit) if self.spec.contains(digit) => digit,
            Some(digit) => {
                log::warn!(
                    "[Wheel {}] forced digit {} outside [{}, {}], drawing instead",
                    self.index,
                    digit,
                    self.spec.min,
                    self.spec.max
                );
                self.draw_outcome()
            }
            None => self.draw_outcome(),
        };

        self.committed = Some(committed);
        self.spinning = true;
        self.ticks = 0;
        self.arm_tick(timers, now_ms, generation);
        true
    }

    /// Handle a fired cosmetic tick. Stale tick handles are ignored.
    pub fn on_tick(
        &mut self,
        timers: &mut TimerQueue<TimerEvent>,
        fired: TimerId,
        now_ms: u64,
        generation: u64,
    ) -> bool {
        if !self.spinning || self.tick != Some(fired) {
            return false;
        }
        let (low, high) = self.spec.display_bounds();
        self.display = self.rng.random_range(low..=high);
        self.ticks += 1;
        self.arm_tick(timers, now_ms, generation);
        true
    }

    /// Reveal the committed outcome. Returns None (no-op) if not spinning.
    pub fn stop(&mut self, timers: &mut TimerQueue<TimerEvent>) -> Option<u8> {
        if !self.spinning {
            return None;
        }
        let value = self.committed?;
        self.cancel_tick(timers);
        self.display = value;
        self.spinning = false;
        Some(value)
    }

    /// Settle a wheel that never revealed: a fresh uniform draw from
    /// `[min, max]`, the same distribution `start` commits from.
    pub fn settle_forced(&mut self, timers: &mut TimerQueue<TimerEvent>) -> u8 {
        self.cancel_tick(timers);
        let value = self.draw_outcome();
        self.committed = Some(value);
        self.display = value;
        self.spinning = false;
        value
    }

    /// Back to idle: no commitment, display at `min`
    pub fn reset(&mut self, timers: &mut TimerQueue<TimerEvent>) {
        self.cancel_tick(timers);
        self.committed = None;
        self.display = self.spec.min;
        self.spinning = false;
        self.ticks = 0;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn spec(&self) -> &WheelSpec {
        &self.spec
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub fn display_value(&self) -> u8 {
        self.display
    }

    /// Cosmetic ticks since the last start
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn view(&self) -> WheelView {
        WheelView {
            index: self.index,
            display_value: self.display,
            spinning: self.spinning,
        }
    }

    fn draw_outcome(&mut self) -> u8 {
        self.rng.random_range(self.spec.min..=self.spec.max)
    }

    fn arm_tick(&mut self, timers: &mut TimerQueue<TimerEvent>, now_ms: u64, generation: u64) {
        let id = timers.schedule(
            now_ms.saturating_add(self.spec.tick_ms),
            generation,
            TimerEvent::CosmeticTick { wheel: self.index },
        );
        self.tick = Some(id);
    }

    fn cancel_tick(&mut self, timers: &mut TimerQueue<TimerEvent>) {
        if let Some(id) = self.tick.take() {
            timers.cancel(id);
        }
    }
}
