//! SpinCoordinator — session lifecycle, reveal cascade and watchdog
//!
//! ## State machine
//!
//! ```text
//! Idle ──spin()──> Spinning ──1st reveal──> Finalizing ──Nth reveal──> Complete
//!                     │                         │                         │
//!                     └────────watchdog─────────┴──────────>──────────────┘
//!                                                                         │
//!                         Complete ──spin()──> Spinning (generation + 1) ─┘
//! ```
//!
//! All work happens inside timer dispatch on a logical millisecond clock.
//! Each reveal is scheduled from the previous reveal, never from the session
//! start, so a late reveal pushes the rest of the cascade back by the same
//! amount. Every timer carries the generation that scheduled it; a new
//! `spin()` cancels the previous generation's timers as a set and dispatch
//! drops anything whose generation is not current.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use rf_stage::{Stage, StageEvent};

use crate::audio::AudioSync;
use crate::config::{digits_to_number, MachineConfig};
use crate::error::{AudioError, WheelResult};
use crate::outcome::OutcomeOverride;
use crate::stats::SessionStats;
use crate::timers::{Timer, TimerId, TimerQueue};
use crate::wheel::{WheelEngine, WheelView};

/// Timer payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Cosmetic display shuffle of one wheel
    CosmeticTick { wheel: usize },
    /// Cascade step: stop and reveal one wheel
    Reveal { wheel: usize },
    /// Hard deadline for the session
    Watchdog,
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    #[default]
    Idle,
    /// Wheels spinning, nothing revealed yet
    Spinning,
    /// Cascade running, some wheels revealed
    Finalizing,
    /// Final number fixed
    Complete,
}

impl SpinPhase {
    /// Session in flight (spin() is a no-op)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Spinning | Self::Finalizing)
    }
}

/// Outcome of a reveal notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealDisposition {
    Recorded,
    /// Generation superseded (or no session yet)
    Stale,
    AlreadyComplete,
    /// Wheel already revealed in this session
    Duplicate,
    /// Unknown wheel or digit outside its range
    OutOfRange,
    /// Value is not the commit of a stopped wheel
    Uncommitted,
}

/// State of the current (or last) session
#[derive(Debug, Clone, Default)]
pub struct SpinSession {
    generation: u64,
    revealed: BTreeMap<usize, u8>,
    phase: SpinPhase,
    final_number: Option<u64>,
    started_at_ms: u64,
    watchdog: Option<TimerId>,
    forced_wheels: Vec<usize>,
}

impl SpinSession {
    fn begin(generation: u64, now_ms: u64) -> Self {
        Self {
            generation,
            phase: SpinPhase::Spinning,
            started_at_ms: now_ms,
            ..Default::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    /// Revealed digits keyed by wheel index
    pub fn revealed(&self) -> &BTreeMap<usize, u8> {
        &self.revealed
    }

    /// Defined only once the session is complete
    pub fn final_number(&self) -> Option<u64> {
        self.final_number
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Wheels settled by the watchdog instead of a natural reveal
    pub fn forced_wheels(&self) -> &[usize] {
        &self.forced_wheels
    }
}

/// A finished session, handed to the result lookup exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub generation: u64,
    pub final_number: u64,
    /// Settled digits in wheel order
    pub digits: Vec<u8>,
    pub forced_wheels: Vec<usize>,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
}

impl CompletedSession {
    pub fn was_forced(&self) -> bool {
        !self.forced_wheels.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.completed_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Renderer snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineView {
    pub generation: u64,
    pub phase: SpinPhase,
    pub wheels: Vec<WheelView>,
    /// Per wheel, the revealed digit if any
    pub revealed: Vec<Option<u8>>,
    pub final_number: Option<u64>,
}

impl MachineView {
    /// Whether a renderer may offer the spin action
    pub fn can_spin(&self) -> bool {
        !self.phase.is_active()
    }
}

/// Orchestrates N wheels through one session at a time
pub struct SpinCoordinator {
    config: MachineConfig,
    wheels: Vec<WheelEngine>,
    session: SpinSession,
    timers: TimerQueue<TimerEvent>,
    now_ms: u64,
    outcome_override: Option<Box<dyn OutcomeOverride>>,
    audio: Option<Box<dyn AudioSync>>,
    stages: Vec<StageEvent>,
    record_stages: bool,
    completed: VecDeque<CompletedSession>,
    spin_count: u64,
    stats: SessionStats,
}

impl SpinCoordinator {
    /// Create with OS entropy
    pub fn new(config: MachineConfig) -> WheelResult<Self> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create with a fixed seed for reproducible sessions
    pub fn with_seed(config: MachineConfig, seed: u64) -> WheelResult<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MachineConfig, mut rng: StdRng) -> WheelResult<Self> {
        config.validate()?;
        let wheels = config
            .wheels
            .iter()
            .enumerate()
            .map(|(index, spec)| WheelEngine::new(index, *spec, StdRng::from_rng(&mut rng)))
            .collect();
        let stats = SessionStats::new(&config);

        log::debug!(
            "[Coordinator] '{}' ready with {} wheels, range {:?}",
            config.name,
            config.wheel_count(),
            config.final_number_range()
        );

        Ok(Self {
            config,
            wheels,
            session: SpinSession::default(),
            timers: TimerQueue::new(),
            now_ms: 0,
            outcome_override: None,
            audio: None,
            stages: Vec::new(),
            record_stages: true,
            completed: VecDeque::new(),
            spin_count: 0,
            stats,
        })
    }

    /// Builder: install an outcome override
    pub fn with_override(mut self, outcome_override: Box<dyn OutcomeOverride>) -> Self {
        self.outcome_override = Some(outcome_override);
        self
    }

    /// Builder: install an audio collaborator
    pub fn with_audio(mut self, audio: Box<dyn AudioSync>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Turn stage recording on or off (off for bulk simulation)
    pub fn set_stage_recording(&mut self, enabled: bool) {
        self.record_stages = enabled;
        if !enabled {
            self.stages.clear();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SESSION LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start a new session. Returns the new generation, or None when a
    /// session is already in flight (the call is then a no-op).
    pub fn spin(&mut self) -> Option<u64> {
        if self.session.phase.is_active() {
            log::debug!(
                "[Coordinator] spin ignored, generation {} is {:?}",
                self.session.generation,
                self.session.phase
            );
            return None;
        }

        let previous = self.session.generation;
        self.timers.cancel_generation(previous);

        let generation = previous + 1;
        self.spin_count += 1;
        self.session = SpinSession::begin(generation, self.now_ms);

        let forced = self.forced_digits();
        let now = self.now_ms;
        for wheel in &mut self.wheels {
            wheel.reset(&mut self.timers);
        }
        for (index, wheel) in self.wheels.iter_mut().enumerate() {
            let digit = forced.as_ref().map(|digits| digits[index]);
            wheel.start(&mut self.timers, now, generation, digit);
        }

        self.emit(Stage::SpinStart);
        for index in 0..self.wheels.len() {
            self.emit(Stage::WheelSpinning {
                wheel_index: index as u8,
            });
        }

        let watchdog = self.timers.schedule(
            now.saturating_add(self.config.timing.watchdog_ms),
            generation,
            TimerEvent::Watchdog,
        );
        self.session.watchdog = Some(watchdog);
        self.schedule_reveal(0, self.config.timing.initial_reveal_delay_ms);

        self.notify_audio("play_loop", |audio, at| audio.play_loop(at));

        log::info!(
            "[Coordinator] spin #{} started (generation {})",
            self.spin_count,
            generation
        );
        Some(generation)
    }

    /// Record a wheel's revealed digit. Reached only through a wheel's
    /// `stop()`: the value must be the commit the stopped wheel now shows.
    ///
    /// Only the current generation can write to the session; anything else
    /// is reported and discarded.
    pub(crate) fn on_wheel_revealed(&mut self, generation: u64, index: usize, value: u8) -> RevealDisposition {
        if generation != self.session.generation || self.session.phase == SpinPhase::Idle {
            log::debug!(
                "[Coordinator] stale reveal from generation {} (current {})",
                generation,
                self.session.generation
            );
            return RevealDisposition::Stale;
        }
        if self.session.phase == SpinPhase::Complete {
            return RevealDisposition::AlreadyComplete;
        }
        match self.config.wheels.get(index) {
            Some(spec) if spec.contains(value) => {}
            _ => {
                log::warn!("[Coordinator] reveal out of range: wheel {} digit {}", index, value);
                return RevealDisposition::OutOfRange;
            }
        }
        if self.session.revealed.contains_key(&index) {
            return RevealDisposition::Duplicate;
        }
        let settled = self
            .wheels
            .get(index)
            .is_some_and(|wheel| !wheel.is_spinning() && wheel.display_value() == value);
        if !settled {
            log::warn!(
                "[Coordinator] wheel {} did not settle on {}, reveal rejected",
                index,
                value
            );
            return RevealDisposition::Uncommitted;
        }

        self.session.revealed.insert(index, value);
        self.emit(Stage::WheelReveal {
            wheel_index: index as u8,
            digit: value,
        });
        log::debug!("[Coordinator] wheel {} revealed {}", index, value);

        let wheel_count = self.wheels.len();
        if self.session.revealed.len() == wheel_count {
            self.finalize();
        } else {
            self.session.phase = SpinPhase::Finalizing;
            let next = index + 1;
            if next < wheel_count && !self.session.revealed.contains_key(&next) {
                self.schedule_reveal(next, self.config.timing.gap_after(index));
            }
        }
        RevealDisposition::Recorded
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CLOCK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance the clock to an observed time, firing every timer due on the way.
    ///
    /// Cosmetic ticks and the watchdog run at their deadlines. A reveal runs
    /// at `target_ms`, the time it is actually observed, so a late
    /// observation pushes the rest of the cascade back by the same amount.
    pub fn advance_to(&mut self, target_ms: u64) {
        if target_ms < self.now_ms {
            return;
        }
        while let Some(timer) = self.timers.pop_due(target_ms) {
            self.now_ms = match timer.payload {
                TimerEvent::Reveal { .. } => target_ms,
                _ => self.now_ms.max(timer.deadline_ms),
            };
            self.dispatch(timer);
        }
        self.now_ms = target_ms;
        self.notify_audio("update", |audio, at| audio.update(at));
    }

    /// Advance the clock by `ms`
    pub fn advance_by(&mut self, ms: u64) {
        self.advance_to(self.now_ms.saturating_add(ms));
    }

    /// Drive the current session to completion on the logical clock
    pub fn run_until_complete(&mut self) -> Option<u64> {
        while self.session.phase.is_active() {
            let Some(next) = self.timers.next_deadline() else {
                break;
            };
            self.advance_to(next);
        }
        self.session.final_number
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OBSERVATION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn session(&self) -> &SpinSession {
        &self.session
    }

    pub fn phase(&self) -> SpinPhase {
        self.session.phase
    }

    pub fn generation(&self) -> u64 {
        self.session.generation
    }

    pub fn can_spin(&self) -> bool {
        !self.session.phase.is_active()
    }

    pub fn wheels(&self) -> &[WheelEngine] {
        &self.wheels
    }

    /// Accepted spins so far
    pub fn spin_count(&self) -> u64 {
        self.spin_count
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Pending timers in firing order
    pub fn pending_timers(&self) -> Vec<Timer<TimerEvent>> {
        self.timers.snapshot()
    }

    /// Renderer snapshot
    pub fn snapshot(&self) -> MachineView {
        MachineView {
            generation: self.session.generation,
            phase: self.session.phase,
            wheels: self.wheels.iter().map(WheelEngine::view).collect(),
            revealed: (0..self.wheels.len())
                .map(|i| self.session.revealed.get(&i).copied())
                .collect(),
            final_number: self.session.final_number,
        }
    }

    /// Take recorded stage events
    pub fn drain_stages(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.stages)
    }

    /// Take the next completed session awaiting lookup
    pub fn take_completed(&mut self) -> Option<CompletedSession> {
        self.completed.pop_front()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    fn dispatch(&mut self, timer: Timer<TimerEvent>) {
        if timer.generation != self.session.generation {
            log::trace!(
                "[Coordinator] dropped {:?} from generation {}",
                timer.payload,
                timer.generation
            );
            return;
        }
        match timer.payload {
            TimerEvent::CosmeticTick { wheel } => {
                if let Some(engine) = self.wheels.get_mut(wheel) {
                    engine.on_tick(&mut self.timers, timer.id, self.now_ms, timer.generation);
                }
            }
            TimerEvent::Reveal { wheel } => {
                self.reveal_wheel(timer.generation, wheel);
            }
            TimerEvent::Watchdog => self.on_watchdog(),
        }
    }

    /// Stop one wheel and record the commit it reveals
    fn reveal_wheel(&mut self, generation: u64, index: usize) -> RevealDisposition {
        if generation != self.session.generation || self.session.phase == SpinPhase::Idle {
            return RevealDisposition::Stale;
        }
        if self.session.phase == SpinPhase::Complete {
            return RevealDisposition::AlreadyComplete;
        }
        if self.session.revealed.contains_key(&index) {
            return RevealDisposition::Duplicate;
        }
        let Some(wheel) = self.wheels.get_mut(index) else {
            return RevealDisposition::OutOfRange;
        };
        let Some(value) = wheel.stop(&mut self.timers) else {
            log::warn!("[Coordinator] wheel {} had nothing to reveal", index);
            return RevealDisposition::Uncommitted;
        };
        self.on_wheel_revealed(generation, index, value)
    }

    fn on_watchdog(&mut self) {
        if self.session.phase == SpinPhase::Complete {
            return;
        }
        self.session.watchdog = None;

        let missing: Vec<usize> = (0..self.wheels.len())
            .filter(|i| !self.session.revealed.contains_key(i))
            .collect();
        log::warn!(
            "[Coordinator] watchdog fired for generation {}, forcing wheels {:?}",
            self.session.generation,
            missing
        );
        self.emit(Stage::WatchdogFired {
            missing: missing.iter().map(|&i| i as u8).collect(),
        });

        // No further reveal of this generation may run
        self.timers.cancel_generation(self.session.generation);

        for &index in &missing {
            let digit = self.wheels[index].settle_forced(&mut self.timers);
            self.session.revealed.insert(index, digit);
            self.emit(Stage::WheelForced {
                wheel_index: index as u8,
                digit,
            });
        }
        self.session.forced_wheels = missing;
        self.finalize();
    }

    fn finalize(&mut self) {
        let digits: Vec<u8> = self.session.revealed.values().copied().collect();
        let final_number = digits_to_number(digits.iter().copied());

        self.session.phase = SpinPhase::Complete;
        self.session.final_number = Some(final_number);
        if let Some(watchdog) = self.session.watchdog.take() {
            self.timers.cancel(watchdog);
        }
        self.timers.cancel_generation(self.session.generation);

        let forced = !self.session.forced_wheels.is_empty();
        self.emit(Stage::SpinComplete {
            final_number,
            forced,
        });

        let completed = CompletedSession {
            generation: self.session.generation,
            final_number,
            digits,
            forced_wheels: self.session.forced_wheels.clone(),
            started_at_ms: self.session.started_at_ms,
            completed_at_ms: self.now_ms,
        };
        self.stats.record(&completed);
        self.completed.push_back(completed);

        self.notify_audio("fade_out", |audio, at| audio.fade_out(at));

        log::info!(
            "[Coordinator] generation {} complete: {}{}",
            self.session.generation,
            final_number,
            if forced { " (watchdog)" } else { "" }
        );
    }

    fn schedule_reveal(&mut self, wheel: usize, delay_ms: u64) {
        self.timers.schedule(
            self.now_ms.saturating_add(delay_ms),
            self.session.generation,
            TimerEvent::Reveal { wheel },
        );
        self.emit(Stage::RevealScheduled {
            wheel_index: wheel as u8,
            delay_ms,
        });
    }

    fn forced_digits(&mut self) -> Option<Vec<u8>> {
        let number = self
            .outcome_override
            .as_mut()?
            .forced_number(self.spin_count)?;
        match self.config.split_number(number) {
            Some(digits) => {
                log::info!("[Coordinator] spin #{} forced to {}", self.spin_count, number);
                Some(digits)
            }
            None => {
                log::warn!(
                    "[Coordinator] forced number {} does not fit '{}', ignoring",
                    number,
                    self.config.name
                );
                None
            }
        }
    }

    fn emit(&mut self, stage: Stage) {
        if self.record_stages {
            self.stages
                .push(StageEvent::new(stage, self.now_ms, self.session.generation));
        }
    }

    fn notify_audio<F>(&mut self, action: &str, call: F)
    where
        F: FnOnce(&mut dyn AudioSync, u64) -> Result<(), AudioError>,
    {
        let now = self.now_ms;
        if let Some(audio) = self.audio.as_mut() {
            if let Err(e) = call(audio.as_mut(), now) {
                log::warn!("[Audio] {} failed: {}", action, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FadeCue;
    use crate::outcome::LuckySchedule;
    use crate::timing::{TimingConfig, MAX_DELAY_MS};

    fn four_digit(seed: u64) -> SpinCoordinator {
        SpinCoordinator::with_seed(MachineConfig::four_digit(), seed).unwrap()
    }

    fn reveal_times(stages: &[StageEvent]) -> Vec<u64> {
        stages
            .iter()
            .filter(|e| matches!(e.stage, Stage::WheelReveal { .. }))
            .map(|e| e.timestamp_ms)
            .collect()
    }

    #[test]
    fn test_full_session_completes_in_range() {
        for seed in 0..20 {
            let mut coordinator = four_digit(seed);
            assert_eq!(coordinator.spin(), Some(1));

            let number = coordinator.run_until_complete().unwrap();
            assert!((1000..=2999).contains(&number), "got {}", number);
            assert_eq!(coordinator.phase(), SpinPhase::Complete);

            let completed = coordinator.take_completed().unwrap();
            assert_eq!(completed.final_number, number);
            assert!(!completed.was_forced());
            assert!(coordinator.take_completed().is_none());
        }
    }

    #[test]
    fn test_normal_cascade_timing() {
        let mut coordinator = four_digit(7);
        coordinator.spin();
        coordinator.run_until_complete();

        let stages = coordinator.drain_stages();
        assert_eq!(reveal_times(&stages), vec![2000, 3000, 5500, 9500]);
        assert!(matches!(stages.first().map(|e| &e.stage), Some(Stage::SpinStart)));
        assert!(matches!(
            stages.last().map(|e| &e.stage),
            Some(Stage::SpinComplete { forced: false, .. })
        ));
    }

    #[test]
    fn test_phases_follow_reveals() {
        let mut coordinator = four_digit(3);
        assert_eq!(coordinator.phase(), SpinPhase::Idle);
        coordinator.spin();
        assert_eq!(coordinator.phase(), SpinPhase::Spinning);

        coordinator.advance_to(1999);
        assert_eq!(coordinator.phase(), SpinPhase::Spinning);
        assert!(coordinator.session().revealed().is_empty());

        coordinator.advance_to(2000);
        assert_eq!(coordinator.phase(), SpinPhase::Finalizing);
        assert_eq!(coordinator.session().revealed().len(), 1);
        assert!(coordinator.session().final_number().is_none());

        coordinator.advance_to(3000);
        coordinator.advance_to(5500);
        assert_eq!(coordinator.phase(), SpinPhase::Finalizing);
        coordinator.advance_to(9500);
        assert_eq!(coordinator.phase(), SpinPhase::Complete);
        assert!(coordinator.session().final_number().is_some());
    }

    #[test]
    fn test_spin_while_active_is_noop() {
        let mut coordinator = four_digit(11);
        coordinator.spin();
        coordinator.advance_to(2500);

        let generation = coordinator.generation();
        let revealed = coordinator.session().revealed().clone();
        let pending = coordinator.pending_timers();

        assert_eq!(coordinator.spin(), None);
        assert!(!coordinator.can_spin());
        assert_eq!(coordinator.generation(), generation);
        assert_eq!(coordinator.session().revealed(), &revealed);
        assert_eq!(coordinator.pending_timers(), pending);
        assert_eq!(coordinator.spin_count(), 1);
    }

    #[test]
    fn test_watchdog_forces_missing_wheels() {
        let timing = TimingConfig {
            reveal_gaps_ms: vec![1000, 2500, 40000],
            ..TimingConfig::normal()
        };
        let config = MachineConfig::four_digit().with_timing(timing);
        let mut coordinator = SpinCoordinator::with_seed(config, 5).unwrap();
        coordinator.spin();

        let number = coordinator.run_until_complete().unwrap();
        assert_eq!(coordinator.now_ms(), 25000);
        assert!((1000..=2999).contains(&number));
        assert_eq!(coordinator.session().revealed().len(), 4);
        assert_eq!(coordinator.session().forced_wheels(), &[3]);
        assert!(coordinator.pending_timers().is_empty());

        let stages = coordinator.drain_stages();
        assert!(stages.iter().any(|e| matches!(
            &e.stage,
            Stage::WatchdogFired { missing } if missing == &vec![3]
        )));
        assert!(matches!(
            stages.last().map(|e| &e.stage),
            Some(Stage::SpinComplete { forced: true, .. })
        ));
        assert!(coordinator.take_completed().unwrap().was_forced());
    }

    #[test]
    fn test_watchdog_before_any_reveal() {
        let timing = TimingConfig {
            initial_reveal_delay_ms: 30000,
            ..TimingConfig::normal()
        };
        let config = MachineConfig::four_digit().with_timing(timing);
        let mut coordinator = SpinCoordinator::with_seed(config, 9).unwrap();
        coordinator.spin();

        let number = coordinator.run_until_complete().unwrap();
        assert!((1000..=2999).contains(&number));
        assert_eq!(coordinator.session().forced_wheels(), &[0, 1, 2, 3]);
        for wheel in coordinator.wheels() {
            assert!(!wheel.is_spinning());
        }
    }

    #[test]
    fn test_stale_reveal_is_discarded() {
        let mut coordinator = four_digit(21);
        let first = coordinator.spin().unwrap();
        coordinator.run_until_complete();
        let second = coordinator.spin().unwrap();
        assert_eq!(second, first + 1);

        assert_eq!(
            coordinator.on_wheel_revealed(first, 0, 1),
            RevealDisposition::Stale
        );
        assert!(coordinator.session().revealed().is_empty());
        assert_eq!(coordinator.phase(), SpinPhase::Spinning);
    }

    #[test]
    fn test_reveal_dispositions() {
        let mut coordinator = four_digit(2);
        assert_eq!(coordinator.reveal_wheel(0, 0), RevealDisposition::Stale);

        let generation = coordinator.spin().unwrap();
        assert_eq!(coordinator.reveal_wheel(generation, 9), RevealDisposition::OutOfRange);
        assert_eq!(
            coordinator.on_wheel_revealed(generation, 0, 7),
            RevealDisposition::OutOfRange
        );

        assert_eq!(coordinator.reveal_wheel(generation, 2), RevealDisposition::Recorded);
        let shown = coordinator.wheels()[2].display_value();
        assert_eq!(coordinator.session().revealed().get(&2), Some(&shown));
        assert_eq!(coordinator.reveal_wheel(generation, 2), RevealDisposition::Duplicate);
        assert_eq!(
            coordinator.on_wheel_revealed(generation, 2, shown),
            RevealDisposition::Duplicate
        );

        coordinator.run_until_complete();
        assert_eq!(
            coordinator.reveal_wheel(generation, 0),
            RevealDisposition::AlreadyComplete
        );
    }

    #[test]
    fn test_spinning_wheel_cannot_be_written() {
        let mut coordinator = four_digit(31);
        let generation = coordinator.spin().unwrap();

        // Wheel 1 is still spinning: an in-range digit is not its reveal
        assert_eq!(
            coordinator.on_wheel_revealed(generation, 1, 4),
            RevealDisposition::Uncommitted
        );
        assert!(coordinator.session().revealed().is_empty());
        assert!(coordinator.wheels()[1].is_spinning());

        let number = coordinator.run_until_complete().unwrap();
        let view = coordinator.snapshot();
        let digits: Vec<u8> = view.revealed.iter().map(|d| d.unwrap()).collect();
        assert_eq!(crate::config::digits_to_number(digits), number);
        for wheel in &view.wheels {
            assert!(!wheel.spinning);
            assert_eq!(Some(wheel.display_value), view.revealed[wheel.index]);
        }
    }

    #[test]
    fn test_late_observation_delays_cascade() {
        let mut coordinator = four_digit(14);
        coordinator.spin();

        // First look at the clock comes 3 s after wheel 0 was due
        coordinator.advance_to(5000);
        assert_eq!(coordinator.session().revealed().len(), 1);
        let next_reveal = coordinator
            .pending_timers()
            .into_iter()
            .find(|t| matches!(t.payload, TimerEvent::Reveal { .. }))
            .unwrap();
        assert_eq!(next_reveal.payload, TimerEvent::Reveal { wheel: 1 });
        assert_eq!(next_reveal.deadline_ms, 6000);

        coordinator.advance_to(5999);
        assert_eq!(coordinator.session().revealed().len(), 1);
        coordinator.advance_to(6000);
        assert_eq!(coordinator.session().revealed().len(), 2);
        assert_eq!(reveal_times(&coordinator.drain_stages()), vec![5000, 6000]);
    }

    #[test]
    fn test_long_watchdog_does_not_overflow() {
        let timing = TimingConfig {
            watchdog_ms: MAX_DELAY_MS,
            ..TimingConfig::normal()
        };
        let config = MachineConfig::four_digit().with_timing(timing);
        let mut coordinator = SpinCoordinator::with_seed(config, 3).unwrap();
        coordinator.advance_to(10);
        coordinator.spin();

        let watchdog = coordinator
            .pending_timers()
            .into_iter()
            .find(|t| t.payload == TimerEvent::Watchdog)
            .unwrap();
        assert_eq!(watchdog.deadline_ms, 10 + MAX_DELAY_MS);

        assert!(coordinator.run_until_complete().is_some());
        assert!(coordinator.session().forced_wheels().is_empty());
        assert_eq!(coordinator.now_ms(), 10 + 9500);
    }

    #[test]
    fn test_unrepresentable_watchdog_rejected() {
        let timing = TimingConfig {
            watchdog_ms: u64::MAX,
            ..TimingConfig::normal()
        };
        let config = MachineConfig::four_digit().with_timing(timing);
        assert!(SpinCoordinator::with_seed(config, 3).is_err());
    }

    #[test]
    fn test_gaps_independent_of_initial_delay() {
        let gaps = |initial: u64| {
            let timing = TimingConfig {
                initial_reveal_delay_ms: initial,
                ..TimingConfig::normal()
            };
            let config = MachineConfig::four_digit().with_timing(timing);
            let mut coordinator = SpinCoordinator::with_seed(config, 1).unwrap();
            coordinator.spin();
            coordinator.run_until_complete();
            let times = reveal_times(&coordinator.drain_stages());
            times.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>()
        };
        assert_eq!(gaps(2000), vec![1000, 2500, 4000]);
        assert_eq!(gaps(500), gaps(2000));
        assert_eq!(gaps(7000), gaps(2000));
    }

    #[test]
    fn test_restart_schedules_only_new_generation() {
        let mut coordinator = four_digit(4);
        coordinator.spin();
        coordinator.run_until_complete();
        assert!(coordinator.pending_timers().is_empty());

        let generation = coordinator.spin().unwrap();
        assert!(coordinator
            .pending_timers()
            .iter()
            .all(|t| t.generation == generation));
        coordinator.run_until_complete();
        assert_eq!(coordinator.take_completed().unwrap().generation, 1);
        assert_eq!(coordinator.take_completed().unwrap().generation, 2);
    }

    #[test]
    fn test_lucky_schedule_forces_number() {
        let config = MachineConfig::four_digit().with_timing(TimingConfig::studio());
        let mut coordinator = SpinCoordinator::with_seed(config, 8)
            .unwrap()
            .with_override(Box::new(LuckySchedule::new(2, [1203])));

        coordinator.spin();
        coordinator.run_until_complete();
        coordinator.spin();
        assert_eq!(coordinator.run_until_complete(), Some(1203));
        assert_eq!(coordinator.take_completed().map(|c| c.generation), Some(1));
        let lucky = coordinator.take_completed().unwrap();
        assert_eq!(lucky.digits, vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_unfit_override_falls_back_to_draw() {
        let config = MachineConfig::four_digit().with_timing(TimingConfig::studio());
        let mut coordinator = SpinCoordinator::with_seed(config, 8)
            .unwrap()
            .with_override(Box::new(LuckySchedule::new(1, [3500])));
        coordinator.spin();
        let number = coordinator.run_until_complete().unwrap();
        assert!((1000..=2999).contains(&number));
    }

    #[test]
    fn test_unavailable_audio_does_not_block() {
        let mut coordinator = four_digit(6).with_audio(Box::new(FadeCue::unavailable()));
        coordinator.spin();
        assert!(coordinator.run_until_complete().is_some());
        assert!(coordinator.can_spin());
    }

    #[test]
    fn test_single_wheel_machine() {
        let config = MachineConfig::decimal(1);
        let mut coordinator = SpinCoordinator::with_seed(config, 12).unwrap();
        coordinator.spin();
        coordinator.advance_to(2000);
        assert_eq!(coordinator.phase(), SpinPhase::Complete);
        assert!(coordinator.session().final_number().unwrap() <= 9);
    }

    #[test]
    fn test_snapshot_tracks_reveals() {
        let mut coordinator = four_digit(13);
        coordinator.spin();
        coordinator.advance_to(2000);
        coordinator.advance_to(3000);

        let view = coordinator.snapshot();
        assert_eq!(view.generation, 1);
        assert!(!view.can_spin());
        assert!(view.revealed[0].is_some() && view.revealed[1].is_some());
        assert!(view.revealed[2].is_none());
        assert!(!view.wheels[0].spinning);
        assert!(view.wheels[3].spinning);
        assert_eq!(view.wheels[1].display_value, view.revealed[1].unwrap());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = |seed| {
            let mut coordinator = four_digit(seed);
            (0..5)
                .map(|_| {
                    coordinator.spin();
                    coordinator.run_until_complete().unwrap()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MachineConfig {
            wheels: Vec::new(),
            ..MachineConfig::four_digit()
        };
        assert!(SpinCoordinator::with_seed(config, 0).is_err());
    }
}
