//! Session Tests for rf-digit-wheel
//!
//! End-to-end sessions on the logical clock:
//! - Outcome distribution per wheel (χ² against uniform)
//! - Cosmetic tick independence of the committed outcome
//! - Cascade timing as seen through a stage trace
//! - Restart after completion and watchdog recovery
//! - Config files driving the coordinator

use rf_digit_wheel::{
    MachineConfig, SpinCoordinator, SpinPhase, TimingConfig, TimingProfile,
    WheelSpec,
};
use rf_stage::{StageCategory, StageTrace};

fn studio(config: MachineConfig) -> MachineConfig {
    config.with_profile(TimingProfile::Studio)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISTRIBUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_digit_distribution_is_uniform() {
    let mut coordinator = SpinCoordinator::with_seed(studio(MachineConfig::four_digit()), 42).unwrap();
    coordinator.set_stage_recording(false);

    for _ in 0..5000 {
        coordinator.spin();
        coordinator.run_until_complete();
    }

    let stats = coordinator.stats();
    assert_eq!(stats.sessions, 5000);
    assert_eq!(stats.watchdog_completions, 0);
    assert!(stats.min_final.unwrap() >= 1000);
    assert!(stats.max_final.unwrap() <= 2999);

    // Wheel 0 only ever shows 1 or 2
    assert_eq!(stats.digit_counts[0][0], 0);
    assert_eq!(stats.digit_counts[0][3..].iter().sum::<u64>(), 0);

    for wheel in 0..4 {
        let chi = stats.chi_square(wheel).unwrap();
        // Far beyond the p = 0.001 bound for df <= 9
        assert!(chi < 45.0, "wheel {} chi2 = {}", wheel, chi);
    }
}

#[test]
fn test_tick_speed_does_not_change_outcome() {
    let with_tick = |tick_ms: u64, seed: u64| {
        let config = MachineConfig {
            name: "tick".into(),
            wheels: (0..4).map(|_| WheelSpec::decimal(tick_ms)).collect(),
            timing: TimingConfig::normal(),
        };
        let mut coordinator = SpinCoordinator::with_seed(config, seed).unwrap();
        coordinator.spin();
        coordinator.run_until_complete().unwrap()
    };

    for seed in 0..10 {
        assert_eq!(with_tick(10, seed), with_tick(500, seed));
    }
}

#[test]
fn test_cosmetic_ticks_run_while_spinning() {
    let mut coordinator = SpinCoordinator::with_seed(MachineConfig::four_digit(), 3).unwrap();
    coordinator.spin();
    coordinator.advance_to(1000);
    for wheel in coordinator.wheels() {
        assert!(wheel.is_spinning());
        assert!(wheel.ticks() >= 1000 / wheel.spec().tick_ms);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CASCADE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_trace_of_natural_session() {
    let mut coordinator = SpinCoordinator::with_seed(MachineConfig::four_digit(), 17).unwrap();
    let generation = coordinator.spin().unwrap();
    let number = coordinator.run_until_complete().unwrap();

    let events = coordinator.drain_stages();
    let trace = StageTrace::collect(generation, "four_digit", &events);

    assert_eq!(trace.reveal_gaps(), vec![1000, 2500, 4000]);
    assert_eq!(trace.reveal_times().first(), Some(&(0, 2000)));
    assert_eq!(trace.final_number(), Some(number));
    assert_eq!(trace.duration_ms(), 9500);
    assert!(!trace.was_forced());
    assert!(trace.events_by_category(StageCategory::Watchdog).is_empty());
}

#[test]
fn test_turbo_profile_scales_cascade() {
    let config = MachineConfig::four_digit().with_profile(TimingProfile::Turbo);
    let mut coordinator = SpinCoordinator::with_seed(config, 17).unwrap();
    let generation = coordinator.spin().unwrap();
    coordinator.run_until_complete();

    let trace = StageTrace::collect(generation, "four_digit", &coordinator.drain_stages());
    assert_eq!(trace.reveal_gaps(), vec![250, 625, 1000]);
    assert_eq!(trace.reveal_times().first(), Some(&(0, 500)));
}

#[test]
fn test_watchdog_session_then_restart() {
    let timing = TimingConfig {
        reveal_gaps_ms: vec![1000, 2500, 40000],
        ..TimingConfig::normal()
    };
    let config = MachineConfig::four_digit().with_timing(timing);
    let mut coordinator = SpinCoordinator::with_seed(config, 8).unwrap();

    let first = coordinator.spin().unwrap();
    coordinator.run_until_complete();
    let trace = StageTrace::collect(first, "four_digit", &coordinator.drain_stages());
    assert!(trace.was_forced());
    assert_eq!(trace.events_by_type("wheel_forced").len(), 1);

    // The cancelled reveal of the old session must never land
    let second = coordinator.spin().unwrap();
    assert!(coordinator
        .pending_timers()
        .iter()
        .all(|t| t.generation == second));
    coordinator.run_until_complete();
    assert_eq!(coordinator.phase(), SpinPhase::Complete);
    assert_eq!(coordinator.generation(), second);
    assert_eq!(coordinator.stats().watchdog_completions, 2);
    assert!(coordinator.drain_stages().iter().all(|e| e.is_from(second)));
    assert_eq!(coordinator.session().revealed().len(), 4);
}

#[test]
fn test_every_session_completes_exactly_once() {
    let mut coordinator = SpinCoordinator::with_seed(MachineConfig::four_digit(), 5).unwrap();
    for _ in 0..10 {
        coordinator.spin();
        coordinator.run_until_complete();
    }
    let generations: Vec<u64> = std::iter::from_fn(|| coordinator.take_completed())
        .map(|c| c.generation)
        .collect();
    assert_eq!(generations, (1..=10).collect::<Vec<_>>());
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG FILES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_yaml_machine_drives_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.yaml");
    let yaml = MachineConfig::decimal(6)
        .with_profile(TimingProfile::Studio)
        .to_yaml()
        .unwrap();
    std::fs::write(&path, yaml).unwrap();

    let config = MachineConfig::load(&path).unwrap();
    assert_eq!(config.wheel_count(), 6);

    let mut coordinator = SpinCoordinator::with_seed(config, 1).unwrap();
    coordinator.spin();
    let number = coordinator.run_until_complete().unwrap();
    assert!(number <= 999_999);
    assert_eq!(coordinator.session().revealed().len(), 6);
}

#[test]
fn test_invalid_range_is_rejected() {
    let json = r#"{"name": "bad", "wheels": [{"min": 5, "max": 2}]}"#;
    assert!(MachineConfig::from_json(json).is_err());
}
