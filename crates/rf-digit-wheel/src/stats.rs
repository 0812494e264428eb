//! Session statistics
//!
//! Tracks completed sessions and per-wheel digit histograms so the outcome
//! distribution can be checked against uniform.

use serde::{Deserialize, Serialize};

use crate::config::MachineConfig;
use crate::coordinator::CompletedSession;

/// χ² critical values at p = 0.001 for 1..=9 degrees of freedom
const CHI_SQUARE_CRITICAL_001: [f64; 9] = [
    10.828, 13.816, 16.266, 18.467, 20.515, 22.458, 24.322, 26.124, 27.877,
];

/// Aggregated statistics over completed sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub sessions: u64,
    pub natural_completions: u64,
    pub watchdog_completions: u64,
    /// Wheels the watchdog had to settle, summed over sessions
    pub forced_wheels: u64,
    pub min_final: Option<u64>,
    pub max_final: Option<u64>,
    /// Per wheel, count of each settled digit (index = digit)
    pub digit_counts: Vec<[u64; 10]>,
    /// Per wheel inclusive outcome range
    ranges: Vec<(u8, u8)>,
}

impl SessionStats {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            digit_counts: vec![[0; 10]; config.wheel_count()],
            ranges: config.wheels.iter().map(|w| (w.min, w.max)).collect(),
            ..Default::default()
        }
    }

    /// Record one completed session
    pub fn record(&mut self, session: &CompletedSession) {
        self.sessions += 1;
        if session.forced_wheels.is_empty() {
            self.natural_completions += 1;
        } else {
            self.watchdog_completions += 1;
            self.forced_wheels += session.forced_wheels.len() as u64;
        }

        self.min_final = Some(
            self.min_final
                .map_or(session.final_number, |m| m.min(session.final_number)),
        );
        self.max_final = Some(
            self.max_final
                .map_or(session.final_number, |m| m.max(session.final_number)),
        );

        for (counts, &digit) in self.digit_counts.iter_mut().zip(&session.digits) {
            if let Some(slot) = counts.get_mut(digit as usize) {
                *slot += 1;
            }
        }
    }

    /// Share of sessions the watchdog had to finish
    pub fn watchdog_rate(&self) -> f64 {
        if self.sessions > 0 {
            self.watchdog_completions as f64 / self.sessions as f64
        } else {
            0.0
        }
    }

    /// χ² statistic of one wheel's digits against uniform over its range.
    ///
    /// Returns None for an unknown wheel, a single-outcome wheel, or no data.
    pub fn chi_square(&self, wheel: usize) -> Option<f64> {
        let (min, max) = *self.ranges.get(wheel)?;
        let counts = self.digit_counts.get(wheel)?;
        let bins = &counts[min as usize..=max as usize];
        if bins.len() < 2 {
            return None;
        }
        let total: u64 = bins.iter().sum();
        if total == 0 {
            return None;
        }
        let expected = total as f64 / bins.len() as f64;
        Some(
            bins.iter()
                .map(|&observed| {
                    let diff = observed as f64 - expected;
                    diff * diff / expected
                })
                .sum(),
        )
    }

    /// Degrees of freedom for a wheel's χ² test
    pub fn degrees_of_freedom(&self, wheel: usize) -> Option<usize> {
        let (min, max) = *self.ranges.get(wheel)?;
        let bins = (max - min) as usize + 1;
        (bins >= 2).then_some(bins - 1)
    }

    /// Does the wheel pass a χ² uniformity test at p = 0.001?
    pub fn looks_uniform(&self, wheel: usize) -> Option<bool> {
        let chi = self.chi_square(wheel)?;
        let df = self.degrees_of_freedom(wheel)?;
        let critical = CHI_SQUARE_CRITICAL_001.get(df - 1)?;
        Some(chi < *critical)
    }
}
