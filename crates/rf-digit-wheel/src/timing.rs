//! Timing profiles for the reveal cascade

use serde::{Deserialize, Serialize};

use crate::error::{WheelError, WheelResult};

/// Longest delay a timing value may hold; deadlines stay far from `u64::MAX`
pub const MAX_DELAY_MS: u64 = u64::MAX / 4;

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Stage show timing (escalating suspense)
    #[default]
    Normal,
    /// Fast mode, everything at a quarter of normal
    Turbo,
    /// Studio mode (instant cascade, watchdog still armed)
    Studio,
    /// Hand-tuned or scaled timing
    Custom,
}

impl TimingProfile {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Turbo => "Turbo",
            Self::Studio => "Studio",
            Self::Custom => "Custom",
        }
    }

    /// Parse a profile name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "turbo" => Some(Self::Turbo),
            "studio" => Some(Self::Studio),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Cascade timing configuration. All values in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Profile type
    #[serde(default)]
    pub profile: TimingProfile,

    /// Delay from spin start to the first wheel's reveal
    pub initial_reveal_delay_ms: u64,

    /// Gap after reveal `i` before reveal `i + 1`.
    /// The last entry repeats when a machine has more transitions.
    pub reveal_gaps_ms: Vec<u64>,

    /// Hard upper bound on session length, measured from spin start
    pub watchdog_ms: u64,

    /// Fade-out duration of the spin loop cue
    #[serde(default = "default_fade_ms")]
    pub audio_fade_ms: u64,
}

fn default_fade_ms() -> u64 {
    2000
}

impl TimingConfig {
    /// Normal stage timing: 2 s before the first reveal, then 1.0 / 2.5 / 4.0 s
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            initial_reveal_delay_ms: 2000,
            reveal_gaps_ms: vec![1000, 2500, 4000],
            watchdog_ms: 25_000,
            audio_fade_ms: 2000,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            ..Self::normal().scaled(0.25)
        }
    }

    /// Studio mode: every reveal fires immediately, in order
    pub fn studio() -> Self {
        Self {
            profile: TimingProfile::Studio,
            initial_reveal_delay_ms: 0,
            reveal_gaps_ms: vec![0],
            watchdog_ms: 25_000,
            audio_fade_ms: 0,
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Studio => Self::studio(),
            TimingProfile::Custom => Self {
                profile: TimingProfile::Custom,
                ..Self::normal()
            },
        }
    }

    /// Scale every delay by factor (< 1.0 = faster)
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        Self {
            profile: TimingProfile::Custom,
            initial_reveal_delay_ms: scale(self.initial_reveal_delay_ms),
            reveal_gaps_ms: self.reveal_gaps_ms.iter().map(|&g| scale(g)).collect(),
            watchdog_ms: scale(self.watchdog_ms).max(1),
            audio_fade_ms: scale(self.audio_fade_ms),
        }
    }

    /// Gap between reveal of `wheel_index` and the reveal of the next wheel
    pub fn gap_after(&self, wheel_index: usize) -> u64 {
        self.reveal_gaps_ms
            .get(wheel_index)
            .or(self.reveal_gaps_ms.last())
            .copied()
            .unwrap_or(0)
    }

    /// True when every gap is strictly longer than the one before
    pub fn is_escalating(&self) -> bool {
        self.reveal_gaps_ms.windows(2).all(|w| w[1] > w[0])
    }

    /// Natural completion time of a cascade over `wheel_count` wheels
    pub fn worst_case_cascade_ms(&self, wheel_count: usize) -> u64 {
        if wheel_count == 0 {
            return 0;
        }
        (0..wheel_count - 1).fold(self.initial_reveal_delay_ms, |acc, i| {
            acc.saturating_add(self.gap_after(i))
        })
    }

    /// Check that the watchdog is armed and every delay fits the clock
    pub fn validate(&self) -> WheelResult<()> {
        if self.watchdog_ms == 0 {
            return Err(WheelError::InvalidTiming(
                "watchdog_ms must be greater than zero".into(),
            ));
        }
        let delays = [
            ("watchdog_ms", self.watchdog_ms),
            ("initial_reveal_delay_ms", self.initial_reveal_delay_ms),
            ("audio_fade_ms", self.audio_fade_ms),
        ];
        let gaps = self.reveal_gaps_ms.iter().map(|&g| ("reveal_gaps_ms", g));
        for (name, value) in delays.into_iter().chain(gaps) {
            if value > MAX_DELAY_MS {
                return Err(WheelError::InvalidTiming(format!(
                    "{} = {} exceeds {} ms",
                    name, value, MAX_DELAY_MS
                )));
            }
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}
