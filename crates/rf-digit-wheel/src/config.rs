//! Digit machine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WheelError, WheelResult};
use crate::timing::{TimingConfig, TimingProfile, MAX_DELAY_MS};

/// Maximum wheel count (an 18-digit decimal always fits in u64)
pub const MAX_WHEELS: usize = 18;

/// Values a wheel shows while spinning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRange {
    /// Cosmetic values drawn from the wheel's own `[min, max]`
    #[default]
    Committed,
    /// Cosmetic values drawn from the full 0–9 range
    FullDecimal,
}

/// One wheel: outcome range plus cosmetic behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSpec {
    /// Lowest committable digit
    pub min: u8,
    /// Highest committable digit
    pub max: u8,
    /// Cosmetic display set
    #[serde(default)]
    pub display: DisplayRange,
    /// Cosmetic tick period (ms)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 {
    100
}

impl WheelSpec {
    /// Plain decimal wheel `[0, 9]`
    pub fn decimal(tick_ms: u64) -> Self {
        Self {
            min: 0,
            max: 9,
            display: DisplayRange::Committed,
            tick_ms,
        }
    }

    /// Wheel with a custom range
    pub fn range(min: u8, max: u8) -> Self {
        Self {
            min,
            max,
            display: DisplayRange::Committed,
            tick_ms: default_tick_ms(),
        }
    }

    /// Builder: show the full decimal range while spinning
    pub fn full_display(mut self) -> Self {
        self.display = DisplayRange::FullDecimal;
        self
    }

    /// Builder: set tick period
    pub fn tick(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    /// Does the outcome range contain this digit?
    pub fn contains(&self, digit: u8) -> bool {
        (self.min..=self.max).contains(&digit)
    }

    /// Number of distinct outcomes
    pub fn outcome_count(&self) -> usize {
        (self.max.saturating_sub(self.min)) as usize + 1
    }

    /// Inclusive bounds of the cosmetic display set
    pub fn display_bounds(&self) -> (u8, u8) {
        match self.display {
            DisplayRange::Committed => (self.min, self.max),
            DisplayRange::FullDecimal => (0, 9),
        }
    }
}

/// Full machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Name for reference
    pub name: String,
    /// Wheels, most significant digit first
    pub wheels: Vec<WheelSpec>,
    /// Cascade timing
    #[serde(default)]
    pub timing: TimingConfig,
}

impl MachineConfig {
    /// Four wheels `[1,2] [0,9] [0,9] [0,9]`, final number in 1000..=2999
    pub fn four_digit() -> Self {
        Self {
            name: "four_digit".into(),
            wheels: vec![
                WheelSpec::range(1, 2).full_display().tick(50),
                WheelSpec::decimal(80),
                WheelSpec::decimal(100),
                WheelSpec::decimal(120),
            ],
            timing: TimingConfig::normal(),
        }
    }

    /// `count` plain decimal wheels
    pub fn decimal(count: usize) -> Self {
        Self {
            name: format!("decimal_{}", count),
            wheels: (0..count).map(|_| WheelSpec::decimal(100)).collect(),
            timing: TimingConfig::normal(),
        }
    }

    /// Builder: replace timing
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Builder: switch timing profile
    pub fn with_profile(self, profile: TimingProfile) -> Self {
        self.with_timing(TimingConfig::from_profile(profile))
    }

    /// Number of wheels
    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    /// Validate ranges, wheel count, and timing
    pub fn validate(&self) -> WheelResult<()> {
        if self.wheels.is_empty() {
            return Err(WheelError::NoWheels);
        }
        if self.wheels.len() > MAX_WHEELS {
            return Err(WheelError::TooManyWheels(self.wheels.len()));
        }
        for (index, wheel) in self.wheels.iter().enumerate() {
            if wheel.min > wheel.max || wheel.max > 9 {
                return Err(WheelError::InvalidRange {
                    index,
                    min: wheel.min,
                    max: wheel.max,
                });
            }
            if wheel.tick_ms == 0 || wheel.tick_ms > MAX_DELAY_MS {
                return Err(WheelError::InvalidTick(index));
            }
        }
        self.timing.validate()?;
        if !self.timing.is_escalating() {
            log::warn!(
                "[Config] '{}': reveal gaps {:?} do not escalate",
                self.name,
                self.timing.reveal_gaps_ms
            );
        }
        Ok(())
    }

    /// Inclusive numeric bounds of the final number
    pub fn final_number_range(&self) -> (u64, u64) {
        let low = digits_to_number(self.wheels.iter().map(|w| w.min));
        let high = digits_to_number(self.wheels.iter().map(|w| w.max));
        (low, high)
    }

    /// Split a number into one digit per wheel, if it fits every range
    pub fn split_number(&self, number: u64) -> Option<Vec<u8>> {
        let mut digits = Vec::with_capacity(self.wheels.len());
        let mut rest = number;
        for _ in 0..self.wheels.len() {
            digits.push((rest % 10) as u8);
            rest /= 10;
        }
        if rest != 0 {
            return None;
        }
        digits.reverse();
        let fits = digits
            .iter()
            .zip(&self.wheels)
            .all(|(&d, wheel)| wheel.contains(d));
        fits.then_some(digits)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Parse from JSON
    pub fn from_json(json: &str) -> WheelResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> WheelResult<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> WheelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            other => Err(WheelError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> WheelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Export as YAML
    pub fn to_yaml(&self) -> WheelResult<String> {
        Ok(serde_yml::to_string(self)?)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::four_digit()
    }
}

/// Decimal concatenation of digits, most significant first
pub fn digits_to_number(digits: impl IntoIterator<Item = u8>) -> u64 {
    digits
        .into_iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d))
}
