//! Stage — The semantic moments of a spin session
//!
//! A Stage is NOT an animation frame and NOT a timer callback.
//! A Stage is the MEANING of a moment in the session flow.

use serde::{Deserialize, Serialize};

use crate::StageError;

/// Canonical spin session stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Spin accepted, new generation started
    SpinStart,

    /// Wheel started its cosmetic spin (outcome already committed)
    WheelSpinning {
        /// Which wheel (0-indexed)
        wheel_index: u8,
    },

    /// Session finalized with its one and only final number
    SpinComplete {
        /// Decimal concatenation of all revealed digits
        final_number: u64,
        /// True when the watchdog supplied at least one digit
        #[serde(default)]
        forced: bool,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // REVEAL CASCADE
    // ═══════════════════════════════════════════════════════════════════════
    /// Reveal of a wheel was scheduled
    RevealScheduled {
        /// Which wheel will reveal
        wheel_index: u8,
        /// Delay from the scheduling moment (ms)
        delay_ms: u64,
    },

    /// Wheel stopped and revealed its committed digit
    WheelReveal {
        /// Which wheel (0-indexed)
        wheel_index: u8,
        /// Revealed digit
        digit: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // WATCHDOG
    // ═══════════════════════════════════════════════════════════════════════
    /// Watchdog deadline reached before the cascade finished
    WatchdogFired {
        /// Wheels that had not revealed yet
        #[serde(default)]
        missing: Vec<u8>,
    },

    /// Watchdog synthesized a digit for an unrevealed wheel
    WheelForced {
        /// Which wheel (0-indexed)
        wheel_index: u8,
        /// Synthesized digit
        digit: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // LOOKUP
    // ═══════════════════════════════════════════════════════════════════════
    /// External lookup for the final number finished
    ResultResolved {
        /// Number that was looked up
        final_number: u64,
        /// Whether a record matched
        matched: bool,
    },
}

impl Stage {
    /// Get the stage category for grouping
    pub fn category(&self) -> StageCategory {
        match self {
            Stage::SpinStart | Stage::WheelSpinning { .. } | Stage::SpinComplete { .. } => {
                StageCategory::SpinLifecycle
            }
            Stage::RevealScheduled { .. } | Stage::WheelReveal { .. } => StageCategory::Reveal,
            Stage::WatchdogFired { .. } | Stage::WheelForced { .. } => StageCategory::Watchdog,
            Stage::ResultResolved { .. } => StageCategory::Lookup,
        }
    }

    /// Get a simple string name for this stage type
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::SpinStart => "spin_start",
            Stage::WheelSpinning { .. } => "wheel_spinning",
            Stage::SpinComplete { .. } => "spin_complete",
            Stage::RevealScheduled { .. } => "reveal_scheduled",
            Stage::WheelReveal { .. } => "wheel_reveal",
            Stage::WatchdogFired { .. } => "watchdog_fired",
            Stage::WheelForced { .. } => "wheel_forced",
            Stage::ResultResolved { .. } => "result_resolved",
        }
    }

    /// All known stage type names
    pub fn all_type_names() -> &'static [&'static str] {
        &[
            "spin_start",
            "wheel_spinning",
            "spin_complete",
            "reveal_scheduled",
            "wheel_reveal",
            "watchdog_fired",
            "wheel_forced",
            "result_resolved",
        ]
    }

    /// Check a type name against the known set
    pub fn is_valid_type_name(name: &str) -> bool {
        Self::all_type_names().contains(&name)
    }

    /// Build a payload-free stage from its type name.
    ///
    /// Payload fields are zeroed; used by consumers that route on type only.
    pub fn from_type_name(name: &str) -> Result<Self, StageError> {
        let stage = match name {
            "spin_start" => Stage::SpinStart,
            "wheel_spinning" => Stage::WheelSpinning { wheel_index: 0 },
            "spin_complete" => Stage::SpinComplete {
                final_number: 0,
                forced: false,
            },
            "reveal_scheduled" => Stage::RevealScheduled {
                wheel_index: 0,
                delay_ms: 0,
            },
            "wheel_reveal" => Stage::WheelReveal {
                wheel_index: 0,
                digit: 0,
            },
            "watchdog_fired" => Stage::WatchdogFired { missing: Vec::new() },
            "wheel_forced" => Stage::WheelForced {
                wheel_index: 0,
                digit: 0,
            },
            "result_resolved" => Stage::ResultResolved {
                final_number: 0,
                matched: false,
            },
            other => return Err(StageError::UnknownStage(other.to_string())),
        };
        Ok(stage)
    }

    /// Wheel this stage refers to, if any
    pub fn wheel_index(&self) -> Option<u8> {
        match self {
            Stage::WheelSpinning { wheel_index }
            | Stage::RevealScheduled { wheel_index, .. }
            | Stage::WheelReveal { wheel_index, .. }
            | Stage::WheelForced { wheel_index, .. } => Some(*wheel_index),
            _ => None,
        }
    }

    /// Digit settled on a wheel (natural reveal or watchdog synthesis)
    pub fn settled_digit(&self) -> Option<(u8, u8)> {
        match self {
            Stage::WheelReveal { wheel_index, digit } | Stage::WheelForced { wheel_index, digit } => {
                Some((*wheel_index, *digit))
            }
            _ => None,
        }
    }

    /// Check if this stage ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::SpinComplete { .. })
    }

    /// Check if the spin loop cue should be playing during this stage
    pub fn is_looping(&self) -> bool {
        matches!(
            self,
            Stage::SpinStart
                | Stage::WheelSpinning { .. }
                | Stage::RevealScheduled { .. }
                | Stage::WheelReveal { .. }
        )
    }
}

/// Stage category for grouping and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    SpinLifecycle,
    Reveal,
    Watchdog,
    Lookup,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SpinLifecycle => "Spin Lifecycle",
            Self::Reveal => "Reveal Cascade",
            Self::Watchdog => "Watchdog",
            Self::Lookup => "Lookup",
        }
    }
}
