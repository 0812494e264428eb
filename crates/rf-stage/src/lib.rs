//! # rf-stage — Spin Session Stage System
//!
//! Defines the canonical stages a digit wheel spin session passes through.
//! Renderers and audio cues react to STAGES, never to engine internals.
//!
//! ## Session flow
//!
//! ```text
//! SpinStart → WheelSpinning × N → (RevealScheduled → WheelReveal) × N → SpinComplete
//!                                         │
//!                                         └── WatchdogFired → WheelForced × k → SpinComplete
//! ```
//!
//! Every stage event carries the session generation it belongs to, so
//! consumers can discard events from a superseded session.

pub mod event;
pub mod stage;
pub mod trace;

pub use event::*;
pub use stage::*;
pub use trace::*;

/// Errors raised when decoding stage data
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Unknown stage type: {0}")]
    UnknownStage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
