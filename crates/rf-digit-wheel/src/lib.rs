//! # rf-digit-wheel — Digit Wheel Spin Orchestration
//!
//! Spins N independent digit wheels, reveals them left to right on an
//! escalating cascade, and produces one final number per session, even
//! when a reveal never arrives.
//!
//! ## Features
//!
//! - **Commit-then-reveal**: each wheel draws its outcome once at start; the
//!   cosmetic tick never touches it
//! - **Reveal cascade**: every reveal is scheduled from the previous one
//! - **Watchdog**: forces missing wheels so a session always completes
//! - **Generation guard**: callbacks from a superseded session are discarded
//! - **Timing Profiles**: Normal, Turbo, Studio (instant) timing modes
//! - **Stage Generation**: `rf-stage` events for renderers and audio
//!
//! ## Architecture
//!
//! ```text
//! SpinDriver (tokio, real time)
//!     │
//!     └── SpinCoordinator (logical ms clock)
//!           ├── WheelEngine × N
//!           ├── TimerQueue<TimerEvent>
//!           ├── AudioSync (optional)
//!           └── OutcomeOverride (optional)
//!                 │
//!                 v
//!           CompletedSession → ResultResolver → Resolution
//! ```

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod outcome;
pub mod resolver;
pub mod stats;
pub mod timers;
pub mod timing;
pub mod wheel;

pub use audio::*;
pub use config::*;
pub use coordinator::*;
pub use driver::*;
pub use error::*;
pub use outcome::*;
pub use resolver::*;
pub use stats::*;
pub use timers::*;
pub use timing::*;
pub use wheel::*;
