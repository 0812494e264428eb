//! AudioSync — spin loop cue bound to the session lifecycle
//!
//! The cue is a side effect only. Every call returns a `Result` so a
//! missing or broken audio backend can be logged, but the coordinator never
//! lets an audio failure change orchestration.

use crate::error::AudioError;

/// Number of volume steps in a fade-out
pub const FADE_STEPS: u32 = 50;

/// Default cue volume (0.0 - 1.0)
pub const BASE_VOLUME: f32 = 0.3;

/// Lifecycle-bound audio collaborator
pub trait AudioSync: Send {
    /// Start (or restart) the looping spin cue
    fn play_loop(&mut self, at_ms: u64) -> Result<(), AudioError>;

    /// Begin a graceful fade-out of the cue
    fn fade_out(&mut self, at_ms: u64) -> Result<(), AudioError>;

    /// Advance time-based effects such as the fade envelope
    fn update(&mut self, _now_ms: u64) -> Result<(), AudioError> {
        Ok(())
    }

    /// Is the cue audible right now?
    fn is_playing(&self) -> bool;
}

/// Audio disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAudio;

impl AudioSync for NoopAudio {
    fn play_loop(&mut self, _at_ms: u64) -> Result<(), AudioError> {
        Ok(())
    }

    fn fade_out(&mut self, _at_ms: u64) -> Result<(), AudioError> {
        Ok(())
    }

    fn is_playing(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CueState {
    Silent,
    Playing,
    Fading { started_at_ms: u64, from_volume: f32 },
}

/// Volume-envelope model of a looping cue with stepped fade-out
#[derive(Debug, Clone)]
pub struct FadeCue {
    state: CueState,
    volume: f32,
    base_volume: f32,
    fade_ms: u64,
    available: bool,
    plays: u32,
    restarts: u32,
}

impl FadeCue {
    pub fn new(fade_ms: u64) -> Self {
        Self {
            state: CueState::Silent,
            volume: BASE_VOLUME,
            base_volume: BASE_VOLUME,
            fade_ms,
            available: true,
            plays: 0,
            restarts: 0,
        }
    }

    /// A cue whose backend failed to load
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0)
        }
    }

    /// Builder: base volume (clamped to 0.0 - 1.0)
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.base_volume = volume.clamp(0.0, 1.0);
        self.volume = self.base_volume;
        self
    }

    /// Effective output level (0.0 while silent)
    pub fn level(&self) -> f32 {
        match self.state {
            CueState::Silent => 0.0,
            _ => self.volume,
        }
    }

    pub fn is_fading(&self) -> bool {
        matches!(self.state, CueState::Fading { .. })
    }

    /// Times the cue was started
    pub fn plays(&self) -> u32 {
        self.plays
    }

    /// Times a start interrupted a playing or fading cue
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Stop at once, without fade
    pub fn stop_immediately(&mut self) {
        self.state = CueState::Silent;
        self.volume = self.base_volume;
    }
}

impl AudioSync for FadeCue {
    fn play_loop(&mut self, _at_ms: u64) -> Result<(), AudioError> {
        if !self.available {
            return Err(AudioError::Unavailable);
        }
        if self.state != CueState::Silent {
            log::debug!("[Audio] restarting spin loop");
            self.stop_immediately();
            self.restarts += 1;
        }
        self.state = CueState::Playing;
        self.volume = self.base_volume;
        self.plays += 1;
        Ok(())
    }

    fn fade_out(&mut self, at_ms: u64) -> Result<(), AudioError> {
        if !self.available {
            return Err(AudioError::Unavailable);
        }
        if self.state == CueState::Playing {
            self.state = CueState::Fading {
                started_at_ms: at_ms,
                from_volume: self.volume,
            };
            self.update(at_ms)?;
        }
        Ok(())
    }

    fn update(&mut self, now_ms: u64) -> Result<(), AudioError> {
        let CueState::Fading {
            started_at_ms,
            from_volume,
        } = self.state
        else {
            return Ok(());
        };

        let elapsed = now_ms.saturating_sub(started_at_ms);
        let step = if self.fade_ms == 0 {
            FADE_STEPS
        } else {
            ((elapsed * u64::from(FADE_STEPS)) / self.fade_ms).min(u64::from(FADE_STEPS)) as u32
        };

        if step >= FADE_STEPS {
            self.stop_immediately();
            log::debug!("[Audio] spin loop faded out");
        } else {
            let per_step = from_volume / FADE_STEPS as f32;
            self.volume = (from_volume - per_step * step as f32).max(0.0);
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state != CueState::Silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fade_envelope() {
        let mut cue = FadeCue::new(2000);
        cue.play_loop(0).unwrap();
        assert_relative_eq!(cue.level(), BASE_VOLUME);

        cue.fade_out(1000).unwrap();
        assert!(cue.is_fading());

        // Halfway through the fade: 25 of 50 steps taken
        cue.update(2000).unwrap();
        assert_relative_eq!(cue.level(), BASE_VOLUME / 2.0, epsilon = 1e-6);

        cue.update(3000).unwrap();
        assert!(!cue.is_playing());
        assert_relative_eq!(cue.level(), 0.0);
    }

    #[test]
    fn test_restart_while_fading() {
        let mut cue = FadeCue::new(2000);
        cue.play_loop(0).unwrap();
        cue.fade_out(100).unwrap();
        cue.update(600).unwrap();
        assert!(cue.level() < BASE_VOLUME);

        cue.play_loop(700).unwrap();
        assert!(!cue.is_fading());
        assert_relative_eq!(cue.level(), BASE_VOLUME);
        assert_eq!(cue.plays(), 2);
        assert_eq!(cue.restarts(), 1);
    }

    #[test]
    fn test_zero_fade_stops_at_once() {
        let mut cue = FadeCue::new(0);
        cue.play_loop(0).unwrap();
        cue.fade_out(10).unwrap();
        assert!(!cue.is_playing());
    }

    #[test]
    fn test_fade_when_silent_is_noop() {
        let mut cue = FadeCue::new(2000);
        cue.fade_out(0).unwrap();
        assert!(!cue.is_playing());
    }

    #[test]
    fn test_unavailable_cue_reports_errors() {
        let mut cue = FadeCue::unavailable();
        assert_eq!(cue.play_loop(0), Err(AudioError::Unavailable));
        assert_eq!(cue.fade_out(0), Err(AudioError::Unavailable));
        assert!(!cue.is_playing());
    }
}
