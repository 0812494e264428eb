//! StageTrace — The complete stage sequence of one spin session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StageError;
use crate::event::StageEvent;
use crate::stage::{Stage, StageCategory};

/// A recorded trace of stage events for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Session generation
    pub generation: u64,

    /// Machine name (e.g., "four_digit")
    pub machine: String,

    /// All events in chronological order
    pub events: Vec<StageEvent>,

    /// When this trace was recorded
    pub recorded_at: DateTime<Utc>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(generation: u64, machine: impl Into<String>) -> Self {
        Self {
            generation,
            machine: machine.into(),
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Collect the events of one generation, keeping their order
    pub fn collect<'a>(
        generation: u64,
        machine: impl Into<String>,
        events: impl IntoIterator<Item = &'a StageEvent>,
    ) -> Self {
        let mut trace = Self::new(generation, machine);
        trace.events = events
            .into_iter()
            .filter(|e| e.is_from(generation))
            .cloned()
            .collect();
        trace
    }

    /// Add an event to the trace. Events of another generation are dropped.
    pub fn push(&mut self, event: StageEvent) -> bool {
        if !event.is_from(self.generation) {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        let first = self.events.first().map(|e| e.timestamp_ms).unwrap_or(0);
        let last = self.events.last().map(|e| e.timestamp_ms).unwrap_or(0);
        last.saturating_sub(first)
    }

    /// Get events by category
    pub fn events_by_category(&self, category: StageCategory) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.category() == category)
            .collect()
    }

    /// Get events by stage type name
    pub fn events_by_type(&self, type_name: &str) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .collect()
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.stage.type_name() == type_name)
    }

    /// Timestamps of natural reveals as (wheel, timestamp) in event order
    pub fn reveal_times(&self) -> Vec<(u8, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e.stage {
                Stage::WheelReveal { wheel_index, .. } => Some((wheel_index, e.timestamp_ms)),
                _ => None,
            })
            .collect()
    }

    /// Gaps between consecutive natural reveals (ms)
    pub fn reveal_gaps(&self) -> Vec<u64> {
        self.reveal_times()
            .windows(2)
            .map(|w| w[1].1.saturating_sub(w[0].1))
            .collect()
    }

    /// Final number, if the session completed
    pub fn final_number(&self) -> Option<u64> {
        self.events.iter().find_map(|e| match e.stage {
            Stage::SpinComplete { final_number, .. } => Some(final_number),
            _ => None,
        })
    }

    /// Whether the watchdog had to finish this session
    pub fn was_forced(&self) -> bool {
        self.has_stage("watchdog_fired")
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, StageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import from JSON
    pub fn from_json(json: &str) -> Result<Self, StageError> {
        Ok(serde_json::from_str(json)?)
    }
}
