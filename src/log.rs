//! Engine logging
//!
//! Records ability and effect notifications for display and post-run
//! analysis. The headless runner saves the log as JSON at the end of a
//! scenario.

use bevy::prelude::*;
use serde::Serialize;

/// A single entry in the engine log
#[derive(Debug, Clone, Serialize)]
pub struct EngineLogEntry {
    /// Timestamp in simulation time (seconds since the run started)
    pub timestamp: f32,
    /// The type of event
    pub event_type: EngineLogEventType,
    /// Human-readable description of the event
    pub message: String,
}

/// Types of engine log events for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineLogEventType {
    /// An ability finished initialization
    AbilityInitialized,
    /// An ability activation fired
    AbilityStarted,
    /// A cast/charge/channel phase ended
    AbilityStopped,
    /// An activation was rejected (cooldown, cost, not initialized)
    AbilityRejected,
    /// An effect was applied to a target
    EffectApplied,
    /// An effect was discarded or removed after an error
    EffectRejected,
    /// A periodic effect re-applied its modifiers
    EffectTick,
    /// An effect's duration ran out
    EffectExpired,
    /// Scenario-level event (run started, run finished)
    ScenarioEvent,
}

/// The engine log resource storing all events
#[derive(Resource, Default)]
pub struct EngineLog {
    /// All log entries in chronological order
    pub entries: Vec<EngineLogEntry>,
    /// Current simulation time
    pub sim_time: f32,
}

impl EngineLog {
    /// Clear the log for a new run
    pub fn clear(&mut self) {
        self.entries.clear();
        self.sim_time = 0.0;
    }

    /// Add a new entry to the log
    pub fn log(&mut self, event_type: EngineLogEventType, message: String) {
        self.entries.push(EngineLogEntry {
            timestamp: self.sim_time,
            event_type,
            message,
        });
    }

    /// Get entries filtered by event type
    pub fn filter_by_type(&self, event_type: EngineLogEventType) -> Vec<&EngineLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Get the last N entries
    pub fn recent(&self, count: usize) -> Vec<&EngineLogEntry> {
        self.entries.iter().rev().take(count).rev().collect()
    }

    /// Save the log to a JSON file. Returns the path written.
    pub fn save_to_file(&self, path: &str) -> Result<String, String> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| format!("Failed to serialize engine log: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path, e))?;
        Ok(path.to_string())
    }
}

/// Advance the log's simulation clock. Runs first in the engine's Update
/// chain so entries logged this frame carry the current timestamp.
pub fn advance_log_time(time: Res<Time>, mut log: ResMut<EngineLog>) {
    log.sim_time += time.delta_secs();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_by_type_returns_matching_entries() {
        let mut log = EngineLog::default();
        log.log(EngineLogEventType::AbilityStarted, "a".to_string());
        log.log(EngineLogEventType::EffectApplied, "b".to_string());
        log.log(EngineLogEventType::AbilityStarted, "c".to_string());

        let started = log.filter_by_type(EngineLogEventType::AbilityStarted);
        assert_eq!(started.len(), 2);
        assert_eq!(started[1].message, "c");
    }

    #[test]
    fn recent_returns_entries_in_order() {
        let mut log = EngineLog::default();
        for i in 0..5 {
            log.log(EngineLogEventType::ScenarioEvent, format!("{}", i));
        }
        let recent: Vec<_> = log.recent(2).iter().map(|e| e.message.clone()).collect();
        assert_eq!(recent, vec!["3".to_string(), "4".to_string()]);
    }
}
