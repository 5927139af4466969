//! JSON configuration parsing for headless mode
//!
//! Parses JSON scenario configurations: the actors to spawn, the abilities
//! they equip, and a timed input script driving them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One entity in the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Unique actor name, referenced by the script and by targets
    pub name: String,
    /// The actor's attribute store: name -> starting value
    pub attributes: HashMap<String, f32>,
    /// Ability keys (from the ability book) equipped by this actor
    #[serde(default)]
    pub abilities: Vec<String>,
    /// Actor the equipped abilities aim at (default: the actor itself)
    #[serde(default)]
    pub target: Option<String>,
}

/// Press or release an ability's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAction {
    Press,
    Release,
}

/// One timed input in the scenario script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAction {
    /// Simulation time in seconds at which the input fires
    pub at: f32,
    /// Actor whose ability receives the input
    pub actor: String,
    /// Ability key, one of the actor's equipped abilities
    pub ability: String,
    pub action: InputAction,
}

/// Scenario configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Actors to spawn at scenario start
    pub actors: Vec<ActorConfig>,
    /// Timed inputs, fired when simulation time passes their `at`
    #[serde(default)]
    pub script: Vec<ScriptAction>,
    /// Total scenario duration in seconds (default: 30)
    #[serde(default = "default_duration")]
    pub duration_secs: f32,
    /// Custom output path for the engine log (optional)
    #[serde(default)]
    pub output_path: Option<String>,
    /// Path to the ability book RON file
    #[serde(default = "default_ability_book")]
    pub ability_book: String,
}

fn default_duration() -> f32 {
    30.0
}

fn default_ability_book() -> String {
    "assets/config/abilities.ron".to_string()
}

impl ScenarioConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: ScenarioConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.actors.is_empty() {
            return Err("scenario must define at least one actor".to_string());
        }

        let mut names = HashSet::new();
        for actor in &self.actors {
            if !names.insert(actor.name.as_str()) {
                return Err(format!("duplicate actor name: '{}'", actor.name));
            }
        }

        for actor in &self.actors {
            if let Some(target) = &actor.target {
                if !names.contains(target.as_str()) {
                    return Err(format!(
                        "actor '{}' targets unknown actor '{}'",
                        actor.name, target
                    ));
                }
            }
        }

        for action in &self.script {
            if action.at < 0.0 {
                return Err(format!(
                    "script action for '{}' has a negative time",
                    action.actor
                ));
            }
            let Some(actor) = self.actors.iter().find(|a| a.name == action.actor) else {
                return Err(format!("script references unknown actor '{}'", action.actor));
            };
            if !actor.abilities.contains(&action.ability) {
                return Err(format!(
                    "script action uses ability '{}' which actor '{}' does not equip",
                    action.ability, action.actor
                ));
            }
        }

        if self.duration_secs <= 0.0 {
            return Err("duration_secs must be positive".to_string());
        }

        Ok(())
    }
}
