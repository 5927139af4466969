//! Headless scenario execution
//!
//! Runs ability scenarios without any graphical output, suitable for automated testing.

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::attributes::AttributeSet;
use crate::config::{load_ability_book, spawn_ability, AbilityBook};
use crate::effects::ActiveEffects;
use crate::events::{AbilityInputPressed, AbilityInputReleased};
use crate::log::{EngineLog, EngineLogEventType};
use crate::{AbilityEnginePlugin, AbilityEngineSet};

use super::config::{InputAction, ScenarioConfig};

/// Marker for entities spawned from the scenario's actor list.
#[derive(Component, Debug)]
pub struct ScenarioActor {
    pub name: String,
}

/// The scenario being executed.
#[derive(Resource, Clone)]
pub struct ActiveScenario(pub ScenarioConfig);

/// Resource tracking scenario progress
#[derive(Resource)]
pub struct ScenarioState {
    /// Total scenario duration in seconds
    pub duration: f32,
    /// Elapsed simulation time
    pub elapsed: f32,
    /// Custom output path for the engine log
    pub output_path: Option<String>,
    /// Whether the scenario has completed
    pub complete: bool,
    /// Index of the next unfired script action (the script is kept sorted by
    /// time)
    cursor: usize,
}

/// Lookup from (actor name, ability key) to the equipped ability entity.
#[derive(Resource, Default)]
struct ScenarioIndex {
    abilities: HashMap<(String, String), Entity>,
}

/// Plugin for headless scenario execution
pub struct ScenarioPlugin {
    pub config: ScenarioConfig,
    pub book: AbilityBook,
}

impl Plugin for ScenarioPlugin {
    fn build(&self, app: &mut App) {
        let mut config = self.config.clone();
        config.script.sort_by(|a, b| a.at.total_cmp(&b.at));

        app.add_plugins(AbilityEnginePlugin)
            .insert_resource(self.book.clone())
            .insert_resource(ScenarioState {
                duration: config.duration_secs,
                elapsed: 0.0,
                output_path: config.output_path.clone(),
                complete: false,
                cursor: 0,
            })
            .insert_resource(ActiveScenario(config))
            .init_resource::<ScenarioIndex>()
            .add_systems(Startup, scenario_setup)
            .add_systems(
                Update,
                (scenario_track_time, scenario_drive_script)
                    .chain()
                    .before(AbilityEngineSet),
            )
            .add_systems(Update, scenario_check_end.after(AbilityEngineSet))
            .add_systems(PostUpdate, scenario_exit_on_complete);
    }
}

/// Spawn every actor with its attribute store and equipped abilities.
fn scenario_setup(
    mut commands: Commands,
    scenario: Res<ActiveScenario>,
    book: Res<AbilityBook>,
    mut index: ResMut<ScenarioIndex>,
    mut log: ResMut<EngineLog>,
) {
    log.clear();
    log.log(
        EngineLogEventType::ScenarioEvent,
        "Scenario started (headless mode)".to_string(),
    );

    let mut actors: HashMap<String, Entity> = HashMap::new();
    for actor in &scenario.0.actors {
        let entity = commands
            .spawn((
                ScenarioActor {
                    name: actor.name.clone(),
                },
                AttributeSet::from_pairs(actor.attributes.iter().map(|(k, v)| (k.clone(), *v))),
                ActiveEffects::default(),
            ))
            .id();
        actors.insert(actor.name.clone(), entity);
    }

    for actor in &scenario.0.actors {
        let Some(&owner) = actors.get(&actor.name) else {
            continue;
        };
        let target = actor.target.as_ref().and_then(|t| actors.get(t)).copied();
        for key in &actor.abilities {
            match spawn_ability(&mut commands, &book, key, owner, owner, target) {
                Ok(entity) => {
                    index
                        .abilities
                        .insert((actor.name.clone(), key.clone()), entity);
                }
                Err(err) => {
                    warn!("skipping ability '{}' for '{}': {}", key, actor.name, err);
                }
            }
        }
    }

    info!(
        "Scenario setup complete: {} actors spawned",
        scenario.0.actors.len()
    );
}

/// Track elapsed simulation time.
fn scenario_track_time(time: Res<Time>, mut state: ResMut<ScenarioState>) {
    if !state.complete {
        state.elapsed += time.delta_secs();
    }
}

/// Fire every script action whose time has passed.
fn scenario_drive_script(
    mut state: ResMut<ScenarioState>,
    scenario: Res<ActiveScenario>,
    index: Res<ScenarioIndex>,
    mut pressed: EventWriter<AbilityInputPressed>,
    mut released: EventWriter<AbilityInputReleased>,
    mut log: ResMut<EngineLog>,
) {
    while state.cursor < scenario.0.script.len() {
        let action = &scenario.0.script[state.cursor];
        if action.at > state.elapsed {
            break;
        }
        state.cursor += 1;

        let key = (action.actor.clone(), action.ability.clone());
        let Some(&ability) = index.abilities.get(&key) else {
            warn!(
                "script action for unequipped ability '{}' on '{}'",
                action.ability, action.actor
            );
            continue;
        };

        match action.action {
            InputAction::Press => {
                pressed.send(AbilityInputPressed { ability });
            }
            InputAction::Release => {
                released.send(AbilityInputReleased { ability });
            }
        }
        log.log(
            EngineLogEventType::ScenarioEvent,
            format!(
                "Script: {:?} '{}' on '{}'",
                action.action, action.ability, action.actor
            ),
        );
    }
}

/// End the scenario once its duration has elapsed: log each actor's final
/// attributes and save the engine log.
fn scenario_check_end(
    actors: Query<(&ScenarioActor, &AttributeSet)>,
    mut state: ResMut<ScenarioState>,
    mut log: ResMut<EngineLog>,
) {
    if state.complete || state.elapsed < state.duration {
        return;
    }

    for (actor, attrs) in actors.iter() {
        let mut stats: Vec<String> = attrs
            .iter()
            .map(|(name, value)| format!("{} {:.1}", name, value))
            .collect();
        stats.sort();
        log.log(
            EngineLogEventType::ScenarioEvent,
            format!("Final state of '{}': {}", actor.name, stats.join(", ")),
        );
    }
    log.log(
        EngineLogEventType::ScenarioEvent,
        format!("Scenario finished after {:.1}s", state.elapsed),
    );

    let path = state
        .output_path
        .clone()
        .unwrap_or_else(|| "scenario_log.json".to_string());
    match log.save_to_file(&path) {
        Ok(filename) => {
            println!("Scenario complete. Log saved to: {}", filename);
        }
        Err(e) => {
            eprintln!("Failed to save engine log: {}", e);
        }
    }

    state.complete = true;
}

/// Exit the app when the scenario is complete
fn scenario_exit_on_complete(state: Res<ScenarioState>, mut exit: EventWriter<AppExit>) {
    if state.complete {
        exit.send(AppExit::Success);
    }
}

/// Run a headless scenario with the given configuration
pub fn run_scenario(config: ScenarioConfig) -> Result<(), String> {
    config.validate()?;
    let book = load_ability_book(&config.ability_book)?;

    // Every equipped ability must exist in the book before the run starts.
    for actor in &config.actors {
        for key in &actor.abilities {
            if !book.contains(key) {
                return Err(format!(
                    "actor '{}' equips unknown ability '{}'",
                    actor.name, key
                ));
            }
        }
    }

    println!("Starting headless scenario...");
    println!(
        "  Actors: {}",
        config
            .actors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Script actions: {}", config.script.len());
    println!("  Duration: {:.0}s", config.duration_secs);

    App::new()
        // Minimal plugins - no window, no rendering
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(ScenarioPlugin { config, book })
        .run();

    Ok(())
}
