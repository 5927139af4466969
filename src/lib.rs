//! SpellForge - Data-Driven Ability and Effect Engine
//!
//! A tick-driven engine for casting abilities and applying their effects:
//! attribute stores, an effect engine with stacking rules, and a four-mode
//! ability state machine (instant, casted, charged, channeled), all configured
//! from RON content files.
//!
//! This library exposes the core engine modules for testing and reuse.

pub mod abilities;
pub mod attributes;
pub mod cli;
pub mod config;
pub mod effects;
pub mod events;
pub mod headless;
pub mod log;

use bevy::prelude::*;

// Re-export commonly used types
pub use abilities::{Ability, AbilityOwner, AbilityState, AbilityTarget, CastType};
pub use attributes::{AttributeError, AttributeModifier, AttributeOp, AttributeSet};
pub use config::{AbilityBook, AbilityBookPlugin};
pub use effects::{ActiveEffects, EffectApplication, EffectSpec, StackPolicy};
pub use events::{
    AbilityInitialized, AbilityInputPressed, AbilityInputReleased, AbilityStarted, AbilityStopped,
    EffectReceived,
};
pub use headless::ScenarioConfig;
pub use log::{EngineLog, EngineLogEventType};

/// Label for the engine's Update chain. Collaborators schedule input-producing
/// systems before this set and observers after it.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbilityEngineSet;

/// The complete engine: events, log, and the per-frame pipeline.
///
/// Order within a frame: input handling runs before the ability tick so a
/// press lands on the same frame it arrives, and effects apply after the
/// abilities that spawned them.
pub struct AbilityEnginePlugin;

impl Plugin for AbilityEnginePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AbilityInputPressed>()
            .add_event::<AbilityInputReleased>()
            .add_event::<AbilityInitialized>()
            .add_event::<AbilityStarted>()
            .add_event::<AbilityStopped>()
            .add_event::<EffectReceived>()
            .init_resource::<EngineLog>()
            .add_systems(
                Update,
                (
                    log::advance_log_time,
                    abilities::initialize_abilities,
                    abilities::handle_ability_input,
                    abilities::tick_abilities,
                    effects::apply_pending_effects,
                    effects::tick_effects,
                )
                    .chain()
                    .in_set(AbilityEngineSet),
            );
    }
}
