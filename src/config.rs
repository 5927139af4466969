//! Data-Driven Ability Configuration
//!
//! Abilities and the effects they trigger are defined in RON config files
//! instead of being hardcoded in Rust, so balance changes don't require
//! recompilation. The whole book is validated at load time: a cast type
//! missing its required timers, or a periodic effect without an interval, is
//! rejected before the first frame runs.
//!
//! ## Usage
//! ```ignore
//! fn my_system(book: Res<AbilityBook>) {
//!     let def = book.get("fire_bolt").unwrap();
//!     println!("Fire Bolt cast time: {}", def.max_cast_time);
//! }
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::abilities::{Ability, AbilityOwner, AbilityTarget, AttributeCost, CastType};
use crate::effects::{EffectApplication, EffectSpec, EffectTags, StackPolicy};

/// Effect definition as authored in the config file. Mirrors
/// [`EffectSpec`] with serde defaults for the optional timer fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectDef {
    /// Display name of the effect
    pub name: String,
    /// Delivery mode: Instant, Periodic or Duration
    pub application: EffectApplication,
    /// Stacking identity; effects sharing a tag-set stack against each other
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lifetime in seconds (ignored for Instant)
    #[serde(default)]
    pub duration: f32,
    /// Seconds between re-applications (Periodic only)
    #[serde(default)]
    pub tick_interval: f32,
    /// Behavior when another effect with the same tags is active
    #[serde(default)]
    pub stack_policy: StackPolicy,
    /// Attribute mutations this effect performs
    pub modifiers: Vec<crate::attributes::AttributeModifier>,
}

impl EffectDef {
    pub fn to_spec(&self) -> EffectSpec {
        EffectSpec {
            name: self.name.clone(),
            application: self.application,
            tags: EffectTags::new(self.tags.iter().cloned()),
            duration: self.duration,
            tick_interval: self.tick_interval,
            stack_policy: self.stack_policy,
            modifiers: self.modifiers.clone(),
        }
    }

    fn validate(&self, key: &str) -> Result<(), String> {
        if self.modifiers.is_empty() {
            return Err(format!("effect '{}' on '{}' has no modifiers", self.name, key));
        }
        match self.application {
            EffectApplication::Instant => {}
            EffectApplication::Periodic => {
                if self.duration <= 0.0 {
                    return Err(format!(
                        "periodic effect '{}' on '{}' needs a positive duration",
                        self.name, key
                    ));
                }
                if self.tick_interval <= 0.0 {
                    return Err(format!(
                        "periodic effect '{}' on '{}' needs a positive tick_interval",
                        self.name, key
                    ));
                }
            }
            EffectApplication::Duration => {
                if self.duration <= 0.0 {
                    return Err(format!(
                        "duration effect '{}' on '{}' needs a positive duration",
                        self.name, key
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Complete ability configuration loaded from RON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Display name of the ability
    pub name: String,
    /// Activation mode
    pub cast_type: CastType,
    /// Cast duration (Casted/CastedCharged) or total channel time (Channeled)
    #[serde(default)]
    pub max_cast_time: f32,
    /// Seconds between channel pulses
    #[serde(default)]
    pub channel_interval: f32,
    /// Maximum charge accumulation after the cast bar fills
    #[serde(default)]
    pub max_overcast_time: f32,
    /// Cooldown after a successful activation
    #[serde(default)]
    pub cooldown: f32,
    /// Attribute costs, all validated before any debit
    #[serde(default)]
    pub costs: Vec<AttributeCost>,
    /// Effect instantiated on each activation (if any)
    #[serde(default)]
    pub triggers: Option<EffectDef>,
}

impl AbilityDef {
    /// Build a fresh, uninitialized [`Ability`] component from this
    /// definition.
    pub fn instantiate(&self) -> Ability {
        let mut ability = Ability::new(self.name.clone(), self.cast_type);
        ability.max_cast_time = self.max_cast_time;
        ability.channel_interval = self.channel_interval;
        ability.max_overcast_time = self.max_overcast_time;
        ability.cooldown = self.cooldown;
        ability.costs = self.costs.iter().cloned().collect();
        ability.triggers = self.triggers.as_ref().map(EffectDef::to_spec);
        ability
    }

    fn validate(&self, key: &str) -> Result<(), String> {
        match self.cast_type {
            CastType::Instant => {}
            CastType::Casted => {
                if self.max_cast_time <= 0.0 {
                    return Err(format!("casted ability '{}' needs a positive max_cast_time", key));
                }
            }
            CastType::CastedCharged => {
                if self.max_cast_time <= 0.0 {
                    return Err(format!(
                        "charged ability '{}' needs a positive max_cast_time",
                        key
                    ));
                }
                if self.max_overcast_time <= 0.0 {
                    return Err(format!(
                        "charged ability '{}' needs a positive max_overcast_time",
                        key
                    ));
                }
            }
            CastType::Channeled => {
                if self.max_cast_time <= 0.0 {
                    return Err(format!(
                        "channeled ability '{}' needs a positive max_cast_time",
                        key
                    ));
                }
                if self.channel_interval <= 0.0 {
                    return Err(format!(
                        "channeled ability '{}' needs a positive channel_interval",
                        key
                    ));
                }
            }
        }
        for cost in &self.costs {
            if cost.amount < 0.0 {
                return Err(format!(
                    "ability '{}' has a negative cost on '{}'",
                    key, cost.attribute
                ));
            }
        }
        if let Some(effect) = &self.triggers {
            effect.validate(key)?;
        }
        Ok(())
    }
}

/// Root structure for the abilities.ron file
#[derive(Debug, Serialize, Deserialize)]
pub struct AbilityBookConfig {
    pub abilities: HashMap<String, AbilityDef>,
}

/// Resource containing all ability definitions, keyed by their config name.
///
/// Loaded from `assets/config/abilities.ron` at startup.
/// Access via `Res<AbilityBook>` in systems.
#[derive(Resource, Debug, Clone, Default)]
pub struct AbilityBook {
    definitions: HashMap<String, AbilityDef>,
}

impl AbilityBook {
    pub fn new(config: AbilityBookConfig) -> Self {
        Self {
            definitions: config.abilities,
        }
    }

    /// Get the definition for an ability key
    pub fn get(&self, key: &str) -> Option<&AbilityDef> {
        self.definitions.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    /// All defined ability keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Validate every definition in the book.
    pub fn validate(&self) -> Result<(), String> {
        for (key, def) in &self.definitions {
            def.validate(key)?;
        }
        Ok(())
    }
}

/// Spawn an equipped-ability entity for `owner` from the book.
pub fn spawn_ability(
    commands: &mut Commands,
    book: &AbilityBook,
    key: &str,
    owner: Entity,
    instigator: Entity,
    target: Option<Entity>,
) -> Result<Entity, String> {
    let def = book
        .get(key)
        .ok_or_else(|| format!("ability '{}' not found in the ability book", key))?;

    let mut entity = commands.spawn((def.instantiate(), AbilityOwner { owner, instigator }));
    if let Some(target) = target {
        entity.insert(AbilityTarget { target });
    }
    Ok(entity.id())
}

/// Parse an ability book from RON text.
pub fn parse_ability_book(contents: &str) -> Result<AbilityBook, String> {
    let config: AbilityBookConfig =
        ron::from_str(contents).map_err(|e| format!("Failed to parse ability book: {}", e))?;
    let book = AbilityBook::new(config);
    book.validate()?;
    Ok(book)
}

/// Load and validate an ability book from a RON file.
pub fn load_ability_book(path: &str) -> Result<AbilityBook, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let book = parse_ability_book(&contents)?;
    info!("Loaded {} ability definitions from {}", book.len(), path);
    Ok(book)
}

/// Bevy plugin for ability book loading
pub struct AbilityBookPlugin {
    pub path: String,
}

impl Default for AbilityBookPlugin {
    fn default() -> Self {
        Self {
            path: "assets/config/abilities.ron".to_string(),
        }
    }
}

impl Plugin for AbilityBookPlugin {
    fn build(&self, app: &mut App) {
        match load_ability_book(&self.path) {
            Ok(book) => {
                app.insert_resource(book);
            }
            Err(e) => {
                // The book is the engine's content; refuse to run without it.
                panic!("Failed to load ability book: {}", e);
            }
        }
    }
}
