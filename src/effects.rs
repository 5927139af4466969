//! Effect Engine
//!
//! Owns the per-entity collection of active effects and resolves how a newly
//! triggered effect interacts with effects already on the target:
//! - Instant effects mutate the target once and are never tracked
//! - Periodic effects are merged into the collection via the stacking rules
//!   (refresh or extend, matched by tag-set identity)
//! - Duration effects apply their initial mutation and ride out their timer
//!
//! The collection is the sole owner of its effects: removal is synchronous
//! and destroys the effect immediately.

use bevy::prelude::*;
use smallvec::SmallVec;
use thiserror::Error;

use crate::attributes::{AttributeError, AttributeModifier, AttributeSet};
use crate::events::EffectReceived;
use crate::log::{EngineLog, EngineLogEventType};

/// How an effect delivers its mutation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum EffectApplication {
    /// Mutates the target exactly once, never tracked
    Instant,
    /// Re-applies its mutation every `tick_interval` until the duration expires
    Periodic,
    /// Applies its mutation once and persists until the duration expires
    Duration,
}

/// How a new effect interacts with an already-active effect sharing its
/// tag-set identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
pub enum StackPolicy {
    /// Replace the existing instance with the new one (fresh parameters,
    /// fresh duration). At most one instance per tag-set.
    #[default]
    Refresh,
    /// Add the new effect's duration to the existing instance and discard the
    /// new one. Accumulation is unbounded; content data must keep durations
    /// sane.
    ExtendDuration,
}

/// Tag-set identity used for stacking matches.
///
/// Two tag-sets are equal when they contain the same tags, regardless of
/// order.
#[derive(Clone, Debug, Default)]
pub struct EffectTags(SmallVec<[String; 4]>);

impl EffectTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl PartialEq for EffectTags {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|tag| other.0.contains(tag))
    }
}

impl Eq for EffectTags {}

/// A unit of attribute mutation, as authored in content data.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSpec {
    /// Display name used in notifications and the engine log
    pub name: String,
    /// Delivery mode
    pub application: EffectApplication,
    /// Identity for stacking matches
    pub tags: EffectTags,
    /// Lifetime in seconds (ignored for Instant)
    pub duration: f32,
    /// Seconds between periodic re-applications (Periodic only)
    pub tick_interval: f32,
    /// Stacking behavior when another effect with the same tags is active
    pub stack_policy: StackPolicy,
    /// The mutations this effect performs on the target
    pub modifiers: Vec<AttributeModifier>,
}

/// A live effect owned by a target's [`ActiveEffects`] collection.
#[derive(Clone, Debug)]
pub struct ActiveEffect {
    pub spec: EffectSpec,
    /// Seconds until this effect expires
    pub remaining: f32,
    /// Seconds until the next periodic re-application
    pub time_until_next_tick: f32,
    /// Entity responsible for triggering the effect
    pub causer: Entity,
}

/// Per-entity ordered collection of active effects. Insertion order is the
/// processing order on every tick; the stacking-refresh rule is the only
/// thing that reorders it (remove + re-append).
#[derive(Component, Debug, Default)]
pub struct ActiveEffects {
    effects: Vec<ActiveEffect>,
}

impl ActiveEffects {
    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Find the first active effect whose tag-set matches.
    pub fn find(&self, tags: &EffectTags) -> Option<&ActiveEffect> {
        self.effects.iter().find(|e| e.spec.tags == *tags)
    }

    /// Explicitly remove the first effect matching the tag-set (a dispel).
    /// Removal is immediate; the returned effect is the caller's to drop.
    pub fn remove_matching(&mut self, tags: &EffectTags) -> Option<ActiveEffect> {
        let index = self.effects.iter().position(|e| e.spec.tags == *tags)?;
        Some(self.effects.remove(index))
    }
}

/// Errors from effect application.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    /// The effect's initialization failed (a modifier names an attribute the
    /// target doesn't have, or divides by zero). The effect is discarded and
    /// never tracked; the triggering ability proceeds as if no effect were
    /// configured.
    #[error("effect '{name}' failed to initialize: {source}")]
    InvalidInit {
        name: String,
        #[source]
        source: AttributeError,
    },
}

/// How an application resolved against the target's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOutcome {
    /// Instant effect, mutated once and discarded
    Applied,
    /// Tracked effect appended with no stacking match
    Added,
    /// Matched an ExtendDuration effect; its remaining duration grew
    Extended,
    /// Matched a Refresh effect; the old instance was destroyed and the new
    /// one appended
    Refreshed,
}

/// Pending effect application, spawned by an ability on activation and
/// drained by [`apply_pending_effects`] in the same frame.
#[derive(Component)]
pub struct EffectPending {
    /// Entity the effect applies to
    pub target: Entity,
    /// Entity responsible for the application
    pub causer: Entity,
    /// The effect to apply
    pub effect: EffectSpec,
    /// Accumulated charge fraction (0.0..=1.0) for charged casts. The engine
    /// does not scale anything with it; external effect logic may.
    pub charge: Option<f32>,
}

/// Validate that every modifier on the spec can apply to this target.
/// Initialization is all-or-nothing: a spec that would fail half-way is
/// rejected before any mutation.
fn validate_spec(spec: &EffectSpec, attrs: &AttributeSet) -> Result<(), EffectError> {
    for modifier in &spec.modifiers {
        if !attrs.contains(&modifier.attribute) {
            return Err(EffectError::InvalidInit {
                name: spec.name.clone(),
                source: AttributeError::NotFound(modifier.attribute.clone()),
            });
        }
        if modifier.op == crate::attributes::AttributeOp::Divide && modifier.value == 0.0 {
            return Err(EffectError::InvalidInit {
                name: spec.name.clone(),
                source: AttributeError::DivideByZero(modifier.attribute.clone()),
            });
        }
    }
    Ok(())
}

fn apply_modifiers(spec: &EffectSpec, attrs: &mut AttributeSet) -> Result<(), EffectError> {
    for modifier in &spec.modifiers {
        attrs.apply(modifier).map_err(|source| EffectError::InvalidInit {
            name: spec.name.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Apply an effect to a target.
///
/// Instant effects mutate the target once and are not tracked. Periodic and
/// Duration effects apply their first-activation mutation here; Periodic
/// effects are then merged into the collection via the stacking rules,
/// Duration effects are appended directly (non-periodic effects never merge).
///
/// A failed initialization discards the effect entirely. The caller emits the
/// effect-received notification regardless of the outcome.
pub fn apply_effect(
    spec: EffectSpec,
    causer: Entity,
    attrs: &mut AttributeSet,
    collection: &mut ActiveEffects,
) -> Result<EffectOutcome, EffectError> {
    validate_spec(&spec, attrs)?;

    if spec.application == EffectApplication::Instant {
        apply_modifiers(&spec, attrs)?;
        return Ok(EffectOutcome::Applied);
    }

    // First-activation mutation happens at initialization time.
    apply_modifiers(&spec, attrs)?;

    let effect = ActiveEffect {
        time_until_next_tick: spec.tick_interval,
        remaining: spec.duration,
        causer,
        spec,
    };

    if effect.spec.application == EffectApplication::Periodic {
        Ok(merge_periodic(collection, effect))
    } else {
        collection.effects.push(effect);
        Ok(EffectOutcome::Added)
    }
}

/// Stacking algorithm: resolve a new periodic effect against the first
/// existing effect with the same tag-set identity.
///
/// The matched effect's own stack policy decides the outcome. Either way the
/// invariant holds: at most one active instance per tag-set.
fn merge_periodic(collection: &mut ActiveEffects, new_effect: ActiveEffect) -> EffectOutcome {
    let matched = collection
        .effects
        .iter()
        .position(|e| e.spec.tags == new_effect.spec.tags);

    match matched {
        None => {
            collection.effects.push(new_effect);
            EffectOutcome::Added
        }
        Some(index) => match collection.effects[index].spec.stack_policy {
            StackPolicy::ExtendDuration => {
                // The new instance is discarded; only its duration survives,
                // pooled onto the existing effect.
                collection.effects[index].remaining += new_effect.spec.duration;
                EffectOutcome::Extended
            }
            StackPolicy::Refresh => {
                // Destroy the old instance, append the new one fresh.
                collection.effects.remove(index);
                collection.effects.push(new_effect);
                EffectOutcome::Refreshed
            }
        },
    }
}

/// What happened to one effect during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectTickReport {
    /// A periodic effect re-applied its modifiers
    Ticked { name: String },
    /// An effect's duration ran out and it was removed
    Expired { name: String },
    /// A periodic re-application hit an attribute error; the effect was
    /// removed so the content bug does not re-fire every interval
    Faulted { name: String, error: AttributeError },
}

/// Advance every effect in a collection by `dt` seconds.
///
/// Effects are processed in insertion order. Periodic effects re-apply their
/// modifiers once per elapsed interval (the tick timer keeps its cadence
/// across frames); any effect whose remaining duration reaches zero is
/// removed synchronously.
pub fn tick_collection(
    collection: &mut ActiveEffects,
    attrs: &mut AttributeSet,
    dt: f32,
) -> Vec<EffectTickReport> {
    let mut reports = Vec::new();
    let mut to_remove = Vec::new();

    for (index, effect) in collection.effects.iter_mut().enumerate() {
        effect.remaining -= dt;

        if effect.spec.application == EffectApplication::Periodic && effect.spec.tick_interval > 0.0
        {
            effect.time_until_next_tick -= dt;
            if effect.time_until_next_tick <= 0.0 {
                // Keep cadence relative to the configured interval rather
                // than the frame boundary.
                effect.time_until_next_tick += effect.spec.tick_interval;

                let mut faulted = false;
                for modifier in &effect.spec.modifiers {
                    if let Err(error) = attrs.apply(modifier) {
                        reports.push(EffectTickReport::Faulted {
                            name: effect.spec.name.clone(),
                            error,
                        });
                        to_remove.push(index);
                        faulted = true;
                        break;
                    }
                }
                if !faulted {
                    reports.push(EffectTickReport::Ticked {
                        name: effect.spec.name.clone(),
                    });
                }
            }
        }

        if effect.remaining <= 0.0 && !to_remove.contains(&index) {
            reports.push(EffectTickReport::Expired {
                name: effect.spec.name.clone(),
            });
            to_remove.push(index);
        }
    }

    // Remove in reverse order to preserve indices
    for &index in to_remove.iter().rev() {
        collection.effects.remove(index);
    }

    reports
}

// ============================================================================
// Systems
// ============================================================================

/// Drain pending effect applications spawned by abilities this frame.
///
/// Targets without an [`ActiveEffects`] collection get one inserted lazily
/// when a tracked effect lands on them.
pub fn apply_pending_effects(
    mut commands: Commands,
    mut log: ResMut<EngineLog>,
    pending: Query<(Entity, &EffectPending)>,
    mut targets: Query<(&mut AttributeSet, Option<&mut ActiveEffects>)>,
    mut received: EventWriter<EffectReceived>,
) {
    for (pending_entity, pend) in pending.iter() {
        let Ok((mut attrs, active)) = targets.get_mut(pend.target) else {
            // Target has no attribute store; nothing to apply to.
            commands.entity(pending_entity).despawn();
            continue;
        };

        let effect_name = pend.effect.name.clone();
        let result = match active {
            Some(mut collection) => {
                apply_effect(pend.effect.clone(), pend.causer, &mut attrs, &mut collection)
            }
            None => {
                let mut collection = ActiveEffects::default();
                let result =
                    apply_effect(pend.effect.clone(), pend.causer, &mut attrs, &mut collection);
                if !collection.is_empty() {
                    commands.entity(pend.target).insert(collection);
                }
                result
            }
        };

        match result {
            Ok(outcome) => {
                let what = match outcome {
                    EffectOutcome::Applied => "applied instantly",
                    EffectOutcome::Added => "added",
                    EffectOutcome::Extended => "extended an active instance",
                    EffectOutcome::Refreshed => "refreshed an active instance",
                };
                let charge_note = match pend.charge {
                    Some(charge) => format!(" (charge {:.0}%)", charge * 100.0),
                    None => String::new(),
                };
                log.log(
                    EngineLogEventType::EffectApplied,
                    format!("Effect '{}' {}{}", effect_name, what, charge_note),
                );
            }
            Err(err) => {
                warn!("discarding effect: {}", err);
                log.log(
                    EngineLogEventType::EffectRejected,
                    format!("Effect '{}' discarded: {}", effect_name, err),
                );
            }
        }

        // The target-side notification fires regardless of the path taken.
        received.send(EffectReceived {
            target: pend.target,
            effect_name,
        });

        commands.entity(pending_entity).despawn();
    }
}

/// Per-frame duty: tick every entity's active effect collection.
pub fn tick_effects(
    time: Res<Time>,
    mut log: ResMut<EngineLog>,
    mut targets: Query<(&mut AttributeSet, &mut ActiveEffects)>,
) {
    let dt = time.delta_secs();

    for (mut attrs, mut collection) in targets.iter_mut() {
        for report in tick_collection(&mut collection, &mut attrs, dt) {
            match report {
                EffectTickReport::Ticked { name } => {
                    log.log(EngineLogEventType::EffectTick, format!("Effect '{}' ticked", name));
                }
                EffectTickReport::Expired { name } => {
                    log.log(
                        EngineLogEventType::EffectExpired,
                        format!("Effect '{}' expired", name),
                    );
                }
                EffectTickReport::Faulted { name, error } => {
                    warn!("effect '{}' removed after attribute error: {}", name, error);
                    log.log(
                        EngineLogEventType::EffectRejected,
                        format!("Effect '{}' removed: {}", name, error),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeOp;

    fn spec(name: &str, application: EffectApplication, tags: &[&str]) -> EffectSpec {
        EffectSpec {
            name: name.to_string(),
            application,
            tags: EffectTags::new(tags.iter().copied()),
            duration: 6.0,
            tick_interval: 2.0,
            stack_policy: StackPolicy::Refresh,
            modifiers: vec![AttributeModifier {
                attribute: "Health".to_string(),
                op: AttributeOp::Subtract,
                value: 5.0,
            }],
        }
    }

    fn causer() -> Entity {
        Entity::from_raw(7)
    }

    #[test]
    fn tag_sets_match_regardless_of_order() {
        let a = EffectTags::new(["burn", "fire"]);
        let b = EffectTags::new(["fire", "burn"]);
        let c = EffectTags::new(["fire"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn instant_effect_mutates_once_and_is_not_tracked() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        let outcome = apply_effect(
            spec("Scorch", EffectApplication::Instant, &["scorch"]),
            causer(),
            &mut attrs,
            &mut collection,
        );

        assert_eq!(outcome, Ok(EffectOutcome::Applied));
        assert_eq!(attrs.get("Health"), Ok(95.0));
        assert!(collection.is_empty());
    }

    #[test]
    fn invalid_init_discards_effect_without_mutation() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        let mut bad = spec("Hex", EffectApplication::Periodic, &["hex"]);
        bad.modifiers.push(AttributeModifier {
            attribute: "Sanity".to_string(),
            op: AttributeOp::Subtract,
            value: 1.0,
        });

        let outcome = apply_effect(bad, causer(), &mut attrs, &mut collection);
        assert!(matches!(outcome, Err(EffectError::InvalidInit { .. })));
        // All-or-nothing: the valid Health modifier must not have run either.
        assert_eq!(attrs.get("Health"), Ok(100.0));
        assert!(collection.is_empty());
    }

    #[test]
    fn refresh_keeps_exactly_one_instance_with_new_parameters() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        let first = spec("Poison", EffectApplication::Periodic, &["poison"]);
        let mut second = spec("Poison II", EffectApplication::Periodic, &["poison"]);
        second.duration = 9.0;

        apply_effect(first, causer(), &mut attrs, &mut collection).unwrap();
        let outcome = apply_effect(second, causer(), &mut attrs, &mut collection).unwrap();

        assert_eq!(outcome, EffectOutcome::Refreshed);
        assert_eq!(collection.len(), 1);
        let active = collection.iter().next().unwrap();
        assert_eq!(active.spec.name, "Poison II");
        assert_eq!(active.remaining, 9.0);
    }

    #[test]
    fn extend_duration_pools_durations_onto_one_instance() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        let mut first = spec("Bleed", EffectApplication::Periodic, &["bleed"]);
        first.stack_policy = StackPolicy::ExtendDuration;
        let mut second = first.clone();
        second.duration = 4.0;

        apply_effect(first, causer(), &mut attrs, &mut collection).unwrap();
        let outcome = apply_effect(second, causer(), &mut attrs, &mut collection).unwrap();

        assert_eq!(outcome, EffectOutcome::Extended);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.iter().next().unwrap().remaining, 10.0);
    }

    #[test]
    fn periodic_effect_ticks_on_interval_and_expires() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        // 6s duration, 2s interval, 5 damage per application.
        apply_effect(
            spec("Poison", EffectApplication::Periodic, &["poison"]),
            causer(),
            &mut attrs,
            &mut collection,
        )
        .unwrap();
        // Initialization applied the first tick.
        assert_eq!(attrs.get("Health"), Ok(95.0));

        for _ in 0..6 {
            tick_collection(&mut collection, &mut attrs, 1.0);
        }

        // Re-applications at t=2, 4, 6.
        assert_eq!(attrs.get("Health"), Ok(80.0));
        assert!(collection.is_empty());
    }

    #[test]
    fn duration_effect_applies_once_then_expires_silently() {
        let mut attrs = AttributeSet::new().with("Armor", 10.0);
        let mut collection = ActiveEffects::default();

        let mut buff = spec("Stoneskin", EffectApplication::Duration, &["stoneskin"]);
        buff.modifiers = vec![AttributeModifier {
            attribute: "Armor".to_string(),
            op: AttributeOp::Add,
            value: 5.0,
        }];
        buff.duration = 3.0;

        apply_effect(buff, causer(), &mut attrs, &mut collection).unwrap();
        assert_eq!(attrs.get("Armor"), Ok(15.0));
        assert_eq!(collection.len(), 1);

        let reports = tick_collection(&mut collection, &mut attrs, 3.0);
        assert_eq!(
            reports,
            vec![EffectTickReport::Expired {
                name: "Stoneskin".to_string()
            }]
        );
        // No further mutation on expiry.
        assert_eq!(attrs.get("Armor"), Ok(15.0));
    }

    #[test]
    fn remove_matching_is_synchronous() {
        let mut attrs = AttributeSet::new().with("Health", 100.0);
        let mut collection = ActiveEffects::default();

        apply_effect(
            spec("Poison", EffectApplication::Periodic, &["poison"]),
            causer(),
            &mut attrs,
            &mut collection,
        )
        .unwrap();

        let removed = collection.remove_matching(&EffectTags::new(["poison"]));
        assert!(removed.is_some());
        assert!(collection.is_empty());
        assert!(collection.remove_matching(&EffectTags::new(["poison"])).is_none());
    }
}
