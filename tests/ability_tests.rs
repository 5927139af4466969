//! Integration tests for the ability state machine
//!
//! These tests drive the full engine pipeline through a Bevy app: input
//! events in, attribute mutations and notifications out. Time is advanced
//! manually so every timer boundary is exact.

use bevy::prelude::*;
use std::time::Duration;

use spellforge::abilities::AttributeCost;
use spellforge::effects::{EffectPending, EffectTags};
use spellforge::*;

fn instant_damage(name: &str, amount: f32) -> EffectSpec {
    EffectSpec {
        name: name.to_string(),
        application: EffectApplication::Instant,
        tags: EffectTags::default(),
        duration: 0.0,
        tick_interval: 0.0,
        stack_policy: StackPolicy::default(),
        modifiers: vec![AttributeModifier {
            attribute: "Health".to_string(),
            op: AttributeOp::Subtract,
            value: amount,
        }],
    }
}

/// Spawn a caster, a target and one equipped ability; run one frame so the
/// ability initializes.
fn setup(ability: Ability, caster_attrs: AttributeSet) -> (App, Entity, Entity, Entity) {
    let mut app = App::new();
    app.add_plugins(AbilityEnginePlugin);
    app.init_resource::<Time>();

    let caster = app
        .world_mut()
        .spawn((caster_attrs, ActiveEffects::default()))
        .id();
    let target = app
        .world_mut()
        .spawn((
            AttributeSet::new().with("Health", 200.0),
            ActiveEffects::default(),
        ))
        .id();
    let slot = app
        .world_mut()
        .spawn((
            ability,
            AbilityOwner {
                owner: caster,
                instigator: caster,
            },
            AbilityTarget { target },
        ))
        .id();

    app.update();
    (app, caster, target, slot)
}

fn advance(app: &mut App, secs: f32) {
    app.world_mut()
        .resource_mut::<Time>()
        .advance_by(Duration::from_secs_f32(secs));
    app.update();
}

fn press(app: &mut App, slot: Entity) {
    app.world_mut().send_event(AbilityInputPressed { ability: slot });
    advance(app, 0.0);
}

fn release(app: &mut App, slot: Entity) {
    app.world_mut().send_event(AbilityInputReleased { ability: slot });
    advance(app, 0.0);
}

fn attribute(app: &App, entity: Entity, name: &str) -> f32 {
    app.world()
        .get::<AttributeSet>(entity)
        .unwrap()
        .get(name)
        .unwrap()
}

#[test]
fn instant_ability_applies_its_effect_on_the_press_frame() {
    let mut ability = Ability::new("Strike", CastType::Instant);
    ability.cooldown = 5.0;
    ability.costs.push(AttributeCost {
        attribute: "Energy".to_string(),
        amount: 25.0,
    });
    ability.triggers = Some(instant_damage("Strike Hit", 30.0));

    let (mut app, caster, target, slot) = setup(ability, AttributeSet::new().with("Energy", 100.0));

    press(&mut app, slot);

    assert_eq!(attribute(&app, caster, "Energy"), 75.0);
    assert_eq!(attribute(&app, target, "Health"), 170.0);
}

#[test]
fn cooldown_blocks_reactivation_until_it_elapses() {
    let mut ability = Ability::new("Strike", CastType::Instant);
    ability.cooldown = 5.0;
    ability.triggers = Some(instant_damage("Strike Hit", 30.0));

    let (mut app, _caster, target, slot) = setup(ability, AttributeSet::new());

    press(&mut app, slot);
    assert_eq!(attribute(&app, target, "Health"), 170.0);

    // Pressing again during the cooldown does nothing.
    press(&mut app, slot);
    assert_eq!(attribute(&app, target, "Health"), 170.0);

    // Five one-second ticks clear a five-second cooldown exactly.
    for _ in 0..5 {
        advance(&mut app, 1.0);
    }
    press(&mut app, slot);
    assert_eq!(attribute(&app, target, "Health"), 140.0);
}

#[test]
fn insufficient_cost_rejects_without_partial_debit() {
    let mut ability = Ability::new("Combo", CastType::Instant);
    ability.costs.push(AttributeCost {
        attribute: "Energy".to_string(),
        amount: 20.0,
    });
    ability.costs.push(AttributeCost {
        attribute: "Mana".to_string(),
        amount: 50.0,
    });
    ability.triggers = Some(instant_damage("Combo Hit", 30.0));

    let (mut app, caster, target, slot) = setup(
        ability,
        AttributeSet::new().with("Energy", 100.0).with("Mana", 10.0),
    );

    press(&mut app, slot);

    assert_eq!(attribute(&app, caster, "Energy"), 100.0);
    assert_eq!(attribute(&app, caster, "Mana"), 10.0);
    assert_eq!(attribute(&app, target, "Health"), 200.0);
}

#[test]
fn casted_ability_fires_when_the_cast_timer_completes() {
    let mut ability = Ability::new("Fire Bolt", CastType::Casted);
    ability.max_cast_time = 1.5;
    ability.cooldown = 2.0;
    ability.costs.push(AttributeCost {
        attribute: "Mana".to_string(),
        amount: 20.0,
    });
    ability.triggers = Some(instant_damage("Scorch", 30.0));

    let (mut app, caster, target, slot) = setup(ability, AttributeSet::new().with("Mana", 100.0));

    press(&mut app, slot);
    // Cast in flight: cost validated but not debited, no effect yet.
    assert_eq!(attribute(&app, caster, "Mana"), 100.0);
    assert_eq!(attribute(&app, target, "Health"), 200.0);

    advance(&mut app, 1.0);
    assert_eq!(attribute(&app, target, "Health"), 200.0);

    advance(&mut app, 0.5);
    assert_eq!(attribute(&app, caster, "Mana"), 80.0);
    assert_eq!(attribute(&app, target, "Health"), 170.0);
}

#[test]
fn channel_pulses_each_interval_and_release_stops_it() {
    let mut ability = Ability::new("Drain", CastType::Channeled);
    ability.max_cast_time = 10.0;
    ability.channel_interval = 1.0;
    ability.cooldown = 3.0;
    ability.costs.push(AttributeCost {
        attribute: "Mana".to_string(),
        amount: 10.0,
    });
    ability.triggers = Some(instant_damage("Drain Pulse", 8.0));

    let (mut app, caster, target, slot) = setup(ability, AttributeSet::new().with("Mana", 100.0));

    press(&mut app, slot);
    advance(&mut app, 1.0);
    advance(&mut app, 1.0);

    // Two pulses: two debits, two applications.
    assert_eq!(attribute(&app, caster, "Mana"), 80.0);
    assert_eq!(attribute(&app, target, "Health"), 184.0);

    release(&mut app, slot);
    advance(&mut app, 2.0);

    // No further pulses after release.
    assert_eq!(attribute(&app, caster, "Mana"), 80.0);
    assert_eq!(attribute(&app, target, "Health"), 184.0);
}

#[test]
fn charged_cast_fires_on_release_after_the_cast_bar_fills() {
    let mut ability = Ability::new("Surge", CastType::CastedCharged);
    ability.max_cast_time = 1.0;
    ability.max_overcast_time = 2.0;
    ability.costs.push(AttributeCost {
        attribute: "Mana".to_string(),
        amount: 35.0,
    });
    ability.triggers = Some(instant_damage("Surge Blast", 50.0));

    let (mut app, caster, target, slot) = setup(ability, AttributeSet::new().with("Mana", 100.0));

    press(&mut app, slot);
    advance(&mut app, 1.0); // cast bar fills, charging begins
    advance(&mut app, 1.0); // half charge

    assert_eq!(attribute(&app, target, "Health"), 200.0);

    release(&mut app, slot);
    assert_eq!(attribute(&app, caster, "Mana"), 65.0);
    assert_eq!(attribute(&app, target, "Health"), 150.0);
}

#[test]
fn release_during_the_cast_phase_cancels_a_charged_cast() {
    let mut ability = Ability::new("Surge", CastType::CastedCharged);
    ability.max_cast_time = 1.0;
    ability.max_overcast_time = 2.0;
    ability.costs.push(AttributeCost {
        attribute: "Mana".to_string(),
        amount: 35.0,
    });
    ability.triggers = Some(instant_damage("Surge Blast", 50.0));

    let (mut app, caster, target, slot) = setup(ability, AttributeSet::new().with("Mana", 100.0));

    press(&mut app, slot);
    advance(&mut app, 0.5);
    release(&mut app, slot);
    advance(&mut app, 2.0);

    assert_eq!(attribute(&app, caster, "Mana"), 100.0);
    assert_eq!(attribute(&app, target, "Health"), 200.0);
}

#[test]
fn effect_received_fires_even_when_initialization_fails() {
    let mut app = App::new();
    app.add_plugins(AbilityEnginePlugin);
    app.init_resource::<Time>();

    let target = app
        .world_mut()
        .spawn((
            AttributeSet::new().with("Health", 100.0),
            ActiveEffects::default(),
        ))
        .id();

    let mut bad = instant_damage("Hex", 10.0);
    bad.modifiers.push(AttributeModifier {
        attribute: "Sanity".to_string(),
        op: AttributeOp::Subtract,
        value: 1.0,
    });
    app.world_mut().spawn(EffectPending {
        target,
        causer: target,
        effect: bad,
        charge: None,
    });

    app.update();

    // Discarded without mutation, but the target-side notification still fired.
    assert_eq!(
        app.world()
            .get::<AttributeSet>(target)
            .unwrap()
            .get("Health"),
        Ok(100.0)
    );
    let events = app.world().resource::<Events<EffectReceived>>();
    let mut cursor = events.get_cursor();
    assert_eq!(cursor.read(events).count(), 1);
}
