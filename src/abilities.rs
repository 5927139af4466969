//! Ability State Machine
//!
//! Each equipped ability is its own entity carrying an [`Ability`] component
//! and an [`AbilityOwner`] link back to the entity that equipped it. The
//! state machine is `Idle -> Casting | Charging | Channeling -> OnCooldown ->
//! Idle`, driven entirely by input events and the per-frame tick; "waiting"
//! is explicit timer state examined on the next tick, never a blocked thread.
//!
//! Costs are all-or-nothing: every configured cost is validated against the
//! owner's attribute store before any debit, so a rejected activation leaves
//! all attributes untouched.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::attributes::{AttributeError, AttributeOp, AttributeSet};
use crate::effects::{EffectPending, EffectSpec};
use crate::events::{AbilityInitialized, AbilityInputPressed, AbilityInputReleased, AbilityStarted, AbilityStopped};
use crate::log::{EngineLog, EngineLogEventType};

/// How an ability is activated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CastType {
    /// Fires on press, no cast bar
    Instant,
    /// Fires when the cast timer reaches `max_cast_time`
    Casted,
    /// Cast bar fills, then holding the input accumulates charge up to
    /// `max_overcast_time`; release fires at the accumulated charge
    CastedCharged,
    /// Pulses every `channel_interval` until release or `max_cast_time`
    Channeled,
}

/// One attribute cost on an ability (e.g. 20 Mana).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeCost {
    pub attribute: String,
    pub amount: f32,
}

/// Observable state of the machine, derived from the internal flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AbilityState {
    Idle,
    Casting,
    Charging,
    Channeling,
    OnCooldown,
}

/// Why an activation was rejected. Rejections are routine, recoverable
/// outcomes, not errors; the machine state is untouched.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RejectReason {
    /// `initialize` has not run yet
    NotInitialized,
    /// The cooldown timer has not elapsed
    OnCooldown,
    /// A cast, charge or channel is already in progress
    AlreadyActive,
    /// At least one configured cost exceeds the owner's current attribute
    InsufficientCost,
}

/// Result of an input press.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Activation {
    Rejected(RejectReason),
    /// Instant ability fired: cost debited, cooldown started
    Fired,
    /// A cast timer started (Casted / CastedCharged)
    CastStarted,
    /// A channel started; pulses follow on each elapsed interval
    ChannelStarted,
}

/// Result of an input release.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ReleaseOutcome {
    /// The ability was not in a release-sensitive phase
    Ignored,
    /// A charged cast fired at the given charge fraction (0.0..=1.0)
    ChargedFired { charge: f32 },
    /// A charged cast could no longer afford its cost at release
    ChargeCancelled,
    /// Release before the cast bar filled; nothing fired, no cooldown
    CastCancelled,
    /// The channel stopped; cooldown started
    ChannelEnded,
}

/// Transition that occurred during a tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickEvent {
    /// A Casted ability reached its cast time and fired
    CastCompleted,
    /// A Casted ability reached its cast time but could no longer afford its
    /// cost; nothing fired, no cooldown, no debit
    CastRejected,
    /// A CastedCharged ability filled its cast bar and began charging
    ChargeStarted,
    /// The charge timer reached `max_overcast_time` and is now capped
    FullyCharged,
    /// A channel pulse fired: cost re-debited, effect re-triggered
    ChannelPulse,
    /// The channel reached `max_cast_time` or a pulse went unaffordable
    ChannelEnded,
    /// The cooldown elapsed; the ability is ready again
    CooldownFinished,
}

/// Links an equipped ability entity to the entity that owns it and the
/// controller responsible for triggering it.
#[derive(Component, Debug, Clone, Copy)]
pub struct AbilityOwner {
    pub owner: Entity,
    pub instigator: Entity,
}

/// Optional explicit target for the ability's triggered effect. Without it,
/// the effect lands on the owner.
#[derive(Component, Debug, Clone, Copy)]
pub struct AbilityTarget {
    pub target: Entity,
}

/// A reusable ability definition plus its live timer state.
#[derive(Component, Debug, Clone)]
pub struct Ability {
    /// Display name used in notifications and the engine log
    pub name: String,
    pub cast_type: CastType,
    /// Cast duration for Casted/CastedCharged, total channel time for
    /// Channeled
    pub max_cast_time: f32,
    /// Seconds between channel pulses
    pub channel_interval: f32,
    /// Maximum charge accumulation after the cast bar fills
    pub max_overcast_time: f32,
    /// Cooldown entered after a successful activation
    pub cooldown: f32,
    /// Attribute costs, validated all-or-nothing before any debit
    pub costs: SmallVec<[AttributeCost; 2]>,
    /// Effect instantiated on each activation (and each channel pulse)
    pub triggers: Option<EffectSpec>,

    // Live timer state
    current_cast_time: f32,
    current_interval_time: f32,
    current_cooldown_time: f32,
    current_charge_time: f32,
    is_casted: bool,
    is_channeled: bool,
    is_charged: bool,
    is_on_cooldown: bool,
    initialized: bool,
}

impl Ability {
    pub fn new(name: impl Into<String>, cast_type: CastType) -> Self {
        Self {
            name: name.into(),
            cast_type,
            max_cast_time: 0.0,
            channel_interval: 0.0,
            max_overcast_time: 0.0,
            cooldown: 0.0,
            costs: SmallVec::new(),
            triggers: None,
            current_cast_time: 0.0,
            current_interval_time: 0.0,
            current_cooldown_time: 0.0,
            current_charge_time: 0.0,
            is_casted: false,
            is_channeled: false,
            is_charged: false,
            is_on_cooldown: false,
            initialized: false,
        }
    }

    /// One-time setup before first use. Returns false if already initialized
    /// (repeat calls are no-ops).
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.is_on_cooldown
    }

    /// Seconds of cooldown left, zero when ready.
    pub fn cooldown_remaining(&self) -> f32 {
        if self.is_on_cooldown {
            (self.cooldown - self.current_cooldown_time).max(0.0)
        } else {
            0.0
        }
    }

    pub fn state(&self) -> AbilityState {
        if self.is_casted {
            AbilityState::Casting
        } else if self.is_charged {
            AbilityState::Charging
        } else if self.is_channeled {
            AbilityState::Channeling
        } else if self.is_on_cooldown {
            AbilityState::OnCooldown
        } else {
            AbilityState::Idle
        }
    }

    /// Accumulated charge as a fraction of `max_overcast_time`. Exposed for
    /// external effect logic; the engine itself does not scale anything with
    /// it.
    pub fn charge_fraction(&self) -> f32 {
        if self.max_overcast_time > 0.0 {
            (self.current_charge_time / self.max_overcast_time).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Check every configured cost against the owner's attributes without
    /// debiting. `Ok(false)` means at least one cost is unaffordable; an
    /// unknown cost attribute is a configuration bug surfaced as an error.
    pub fn check_costs(&self, attrs: &AttributeSet) -> Result<bool, AttributeError> {
        for cost in &self.costs {
            if attrs.get(&cost.attribute)? < cost.amount {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check, then debit, every configured cost. The check pass completes
    /// before any write, so a failure leaves all attributes unchanged.
    fn settle_costs(&self, attrs: &mut AttributeSet) -> Result<bool, AttributeError> {
        if !self.check_costs(attrs)? {
            return Ok(false);
        }
        for cost in &self.costs {
            attrs.modify(&cost.attribute, cost.amount, AttributeOp::Subtract)?;
        }
        Ok(true)
    }

    fn start_cooldown(&mut self) {
        if self.cooldown <= 0.0 {
            return;
        }
        self.is_on_cooldown = true;
        self.current_cooldown_time = 0.0;
    }

    fn end_channel(&mut self) {
        self.is_channeled = false;
        self.start_cooldown();
    }

    /// Input press: validate and branch by cast type.
    ///
    /// Instant debits its cost and fires synchronously within this call;
    /// Casted and CastedCharged validate the cost up front but debit at the
    /// completion edge; Channeled validates up front and debits per pulse.
    pub fn input_pressed(&mut self, attrs: &mut AttributeSet) -> Result<Activation, AttributeError> {
        if !self.initialized {
            return Ok(Activation::Rejected(RejectReason::NotInitialized));
        }
        if self.is_on_cooldown {
            return Ok(Activation::Rejected(RejectReason::OnCooldown));
        }
        if self.is_casted || self.is_channeled || self.is_charged {
            return Ok(Activation::Rejected(RejectReason::AlreadyActive));
        }

        match self.cast_type {
            CastType::Instant => {
                if self.settle_costs(attrs)? {
                    self.start_cooldown();
                    Ok(Activation::Fired)
                } else {
                    Ok(Activation::Rejected(RejectReason::InsufficientCost))
                }
            }
            CastType::Casted | CastType::CastedCharged => {
                if self.check_costs(attrs)? {
                    self.is_casted = true;
                    self.current_cast_time = 0.0;
                    self.current_charge_time = 0.0;
                    Ok(Activation::CastStarted)
                } else {
                    Ok(Activation::Rejected(RejectReason::InsufficientCost))
                }
            }
            CastType::Channeled => {
                if self.check_costs(attrs)? {
                    self.is_channeled = true;
                    self.current_cast_time = 0.0;
                    self.current_interval_time = 0.0;
                    Ok(Activation::ChannelStarted)
                } else {
                    Ok(Activation::Rejected(RejectReason::InsufficientCost))
                }
            }
        }
    }

    /// Input release: ends a charge or channel early. Always accepted
    /// immediately; there is no grace period.
    pub fn input_released(
        &mut self,
        attrs: &mut AttributeSet,
    ) -> Result<ReleaseOutcome, AttributeError> {
        match self.cast_type {
            CastType::Channeled if self.is_channeled => {
                self.end_channel();
                Ok(ReleaseOutcome::ChannelEnded)
            }
            CastType::CastedCharged if self.is_charged => {
                let charge = self.charge_fraction();
                self.is_charged = false;
                if self.settle_costs(attrs)? {
                    self.start_cooldown();
                    Ok(ReleaseOutcome::ChargedFired { charge })
                } else {
                    Ok(ReleaseOutcome::ChargeCancelled)
                }
            }
            CastType::CastedCharged if self.is_casted => {
                self.is_casted = false;
                Ok(ReleaseOutcome::CastCancelled)
            }
            _ => Ok(ReleaseOutcome::Ignored),
        }
    }

    /// Per-frame tick, the sole driver of every timer. A no-op when the
    /// ability is idle and off cooldown.
    pub fn tick(
        &mut self,
        dt: f32,
        attrs: &mut AttributeSet,
    ) -> Result<SmallVec<[TickEvent; 2]>, AttributeError> {
        let mut events = SmallVec::new();

        if self.is_casted {
            self.current_cast_time += dt;
            // Reaching max cast time is completion, not failure.
            if self.current_cast_time >= self.max_cast_time {
                self.is_casted = false;
                if self.cast_type == CastType::CastedCharged {
                    self.is_charged = true;
                    self.current_charge_time = 0.0;
                    events.push(TickEvent::ChargeStarted);
                } else {
                    match self.settle_costs(attrs)? {
                        true => {
                            self.start_cooldown();
                            events.push(TickEvent::CastCompleted);
                        }
                        false => events.push(TickEvent::CastRejected),
                    }
                }
            }
        } else if self.is_charged {
            if self.current_charge_time < self.max_overcast_time {
                self.current_charge_time += dt;
                if self.current_charge_time >= self.max_overcast_time {
                    self.current_charge_time = self.max_overcast_time;
                    events.push(TickEvent::FullyCharged);
                }
            }
        } else if self.is_channeled {
            self.current_cast_time += dt;
            if self.channel_interval > 0.0 {
                self.current_interval_time += dt;
                if self.current_interval_time >= self.channel_interval {
                    self.current_interval_time -= self.channel_interval;
                    match self.settle_costs(attrs) {
                        Ok(true) => events.push(TickEvent::ChannelPulse),
                        Ok(false) => {
                            self.end_channel();
                            events.push(TickEvent::ChannelEnded);
                            return Ok(events);
                        }
                        Err(err) => {
                            self.end_channel();
                            return Err(err);
                        }
                    }
                }
            }
            if self.is_channeled && self.current_cast_time >= self.max_cast_time {
                self.end_channel();
                events.push(TickEvent::ChannelEnded);
            }
        }

        if self.is_on_cooldown {
            self.current_cooldown_time += dt;
            if self.current_cooldown_time >= self.cooldown {
                self.is_on_cooldown = false;
                events.push(TickEvent::CooldownFinished);
            }
        }

        Ok(events)
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Spawn the ability's configured effect as a pending application.
fn queue_triggered_effect(
    commands: &mut Commands,
    ability: &Ability,
    owner: &AbilityOwner,
    target: Option<&AbilityTarget>,
    charge: Option<f32>,
) {
    let Some(effect) = ability.triggers.clone() else {
        return;
    };
    let target_entity = target.map(|t| t.target).unwrap_or(owner.owner);
    commands.spawn(EffectPending {
        target: target_entity,
        causer: owner.owner,
        effect,
        charge,
    });
}

/// One-time initialization for freshly equipped abilities.
pub fn initialize_abilities(
    mut abilities: Query<(&mut Ability, &AbilityOwner), Added<Ability>>,
    mut initialized: EventWriter<AbilityInitialized>,
    mut log: ResMut<EngineLog>,
) {
    for (mut ability, owner) in abilities.iter_mut() {
        if ability.initialize() {
            initialized.send(AbilityInitialized {
                owner: owner.owner,
                ability_name: ability.name.clone(),
            });
            log.log(
                EngineLogEventType::AbilityInitialized,
                format!("Ability '{}' initialized", ability.name),
            );
        }
    }
}

/// Route input press/release events to the targeted ability's state machine
/// and translate the outcomes into notifications and pending effects.
pub fn handle_ability_input(
    mut commands: Commands,
    mut pressed: EventReader<AbilityInputPressed>,
    mut released: EventReader<AbilityInputReleased>,
    mut abilities: Query<(&mut Ability, &AbilityOwner, Option<&AbilityTarget>)>,
    mut owners: Query<&mut AttributeSet>,
    mut started: EventWriter<AbilityStarted>,
    mut stopped: EventWriter<AbilityStopped>,
    mut log: ResMut<EngineLog>,
) {
    for event in pressed.read() {
        let Ok((mut ability, owner, target)) = abilities.get_mut(event.ability) else {
            continue;
        };
        let Ok(mut attrs) = owners.get_mut(owner.owner) else {
            continue;
        };

        match ability.input_pressed(&mut attrs) {
            Ok(Activation::Fired) => {
                started.send(AbilityStarted {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                log.log(
                    EngineLogEventType::AbilityStarted,
                    format!("Ability '{}' fired", ability.name),
                );
                queue_triggered_effect(&mut commands, &ability, owner, target, None);
            }
            Ok(Activation::CastStarted) => {
                log.log(
                    EngineLogEventType::AbilityStarted,
                    format!("Ability '{}' begins casting", ability.name),
                );
            }
            Ok(Activation::ChannelStarted) => {
                started.send(AbilityStarted {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                log.log(
                    EngineLogEventType::AbilityStarted,
                    format!("Ability '{}' begins channeling", ability.name),
                );
            }
            Ok(Activation::Rejected(reason)) => {
                log.log(
                    EngineLogEventType::AbilityRejected,
                    format!("Ability '{}' rejected: {:?}", ability.name, reason),
                );
            }
            Err(err) => {
                // A cost names an attribute the owner doesn't have.
                warn!("ability '{}' cost check failed: {}", ability.name, err);
            }
        }
    }

    for event in released.read() {
        let Ok((mut ability, owner, target)) = abilities.get_mut(event.ability) else {
            continue;
        };
        let Ok(mut attrs) = owners.get_mut(owner.owner) else {
            continue;
        };

        match ability.input_released(&mut attrs) {
            Ok(ReleaseOutcome::ChargedFired { charge }) => {
                stopped.send(AbilityStopped {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                started.send(AbilityStarted {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                log.log(
                    EngineLogEventType::AbilityStarted,
                    format!(
                        "Ability '{}' fired at {:.0}% charge",
                        ability.name,
                        charge * 100.0
                    ),
                );
                queue_triggered_effect(&mut commands, &ability, owner, target, Some(charge));
            }
            Ok(ReleaseOutcome::ChannelEnded) => {
                stopped.send(AbilityStopped {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                log.log(
                    EngineLogEventType::AbilityStopped,
                    format!("Ability '{}' channel released", ability.name),
                );
            }
            Ok(ReleaseOutcome::CastCancelled) | Ok(ReleaseOutcome::ChargeCancelled) => {
                stopped.send(AbilityStopped {
                    owner: owner.owner,
                    ability_name: ability.name.clone(),
                });
                log.log(
                    EngineLogEventType::AbilityStopped,
                    format!("Ability '{}' cancelled", ability.name),
                );
            }
            Ok(ReleaseOutcome::Ignored) => {}
            Err(err) => {
                warn!("ability '{}' cost check failed: {}", ability.name, err);
            }
        }
    }
}

/// Per-frame tick for every equipped ability with an active timer.
pub fn tick_abilities(
    time: Res<Time>,
    mut commands: Commands,
    mut abilities: Query<(&mut Ability, &AbilityOwner, Option<&AbilityTarget>)>,
    mut owners: Query<&mut AttributeSet>,
    mut started: EventWriter<AbilityStarted>,
    mut stopped: EventWriter<AbilityStopped>,
    mut log: ResMut<EngineLog>,
) {
    let dt = time.delta_secs();

    for (mut ability, owner, target) in abilities.iter_mut() {
        if ability.state() == AbilityState::Idle {
            continue;
        }
        let Ok(mut attrs) = owners.get_mut(owner.owner) else {
            continue;
        };

        let events = match ability.tick(dt, &mut attrs) {
            Ok(events) => events,
            Err(err) => {
                warn!("ability '{}' tick failed: {}", ability.name, err);
                continue;
            }
        };

        for tick_event in events {
            match tick_event {
                TickEvent::CastCompleted => {
                    started.send(AbilityStarted {
                        owner: owner.owner,
                        ability_name: ability.name.clone(),
                    });
                    log.log(
                        EngineLogEventType::AbilityStarted,
                        format!("Ability '{}' cast completed", ability.name),
                    );
                    queue_triggered_effect(&mut commands, &ability, owner, target, None);
                }
                TickEvent::CastRejected => {
                    stopped.send(AbilityStopped {
                        owner: owner.owner,
                        ability_name: ability.name.clone(),
                    });
                    log.log(
                        EngineLogEventType::AbilityRejected,
                        format!("Ability '{}' cost unmet at completion", ability.name),
                    );
                }
                TickEvent::ChargeStarted => {
                    log.log(
                        EngineLogEventType::AbilityStarted,
                        format!("Ability '{}' fully cast, charging", ability.name),
                    );
                }
                TickEvent::FullyCharged => {
                    log.log(
                        EngineLogEventType::AbilityStarted,
                        format!("Ability '{}' at full charge", ability.name),
                    );
                }
                TickEvent::ChannelPulse => {
                    log.log(
                        EngineLogEventType::AbilityStarted,
                        format!("Ability '{}' channel pulse", ability.name),
                    );
                    queue_triggered_effect(&mut commands, &ability, owner, target, None);
                }
                TickEvent::ChannelEnded => {
                    stopped.send(AbilityStopped {
                        owner: owner.owner,
                        ability_name: ability.name.clone(),
                    });
                    log.log(
                        EngineLogEventType::AbilityStopped,
                        format!("Ability '{}' channel ended", ability.name),
                    );
                }
                TickEvent::CooldownFinished => {
                    log.log(
                        EngineLogEventType::ScenarioEvent,
                        format!("Ability '{}' ready", ability.name),
                    );
                }
            }
        }
    }
}
