//! Engine events
//!
//! The engine's boundary with input and presentation collaborators. Inbound
//! events drive the ability state machines; outbound events notify whoever is
//! listening (animation, audio, logging) at the points where ability and
//! effect state changes.

use bevy::prelude::*;

// ============================================================================
// Inbound events (from the input-handling collaborator)
// ============================================================================

/// The input bound to an ability was pressed.
#[derive(Event)]
pub struct AbilityInputPressed {
    /// The equipped ability entity
    pub ability: Entity,
}

/// The input bound to an ability was released.
///
/// Ends a charge or channel early; ignored for abilities that are not in a
/// release-sensitive phase.
#[derive(Event)]
pub struct AbilityInputReleased {
    /// The equipped ability entity
    pub ability: Entity,
}

// ============================================================================
// Outbound notifications (to presentation collaborators)
// ============================================================================

/// An ability finished its one-time initialization and is ready for use.
#[derive(Event)]
pub struct AbilityInitialized {
    /// Entity that owns the ability
    pub owner: Entity,
    /// Display name of the ability
    pub ability_name: String,
}

/// An ability activation fired (cost debited, effect triggered if configured).
#[derive(Event)]
pub struct AbilityStarted {
    /// Entity that owns the ability
    pub owner: Entity,
    /// Display name of the ability
    pub ability_name: String,
}

/// A casting, charging or channeling phase ended, whether by completion,
/// release or rejection.
#[derive(Event)]
pub struct AbilityStopped {
    /// Entity that owns the ability
    pub owner: Entity,
    /// Display name of the ability
    pub ability_name: String,
}

/// An effect was handed to a target's effect collection. Fires on every
/// application attempt, including instant effects and effects whose
/// initialization was rejected.
#[derive(Event)]
pub struct EffectReceived {
    /// Entity the effect was applied to
    pub target: Entity,
    /// Display name of the effect
    pub effect_name: String,
}
