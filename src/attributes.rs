//! Attribute Store
//!
//! Each entity owns a set of named numeric attributes (Health, Mana, ...).
//! Abilities and effects never touch attribute values directly; every read and
//! write goes through [`AttributeSet`] so all mutation is observable at one seam.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from attribute access.
///
/// `NotFound` and `DivideByZero` are configuration bugs (a content file named
/// an attribute the entity doesn't have, or a zero divisor). They fail the
/// single operation and are surfaced loudly by the calling system; they never
/// crash the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("attribute '{0}' does not exist on this entity")]
    NotFound(String),
    #[error("divide by zero while modifying attribute '{0}'")]
    DivideByZero(String),
}

/// Operation applied by [`AttributeSet::modify`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AttributeOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Set,
}

/// A single attribute mutation, as configured on an effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeModifier {
    /// Name of the attribute to mutate (must exist on the target)
    pub attribute: String,
    /// Operation to apply
    pub op: AttributeOp,
    /// Operand value
    pub value: f32,
}

/// Per-entity collection of named numeric attributes.
///
/// The key set is fixed by the entity's content data at spawn time: `get`,
/// `set` and `modify` all fail on unknown names rather than silently creating
/// attributes, so typos in content files show up as errors instead of
/// phantom stats.
#[derive(Component, Debug, Clone, Default)]
pub struct AttributeSet {
    values: HashMap<String, f32>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from (name, value) pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Builder-style helper: add one attribute and return the store.
    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Read the current value of an attribute.
    pub fn get(&self, name: &str) -> Result<f32, AttributeError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))
    }

    /// Overwrite the stored value. No bounds clamping happens here; clamping
    /// is a policy decision left to the effect that performs the write.
    pub fn set(&mut self, name: &str, value: f32) -> Result<(), AttributeError> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AttributeError::NotFound(name.to_string())),
        }
    }

    /// Read-compute-write a single attribute. Returns the new value.
    ///
    /// `Divide` with a zero operand fails before any mutation. The two-phase
    /// read-then-write is not atomic against other writers in the same frame;
    /// the engine's single-threaded tick ordering is what keeps this safe.
    pub fn modify(
        &mut self,
        name: &str,
        value: f32,
        op: AttributeOp,
    ) -> Result<f32, AttributeError> {
        let current = self.get(name)?;
        let next = match op {
            AttributeOp::Add => current + value,
            AttributeOp::Subtract => current - value,
            AttributeOp::Multiply => current * value,
            AttributeOp::Divide => {
                if value == 0.0 {
                    return Err(AttributeError::DivideByZero(name.to_string()));
                }
                current / value
            }
            AttributeOp::Set => value,
        };
        self.set(name, next)?;
        Ok(next)
    }

    /// Apply a configured modifier. Convenience wrapper used by the effect
    /// engine.
    pub fn apply(&mut self, modifier: &AttributeModifier) -> Result<f32, AttributeError> {
        self.modify(&modifier.attribute, modifier.value, modifier.op)
    }

    /// Iterate over (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
