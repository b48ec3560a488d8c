//! Roll modifier stack
//!
//! Each combatant carries an ordered list of bonuses and advantage sources.
//! Resolving a roll folds them into the expression as a flat term and an
//! advantage level, then drops the next-roll-only entries.

mod effect;
mod stack;

pub use effect::{ModifierKind, ModifierScope, RollModifierEffect};
pub use stack::{AugmentedRoll, ModifierStack};
