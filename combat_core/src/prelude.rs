//! Prelude module for convenient imports
//!
//! ```rust
//! use combat_core::prelude::*;
//! ```

// Core types
pub use crate::types::{CombatantId, DamageType, EffectId, ResourceKind, StatTag};
pub use crate::error::{CombatError, Shortfall};

// Dice
pub use crate::dice::{DiceExpression, DieRoller, ResolvedRoll, RngRoller, ScriptedRoller};

// Modifiers
pub use crate::modifier::{ModifierKind, RollModifierEffect};

// Combat
pub use crate::combat::{AttackMode, AttackParameters, AttackResult, TargetOutcome};

// Moves
pub use crate::moves::{AttackTemplate, MoveCatalog, MoveDefinition, MoveEffect, MovePhase, PhaseEvent, PhaseEventKind};

// Initiative
pub use crate::initiative::{InitiativeState, TurnAdvance};

// Session and store
pub use crate::session::CombatSession;
pub use crate::store::{CombatantRecord, CombatantStore, InMemoryStore};

// Config
pub use crate::config::{default_moves, CombatConstants};
