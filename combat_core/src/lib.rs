//! combat_core - Turn-based combat resolution library
//!
//! This library provides:
//! - Dice expressions: parsing and evaluating formulas like `1d20+str advantage`
//! - Roll modifiers: per-combatant bonus, advantage and disadvantage stacks
//! - Attack resolution: hits, criticals, saves, resistances and temp HP
//! - Moves: activated abilities with cast, active and cooldown phases
//! - Initiative: turn order with mid-combat insertion and removal
//!
//! All mutable engine state lives in a [`CombatSession`]; character data is
//! read and written through the [`CombatantStore`] trait.

pub mod combat;
pub mod config;
pub mod defense;
pub mod dice;
pub mod error;
pub mod initiative;
pub mod modifier;
pub mod moves;
pub mod prelude;
pub mod session;
pub mod store;
pub mod types;

// Re-export core types for convenience
pub use combat::{AttackMode, AttackParameters, AttackResult, DamageComponent, TargetOutcome};
pub use defense::{calculate_damage_applied, DamageApplied, DefenseProfile};
pub use dice::{parse, resolve_roll, DiceExpression, DieRoller, ParseError, ResolvedRoll, RngRoller, ScriptedRoller};
pub use error::{CombatError, CostKind, Shortfall};
pub use initiative::{InitiativeRoll, InitiativeState, TurnAdvance};
pub use modifier::{ModifierScope, ModifierStack, RollModifierEffect};
pub use moves::{MoveCatalog, MoveDefinition, MoveEffect, MovePhase, PhaseEvent, PhaseEventKind, RollTiming};
pub use session::{CombatSession, MoveActivation, SessionSnapshot};
pub use store::{CombatantRecord, CombatantStore, InMemoryStore, ResourcePool, StoreError};
pub use types::{CombatantId, DamageType, EffectId, ResourceKind, StatTag};
pub use config::{default_moves, CombatConstants};
