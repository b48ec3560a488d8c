//! Combatant store - the character/resource collaborator the engine consumes

mod memory;

pub use memory::{AbilityScores, CombatantRecord, InMemoryStore, RosterConfig, RosterEntry};

use crate::defense::DefenseProfile;
use crate::dice::RollContext;
use crate::types::{CombatantId, ResourceKind, StatTag};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current and maximum value of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: i32,
    pub max: i32,
}

/// Store-side failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown combatant {0}")]
    UnknownCombatant(CombatantId),
    #[error("{combatant} has no {kind} pool")]
    UnknownResource {
        combatant: CombatantId,
        kind: ResourceKind,
    },
    #[error("{combatant} has {available} {kind}, cannot remove {requested}")]
    Underflow {
        combatant: CombatantId,
        kind: ResourceKind,
        available: i32,
        requested: i32,
    },
}

/// External character/resource store
///
/// Methods take `&self`; implementations provide their own interior
/// locking so that every `mutate_resource` call is atomic.
pub trait CombatantStore {
    /// Raw stored value of a stat (ability score, or proficiency bonus)
    fn get_stat(&self, combatant: &CombatantId, stat: StatTag) -> Option<i32>;

    fn get_resource(&self, combatant: &CombatantId, kind: ResourceKind) -> Option<ResourcePool>;

    /// Add `delta` to a resource
    ///
    /// Fails without change if the result would drop below 0. Gains are
    /// clamped to the pool's maximum.
    fn mutate_resource(
        &self,
        combatant: &CombatantId,
        kind: ResourceKind,
        delta: i32,
    ) -> Result<ResourcePool, StoreError>;

    fn get_defense_profile(&self, combatant: &CombatantId) -> Option<DefenseProfile>;

    /// Whether the combatant may take a turn
    fn can_act(&self, combatant: &CombatantId) -> bool {
        self.get_resource(combatant, ResourceKind::Hp)
            .is_some_and(|hp| hp.current > 0)
    }
}

/// Roll context reading one combatant's stats from a store
pub struct StatContext<'a, S: ?Sized> {
    store: &'a S,
    combatant: &'a CombatantId,
}

impl<'a, S: CombatantStore + ?Sized> StatContext<'a, S> {
    pub fn new(store: &'a S, combatant: &'a CombatantId) -> Self {
        StatContext { store, combatant }
    }
}

impl<S: CombatantStore + ?Sized> RollContext for StatContext<'_, S> {
    fn get_modifier(&self, stat: StatTag) -> Option<i32> {
        self.store
            .get_stat(self.combatant, stat)
            .map(|value| stat.modifier(value))
    }
}
