//! Move lifecycle - activated abilities with cast, active and cooldown phases

mod definition;
mod effect;

pub use definition::{spell_save_dc, AttackTemplate, MoveCost, MoveDefinition, RollTiming};
pub use effect::{MoveEffect, MovePhase, PhaseEvent, PhaseEventKind};

use crate::error::CombatError;
use std::collections::HashMap;

/// Move definitions by id
#[derive(Debug, Clone, Default)]
pub struct MoveCatalog {
    moves: HashMap<String, MoveDefinition>,
}

impl MoveCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        MoveCatalog {
            moves: HashMap::new(),
        }
    }

    /// Register a move, replacing any with the same id
    pub fn register(&mut self, definition: MoveDefinition) {
        self.moves.insert(definition.id.clone(), definition);
    }

    /// Get a move definition by id
    pub fn get(&self, id: &str) -> Option<&MoveDefinition> {
        self.moves.get(id)
    }

    /// Get a move definition, failing on an unknown id
    pub fn require(&self, id: &str) -> Result<&MoveDefinition, CombatError> {
        self.moves
            .get(id)
            .ok_or_else(|| CombatError::UnknownMove(id.to_string()))
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.moves.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
