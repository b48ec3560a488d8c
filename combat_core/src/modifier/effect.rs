//! RollModifierEffect - Transient bonus, advantage or disadvantage

use serde::{Deserialize, Serialize};

/// How long a modifier stays on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierScope {
    /// Stays until cleared (or its turn count runs out)
    Persistent,
    /// Consumed by the next resolution
    NextRollOnly,
}

/// What a modifier does to a roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierKind {
    Bonus { value: i32 },
    Advantage,
    Disadvantage,
}

/// A modifier attached to one combatant's rolls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollModifierEffect {
    /// What granted the modifier (spell, item, condition)
    pub source: String,
    pub scope: ModifierScope,
    pub kind: ModifierKind,
    /// Turns left for a timed persistent modifier
    #[serde(default)]
    pub remaining_turns: Option<u32>,
}

impl RollModifierEffect {
    pub fn new(source: impl Into<String>, kind: ModifierKind) -> Self {
        RollModifierEffect {
            source: source.into(),
            scope: ModifierScope::Persistent,
            kind,
            remaining_turns: None,
        }
    }

    pub fn bonus(source: impl Into<String>, value: i32) -> Self {
        Self::new(source, ModifierKind::Bonus { value })
    }

    pub fn advantage(source: impl Into<String>) -> Self {
        Self::new(source, ModifierKind::Advantage)
    }

    pub fn disadvantage(source: impl Into<String>) -> Self {
        Self::new(source, ModifierKind::Disadvantage)
    }

    /// Consume on the next resolution instead of persisting
    pub fn next_roll_only(mut self) -> Self {
        self.scope = ModifierScope::NextRollOnly;
        self
    }

    /// Expire after the owner's next `turns` turns
    pub fn for_turns(mut self, turns: u32) -> Self {
        self.remaining_turns = Some(turns);
        self
    }

    pub fn is_next_roll_only(&self) -> bool {
        self.scope == ModifierScope::NextRollOnly
    }

    /// Contribution to the flat bonus
    pub fn bonus_value(&self) -> i32 {
        match self.kind {
            ModifierKind::Bonus { value } => value,
            _ => 0,
        }
    }

    /// Contribution to the advantage level
    pub fn advantage_value(&self) -> i32 {
        match self.kind {
            ModifierKind::Advantage => 1,
            ModifierKind::Disadvantage => -1,
            ModifierKind::Bonus { .. } => 0,
        }
    }
}
