//! ModifierStack - One combatant's active roll modifiers

use super::effect::{ModifierScope, RollModifierEffect};
use crate::dice::DiceExpression;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of merging the stack into a base expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedRoll {
    pub expression: DiceExpression,
    /// Net flat bonus added
    pub bonus: i32,
    /// Net advantage level contributed by the stack
    pub advantage: i32,
    /// Next-roll-only effects removed by this resolution
    pub consumed: Vec<RollModifierEffect>,
}

/// Ordered active modifiers for a single combatant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierStack {
    effects: Vec<RollModifierEffect>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, effect: RollModifierEffect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[RollModifierEffect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Sum of all bonus values
    pub fn net_bonus(&self) -> i32 {
        self.effects
            .iter()
            .fold(0i32, |acc, e| acc.saturating_add(e.bonus_value()))
    }

    /// Advantage effects minus disadvantage effects
    pub fn net_advantage(&self) -> i32 {
        self.effects
            .iter()
            .fold(0i32, |acc, e| acc.saturating_add(e.advantage_value()))
    }

    /// Merge the stack into `base` and consume every next-roll-only effect
    ///
    /// Consumption is unconditional: a next-roll-only disadvantage is removed
    /// even when advantage wins the net calculation.
    pub fn resolve(&mut self, base: &DiceExpression) -> AugmentedRoll {
        let bonus = self.net_bonus();
        let advantage = self.net_advantage();
        let expression = base.with_flat_bonus(bonus).with_advantage(advantage);

        let (consumed, kept): (Vec<_>, Vec<_>) = self
            .effects
            .drain(..)
            .partition(RollModifierEffect::is_next_roll_only);
        self.effects = kept;

        if !consumed.is_empty() {
            debug!(consumed = consumed.len(), "next-roll-only modifiers consumed");
        }

        AugmentedRoll {
            expression,
            bonus,
            advantage,
            consumed,
        }
    }

    /// Remove every effect granted by `source`, returning how many were removed
    pub fn clear_source(&mut self, source: &str) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| e.source != source);
        before - self.effects.len()
    }

    /// Count down timed persistent effects at the end of the owner's turn
    ///
    /// Returns the effects that ran out.
    pub fn tick_turn_end(&mut self) -> Vec<RollModifierEffect> {
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.effects.len());

        for mut effect in self.effects.drain(..) {
            match (effect.scope, effect.remaining_turns) {
                (ModifierScope::Persistent, Some(turns)) => {
                    let turns = turns.saturating_sub(1);
                    effect.remaining_turns = Some(turns);
                    if turns == 0 {
                        expired.push(effect);
                    } else {
                        kept.push(effect);
                    }
                }
                _ => kept.push(effect),
            }
        }

        self.effects = kept;
        expired
    }
}
