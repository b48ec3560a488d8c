//! Initiative tracker - turn order, turn pointer and round counter
//!
//! Round 0 means combat has not started; the first `advance` enters round 1
//! at the top of the order.

use crate::dice::{evaluate, DiceExpression, DieRoller, ResolvedRoll, SignedTerm, Term};
use crate::store::{CombatantStore, StatContext};
use crate::types::{CombatantId, StatTag};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who acts next, and whether a new round started getting there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAdvance {
    pub actor: CombatantId,
    pub round_incremented: bool,
    pub round: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeState {
    pub order: Vec<CombatantId>,
    pub current_index: usize,
    pub round_number: u32,
    /// Next advance lands on `current_index` itself instead of the entry after it
    #[serde(default)]
    pub resume_at_current: bool,
}

impl InitiativeState {
    /// Unstarted combat with a fixed order
    pub fn new(order: Vec<CombatantId>) -> Self {
        InitiativeState {
            order,
            current_index: 0,
            round_number: 0,
            resume_at_current: false,
        }
    }

    /// Combatant whose turn it currently is
    pub fn current(&self) -> Option<&CombatantId> {
        if self.round_number == 0 || self.resume_at_current {
            return None;
        }
        self.order.get(self.current_index)
    }

    pub fn contains(&self, combatant: &CombatantId) -> bool {
        self.order.contains(combatant)
    }

    /// Move to the next combatant for which `eligible` holds
    ///
    /// Wrapping past the end increments the round. Returns `None`, leaving
    /// the state untouched, when nobody is eligible.
    pub fn advance(&mut self, eligible: impl Fn(&CombatantId) -> bool) -> Option<TurnAdvance> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }

        let mut round = self.round_number;
        let mut round_incremented = false;
        let mut index = if round == 0 {
            round = 1;
            round_incremented = true;
            0
        } else if self.resume_at_current {
            self.current_index
        } else {
            self.current_index + 1
        };

        for _ in 0..len {
            if index >= len {
                index = 0;
                round += 1;
                round_incremented = true;
            }
            if eligible(&self.order[index]) {
                self.current_index = index;
                self.round_number = round;
                self.resume_at_current = false;

                if round_incremented {
                    debug!(round, "new round");
                }
                return Some(TurnAdvance {
                    actor: self.order[index].clone(),
                    round_incremented,
                    round,
                });
            }
            index += 1;
        }

        None
    }

    /// Insert at `position` (clamped to the end), keeping the current actor
    ///
    /// Returns `false` if the combatant is already in the order.
    pub fn insert(&mut self, combatant: CombatantId, position: usize) -> bool {
        if self.contains(&combatant) {
            return false;
        }

        let position = position.min(self.order.len());
        self.order.insert(position, combatant);

        if self.round_number > 0 && position <= self.current_index && self.order.len() > 1 {
            self.current_index += 1;
        }
        true
    }

    /// Remove a combatant, keeping the pointer on the same logical next actor
    ///
    /// Returns `false` if the combatant was not in the order.
    pub fn remove(&mut self, combatant: &CombatantId) -> bool {
        let Some(index) = self.order.iter().position(|c| c == combatant) else {
            return false;
        };
        self.order.remove(index);

        if self.round_number == 0 {
            return true;
        }

        if index < self.current_index {
            self.current_index -= 1;
        } else if index == self.current_index && !self.resume_at_current {
            if self.current_index > 0 {
                self.current_index -= 1;
            } else {
                self.resume_at_current = true;
            }
        }

        if self.order.is_empty() {
            self.current_index = 0;
        }
        true
    }
}

/// One combatant's initiative roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub combatant: CombatantId,
    pub roll: ResolvedRoll,
    pub dexterity_modifier: i32,
}

/// Roll 1d20 + dex for everyone and order highest first
///
/// Ties go to the higher dexterity modifier, then to input order.
pub fn roll_initiative<S: CombatantStore + ?Sized>(
    combatants: &[CombatantId],
    store: &S,
    roller: &mut impl DieRoller,
) -> (InitiativeState, Vec<InitiativeRoll>) {
    let expr = DiceExpression::from_terms(vec![
        SignedTerm::plus(Term::Dice { count: 1, sides: 20 }),
        SignedTerm::plus(Term::Stat {
            stat: StatTag::Dexterity,
        }),
    ]);

    let mut rolls: Vec<InitiativeRoll> = combatants
        .iter()
        .map(|combatant| {
            let roll = evaluate(&expr, &StatContext::new(store, combatant), roller);
            let dexterity_modifier = store
                .get_stat(combatant, StatTag::Dexterity)
                .map(|score| StatTag::Dexterity.modifier(score))
                .unwrap_or(0);
            InitiativeRoll {
                combatant: combatant.clone(),
                roll,
                dexterity_modifier,
            }
        })
        .collect();

    rolls.sort_by(|a, b| {
        b.roll
            .total
            .cmp(&a.roll.total)
            .then(b.dexterity_modifier.cmp(&a.dexterity_modifier))
    });

    let order = rolls.iter().map(|r| r.combatant.clone()).collect();
    (InitiativeState::new(order), rolls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedRoller;
    use crate::store::{CombatantRecord, InMemoryStore};

    fn ids(names: &[&str]) -> Vec<CombatantId> {
        names.iter().map(|n| CombatantId::new(*n)).collect()
    }

    fn started(names: &[&str]) -> InitiativeState {
        let mut state = InitiativeState::new(ids(names));
        state.advance(|_| true);
        state
    }

    #[test]
    fn test_first_advance_starts_round_one() {
        let mut state = InitiativeState::new(ids(&["a", "b"]));
        assert_eq!(state.current(), None);

        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("a"));
        assert!(turn.round_incremented);
        assert_eq!(turn.round, 1);
    }

    #[test]
    fn test_wrap_increments_round() {
        let mut state = started(&["a", "b"]);

        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("b"));
        assert!(!turn.round_incremented);

        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("a"));
        assert!(turn.round_incremented);
        assert_eq!(state.round_number, 2);
    }

    #[test]
    fn test_skips_ineligible() {
        let mut state = started(&["a", "b", "c"]);
        let down = CombatantId::new("b");

        let turn = state.advance(|c| c != &down).unwrap();
        assert_eq!(turn.actor, CombatantId::new("c"));
    }

    #[test]
    fn test_nobody_eligible_leaves_state() {
        let mut state = started(&["a", "b"]);
        let before = state.clone();

        assert!(state.advance(|_| false).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_before_current() {
        let mut state = started(&["a", "b", "c"]);
        state.advance(|_| true);
        assert_eq!(state.current(), Some(&CombatantId::new("b")));

        state.remove(&CombatantId::new("a"));
        assert_eq!(state.current(), Some(&CombatantId::new("b")));
        assert_eq!(state.advance(|_| true).unwrap().actor, CombatantId::new("c"));
    }

    #[test]
    fn test_remove_current_moves_to_next() {
        let mut state = started(&["a", "b", "c"]);
        state.advance(|_| true);

        state.remove(&CombatantId::new("b"));
        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("c"));
        assert!(!turn.round_incremented);
    }

    #[test]
    fn test_remove_current_at_top() {
        let mut state = started(&["a", "b", "c"]);

        state.remove(&CombatantId::new("a"));
        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("b"));
        assert!(!turn.round_incremented);
    }

    #[test]
    fn test_remove_current_at_end_wraps() {
        let mut state = started(&["a", "b"]);
        state.advance(|_| true);

        state.remove(&CombatantId::new("b"));
        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("a"));
        assert!(turn.round_incremented);
    }

    #[test]
    fn test_insert_before_current_keeps_actor() {
        let mut state = started(&["a", "b"]);
        state.advance(|_| true);

        assert!(state.insert(CombatantId::new("z"), 0));
        assert_eq!(state.current(), Some(&CombatantId::new("b")));
        assert!(!state.insert(CombatantId::new("z"), 1));

        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("z"));
        assert!(turn.round_incremented);
    }

    #[test]
    fn test_insert_after_current_acts_this_round() {
        let mut state = started(&["a", "b"]);
        state.insert(CombatantId::new("z"), 1);

        let turn = state.advance(|_| true).unwrap();
        assert_eq!(turn.actor, CombatantId::new("z"));
    }

    #[test]
    fn test_roll_initiative_orders_and_breaks_ties() {
        let store = InMemoryStore::with_records([
            CombatantRecord::new("slow", 10, 10).with_stat(StatTag::Dexterity, 8),
            CombatantRecord::new("quick", 10, 10).with_stat(StatTag::Dexterity, 16),
            CombatantRecord::new("mid", 10, 10),
        ]);
        // slow: 15 - 1 = 14, quick: 11 + 3 = 14, mid: 18
        let mut roller = ScriptedRoller::new([15, 11, 18]);

        let (state, rolls) = roll_initiative(&ids(&["slow", "quick", "mid"]), &store, &mut roller);

        assert_eq!(state.order, ids(&["mid", "quick", "slow"]));
        assert_eq!(state.round_number, 0);
        assert_eq!(rolls[0].roll.total, 18);
    }
}
