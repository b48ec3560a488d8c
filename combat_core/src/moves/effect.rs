//! MoveEffect - Live activation of a move and its phase state machine
//!
//! Phases only move forward: Casting -> Active -> Cooldown -> Expired.
//! Cooldown is skipped when it is zero, and cancellation jumps straight to
//! Expired. Expired is terminal.

use super::definition::{AttackTemplate, MoveCost, MoveDefinition, RollTiming};
use crate::combat::TargetOutcome;
use crate::error::CombatError;
use crate::types::{CombatantId, EffectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePhase {
    Casting,
    Active,
    Cooldown,
    Expired,
}

impl MovePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MovePhase::Expired)
    }
}

impl fmt::Display for MovePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MovePhase::Casting => "casting",
            MovePhase::Active => "active",
            MovePhase::Cooldown => "cooling down",
            MovePhase::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// What happened to an effect at a turn boundary
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEventKind {
    /// Phase change; `from` is `None` for the initial phase
    Entered {
        from: Option<MovePhase>,
        to: MovePhase,
    },
    /// The primary roll fired; `result` is filled in by the session
    Triggered {
        result: Option<Result<Vec<TargetOutcome>, CombatError>>,
    },
    Cancelled {
        from: MovePhase,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEvent {
    pub effect_id: EffectId,
    pub move_id: String,
    pub owner: CombatantId,
    pub round: u32,
    pub kind: PhaseEventKind,
}

impl PhaseEvent {
    pub fn is_trigger(&self) -> bool {
        matches!(self.kind, PhaseEventKind::Triggered { .. })
    }
}

/// A move in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEffect {
    pub id: EffectId,
    pub move_id: String,
    pub owner: CombatantId,
    pub targets: Vec<CombatantId>,

    // === Lifecycle ===
    pub phase: MovePhase,
    pub rounds_remaining_in_phase: u32,
    pub roll_timing: RollTiming,
    pub duration: u32,
    pub cooldown: u32,
    /// Last round whose turn start was handled, activation round included
    pub last_processed_round: u32,

    // === Payload ===
    /// Cost paid at activation; never refunded
    pub reserved_cost: MoveCost,
    pub attack: Option<AttackTemplate>,
}

impl MoveEffect {
    /// Create the effect in its initial phase
    ///
    /// A zero cast time starts the move `Active` and emits the entry trigger.
    pub fn activate(
        id: EffectId,
        definition: &MoveDefinition,
        owner: CombatantId,
        targets: Vec<CombatantId>,
        round: u32,
    ) -> (MoveEffect, Vec<PhaseEvent>) {
        let mut effect = MoveEffect {
            id,
            move_id: definition.id.clone(),
            owner,
            targets,
            phase: MovePhase::Casting,
            rounds_remaining_in_phase: definition.cast_time,
            roll_timing: definition.roll_timing,
            duration: definition.duration,
            cooldown: definition.cooldown,
            last_processed_round: round,
            reserved_cost: definition.cost,
            attack: definition.attack.clone(),
        };

        let mut events = Vec::new();
        if definition.cast_time == 0 {
            effect.enter(None, MovePhase::Active, round, &mut events);
        } else {
            events.push(effect.event(
                round,
                PhaseEventKind::Entered {
                    from: None,
                    to: MovePhase::Casting,
                },
            ));
        }

        (effect, events)
    }

    /// Handle the owner's turn start
    ///
    /// A round that was already handled is a no-op.
    pub fn on_turn_start(&mut self, round: u32) -> Result<Vec<PhaseEvent>, CombatError> {
        if self.phase.is_terminal() {
            return Err(self.transition_error("advance"));
        }
        if round <= self.last_processed_round {
            debug!(effect = %self.id, round, "turn start already processed");
            return Ok(Vec::new());
        }

        self.last_processed_round = round;
        self.rounds_remaining_in_phase = self.rounds_remaining_in_phase.saturating_sub(1);
        let elapsed = self.rounds_remaining_in_phase == 0;

        let mut events = Vec::new();
        match self.phase {
            MovePhase::Casting if elapsed => {
                self.enter(Some(MovePhase::Casting), MovePhase::Active, round, &mut events);
            }
            MovePhase::Active if elapsed => {
                let next = if self.cooldown > 0 {
                    MovePhase::Cooldown
                } else {
                    MovePhase::Expired
                };
                self.enter(Some(MovePhase::Active), next, round, &mut events);
            }
            MovePhase::Active if self.roll_timing == RollTiming::PerTurn => {
                events.push(self.event(round, PhaseEventKind::Triggered { result: None }));
            }
            MovePhase::Cooldown if elapsed => {
                self.enter(Some(MovePhase::Cooldown), MovePhase::Expired, round, &mut events);
            }
            _ => {}
        }

        Ok(events)
    }

    /// Force the effect to `Expired`; the paid cost is kept
    pub fn cancel(&mut self, round: u32) -> Result<PhaseEvent, CombatError> {
        if self.phase.is_terminal() {
            return Err(self.transition_error("cancel"));
        }

        let from = self.phase;
        self.phase = MovePhase::Expired;
        self.rounds_remaining_in_phase = 0;
        debug!(effect = %self.id, move_id = %self.move_id, from = %from, "move cancelled");

        Ok(self.event(round, PhaseEventKind::Cancelled { from }))
    }

    pub fn is_expired(&self) -> bool {
        self.phase.is_terminal()
    }

    pub(crate) fn transition_error(&self, attempted: &str) -> CombatError {
        CombatError::StateTransition {
            effect: self.id,
            move_id: self.move_id.clone(),
            phase: self.phase,
            attempted: attempted.to_string(),
        }
    }

    fn enter(&mut self, from: Option<MovePhase>, to: MovePhase, round: u32, events: &mut Vec<PhaseEvent>) {
        self.phase = to;
        self.rounds_remaining_in_phase = match to {
            MovePhase::Casting => self.rounds_remaining_in_phase,
            MovePhase::Active => self.duration.max(1),
            MovePhase::Cooldown => self.cooldown,
            MovePhase::Expired => 0,
        };

        debug!(effect = %self.id, move_id = %self.move_id, to = %to, round, "move phase entered");
        events.push(self.event(round, PhaseEventKind::Entered { from, to }));

        if to == MovePhase::Active {
            events.push(self.event(round, PhaseEventKind::Triggered { result: None }));
        }
    }

    fn event(&self, round: u32, kind: PhaseEventKind) -> PhaseEvent {
        PhaseEvent {
            effect_id: self.id,
            move_id: self.move_id.clone(),
            owner: self.owner.clone(),
            round,
            kind,
        }
    }
}
