//! Engine-wide error taxonomy

use crate::dice::ParseError;
use crate::moves::MovePhase;
use crate::types::{CombatantId, EffectId, ResourceKind};
use std::fmt;
use thiserror::Error;

/// Errors returned by combat operations
///
/// Every operation that fails leaves session and store state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CombatError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{combatant} cannot pay for the move: {shortfall}")]
    InsufficientResources {
        combatant: CombatantId,
        shortfall: Shortfall,
    },

    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: CombatantId, reason: String },

    #[error("cannot {attempted} {move_id} ({effect}) while it is {phase}")]
    StateTransition {
        effect: EffectId,
        move_id: String,
        phase: MovePhase,
        attempted: String,
    },

    #[error("no move effect with id {0}")]
    UnknownEffect(EffectId),

    #[error("no move named '{0}'")]
    UnknownMove(String),
}

impl CombatError {
    pub fn invalid_target(target: &CombatantId, reason: impl Into<String>) -> Self {
        CombatError::InvalidTarget {
            target: target.clone(),
            reason: reason.into(),
        }
    }
}

/// What a move costs that the combatant could not cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    Resource(ResourceKind),
    Uses,
}

/// The unmet requirement of a failed activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub cost: CostKind,
    pub required: i32,
    pub available: i32,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cost {
            CostKind::Resource(kind) => write!(
                f,
                "requires {} {}, has {}",
                self.required, kind, self.available
            ),
            CostKind::Uses => write!(
                f,
                "requires {} use(s), {} remaining",
                self.required, self.available
            ),
        }
    }
}
