//! DiceExpression - Parsed, immutable dice formula

use crate::types::StatTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::parser::{parse, ParseError};

/// A single additive component of a formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    /// `NdM`: roll `count` dice with `sides` faces
    Dice { count: u32, sides: u32 },
    /// Constant value
    Flat { value: i32 },
    /// Modifier looked up from the roll context
    Stat { stat: StatTag },
    /// Identifier that names no known stat; contributes 0
    UnknownStat { name: String },
}

/// A term together with the sign it was written with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTerm {
    pub negative: bool,
    pub term: Term,
}

impl SignedTerm {
    pub fn plus(term: Term) -> Self {
        SignedTerm { negative: false, term }
    }

    pub fn minus(term: Term) -> Self {
        SignedTerm { negative: true, term }
    }

    pub fn sign(&self) -> i32 {
        if self.negative {
            -1
        } else {
            1
        }
    }
}

/// Parsed dice formula
///
/// Built by [`parse`](super::parse) and never mutated afterwards; the
/// `with_*` helpers return augmented copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    /// Additive terms in written order
    pub terms: Vec<SignedTerm>,
    /// Net advantage level: positive for advantage, negative for disadvantage
    #[serde(default)]
    pub advantage: i32,
    /// Number of independent strikes requested by `multihit k`
    #[serde(default)]
    pub multihit: Option<u32>,
}

impl DiceExpression {
    /// Expression with the given terms and no qualifiers
    pub fn from_terms(terms: Vec<SignedTerm>) -> Self {
        DiceExpression {
            terms,
            advantage: 0,
            multihit: None,
        }
    }

    /// Copy with an extra flat term; a zero bonus leaves the terms unchanged
    pub fn with_flat_bonus(&self, bonus: i32) -> Self {
        let mut expr = self.clone();
        if bonus != 0 {
            let term = Term::Flat {
                value: bonus.saturating_abs(),
            };
            expr.terms.push(SignedTerm {
                negative: bonus < 0,
                term,
            });
        }
        expr
    }

    /// Copy with the advantage level shifted by `delta`
    pub fn with_advantage(&self, delta: i32) -> Self {
        let mut expr = self.clone();
        expr.advantage = expr.advantage.saturating_add(delta);
        expr
    }

    /// Index of the term advantage and crits are judged on
    pub fn primary_dice_index(&self) -> Option<usize> {
        self.terms
            .iter()
            .position(|t| matches!(t.term, Term::Dice { .. }))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Dice { count, sides } => write!(f, "{}d{}", count, sides),
            Term::Flat { value } => write!(f, "{}", value),
            Term::Stat { stat } => write!(f, "{}", stat),
            Term::UnknownStat { name } => f.write_str(name),
        }
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            match (i, term.negative) {
                (0, false) => {}
                (0, true) => f.write_str("-")?,
                (_, false) => f.write_str("+")?,
                (_, true) => f.write_str("-")?,
            }
            write!(f, "{}", term.term)?;
        }

        match self.advantage {
            0 => {}
            1 => f.write_str(" advantage")?,
            -1 => f.write_str(" disadvantage")?,
            n if n > 0 => write!(f, " advantage {}", n)?,
            n => write!(f, " disadvantage {}", -n)?,
        }

        if let Some(k) = self.multihit {
            write!(f, " multihit {}", k)?;
        }

        Ok(())
    }
}

impl FromStr for DiceExpression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
