//! Dice expression evaluator
//!
//! Formulas such as `1d20+str advantage` or `2d6+dex multihit 2` are parsed
//! into a [`DiceExpression`] and evaluated into a [`ResolvedRoll`] with a
//! full breakdown.

mod evaluate;
mod expression;
mod parser;
mod roller;

pub use evaluate::{evaluate, resolve_roll, NoStats, ResolvedRoll, RollContext};
pub use expression::{DiceExpression, SignedTerm, Term};
pub use parser::{parse, parse_with_limits, ParseError, ParseErrorKind};
pub use roller::{DieRoller, RngRoller, ScriptedRoller};
