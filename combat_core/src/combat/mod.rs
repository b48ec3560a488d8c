//! Attack resolution - Applying rolls and damage to targets

mod params;
mod resolution;
mod result;

pub use params::{AttackMode, AttackParameters, DamageFormula, DamageSpec};
pub use resolution::{process_attack, TargetOutcome};
pub use result::{AttackResult, DamageComponent, SaveOutcome, StrikeOutcome};
