//! Expression evaluation against a stat context and a die source

use super::expression::{DiceExpression, Term};
use super::parser::{parse, ParseError};
use super::roller::DieRoller;
use crate::types::StatTag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Supplies stat modifiers while a roll is evaluated
pub trait RollContext {
    /// Modifier for `stat`, or `None` when the roller has no value for it
    fn get_modifier(&self, stat: StatTag) -> Option<i32>;
}

impl<C: RollContext + ?Sized> RollContext for &C {
    fn get_modifier(&self, stat: StatTag) -> Option<i32> {
        (**self).get_modifier(stat)
    }
}

impl RollContext for HashMap<StatTag, i32> {
    fn get_modifier(&self, stat: StatTag) -> Option<i32> {
        self.get(&stat).copied()
    }
}

/// Context for rolls that reference no stats
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl RollContext for NoStats {
    fn get_modifier(&self, _stat: StatTag) -> Option<i32> {
        None
    }
}

/// Outcome of evaluating one expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoll {
    /// Canonical text of the evaluated expression
    pub expression: String,

    // === Dice ===
    /// Every die rolled, in order, including discarded advantage sets
    pub raw_rolls: Vec<u32>,
    /// Dice that count toward the total
    pub kept_rolls: Vec<u32>,
    /// Highest kept face of the primary dice term
    pub natural: Option<u32>,
    /// Advantage level the primary term was rolled with
    pub advantage_level: i32,

    // === Totals ===
    /// Signed sum of kept dice
    pub dice_total: i32,
    /// Signed sum of flat and stat terms
    pub modifier_total: i32,
    pub total: i32,

    // === Reporting ===
    pub breakdown: String,
    /// Soft failures such as unknown stats
    pub warnings: Vec<String>,
    /// Individual strikes of a multihit roll (empty otherwise)
    pub hits: Vec<ResolvedRoll>,
}

impl ResolvedRoll {
    /// The independent strikes this roll represents
    pub fn strikes(&self) -> &[ResolvedRoll] {
        if self.hits.is_empty() {
            std::slice::from_ref(self)
        } else {
            &self.hits
        }
    }

    pub fn is_multihit(&self) -> bool {
        !self.hits.is_empty()
    }
}

/// Parse and evaluate a formula in one step
pub fn resolve_roll(
    text: &str,
    context: &impl RollContext,
    roller: &mut impl DieRoller,
) -> Result<ResolvedRoll, ParseError> {
    let expr = parse(text)?;
    Ok(evaluate(&expr, context, roller))
}

/// Evaluate a parsed expression
///
/// Advantage applies to the first dice term: that term is rolled
/// `|level| + 1` times and the set with the highest (advantage) or lowest
/// (disadvantage) sum is kept. `multihit k` evaluates the rest of the
/// expression `k` times and sums the strikes.
pub fn evaluate(
    expr: &DiceExpression,
    context: &impl RollContext,
    roller: &mut impl DieRoller,
) -> ResolvedRoll {
    let Some(count) = expr.multihit else {
        return evaluate_strike(expr, context, roller);
    };

    let strike = DiceExpression {
        multihit: None,
        ..expr.clone()
    };
    let hits: Vec<ResolvedRoll> = (0..count)
        .map(|_| evaluate_strike(&strike, context, roller))
        .collect();

    let total = saturating_sum(hits.iter().map(|h| h.total));
    let breakdown = format!(
        "{} = {}",
        hits.iter()
            .enumerate()
            .map(|(i, h)| format!("hit {}: {}", i + 1, h.breakdown))
            .collect::<Vec<_>>()
            .join("; "),
        total
    );

    ResolvedRoll {
        expression: expr.to_string(),
        raw_rolls: hits.iter().flat_map(|h| h.raw_rolls.iter().copied()).collect(),
        kept_rolls: hits.iter().flat_map(|h| h.kept_rolls.iter().copied()).collect(),
        natural: hits.iter().filter_map(|h| h.natural).max(),
        advantage_level: expr.advantage,
        dice_total: saturating_sum(hits.iter().map(|h| h.dice_total)),
        modifier_total: saturating_sum(hits.iter().map(|h| h.modifier_total)),
        total,
        breakdown,
        warnings: hits.first().map(|h| h.warnings.clone()).unwrap_or_default(),
        hits,
    }
}

fn evaluate_strike(
    expr: &DiceExpression,
    context: &impl RollContext,
    roller: &mut impl DieRoller,
) -> ResolvedRoll {
    let primary = expr.primary_dice_index();

    let mut raw_rolls = Vec::new();
    let mut kept_rolls = Vec::new();
    let mut natural = None;
    let mut dice_total: i32 = 0;
    let mut modifier_total: i32 = 0;
    let mut warnings = Vec::new();
    let mut parts = Vec::new();

    for (i, signed) in expr.terms.iter().enumerate() {
        let sign = signed.sign();
        let text = match &signed.term {
            Term::Dice { count, sides } => {
                let level = if primary == Some(i) { expr.advantage } else { 0 };
                let sets: Vec<Vec<u32>> = (0..=level.unsigned_abs())
                    .map(|_| (0..*count).map(|_| roller.roll_die(*sides)).collect())
                    .collect();
                for set in &sets {
                    raw_rolls.extend(set.iter().copied());
                }

                let chosen = pick_set(&sets, level);
                let sum = chosen.iter().fold(0i32, |acc, f| acc.saturating_add_unsigned(*f));
                dice_total = dice_total.saturating_add(sign.saturating_mul(sum));
                kept_rolls.extend(chosen.iter().copied());
                if primary == Some(i) {
                    natural = chosen.iter().max().copied();
                }

                let faces = format_faces(chosen);
                if sets.len() > 1 {
                    let label = if level > 0 { "advantage" } else { "disadvantage" };
                    let rolled = sets.iter().map(|s| format_faces(s)).collect::<Vec<_>>().join(" ");
                    format!("{}d{} {} ({} from {})", count, sides, faces, label, rolled)
                } else {
                    format!("{}d{} {}", count, sides, faces)
                }
            }
            Term::Flat { value } => {
                modifier_total = modifier_total.saturating_add(sign.saturating_mul(*value));
                value.to_string()
            }
            Term::Stat { stat } => match context.get_modifier(*stat) {
                Some(modifier) => {
                    modifier_total = modifier_total.saturating_add(sign.saturating_mul(modifier));
                    format!("{} ({})", stat, modifier)
                }
                None => {
                    let warning = format!("no value for stat '{}', counted as 0", stat);
                    warn!(stat = %stat, "{}", warning);
                    warnings.push(warning);
                    format!("{} (0)", stat)
                }
            },
            Term::UnknownStat { name } => {
                let warning = format!("unknown stat '{}' counted as 0", name);
                warn!(stat = %name, "{}", warning);
                warnings.push(warning);
                format!("{} (?)", name)
            }
        };

        match (parts.is_empty(), signed.negative) {
            (true, false) => parts.push(text),
            (true, true) => parts.push(format!("-{}", text)),
            (false, false) => parts.push(format!("+ {}", text)),
            (false, true) => parts.push(format!("- {}", text)),
        }
    }

    let total = dice_total.saturating_add(modifier_total);
    let mut breakdown = format!("{} = {}", parts.join(" "), total);
    if !warnings.is_empty() {
        breakdown.push_str(&format!(" [warning: {}]", warnings.join("; ")));
    }

    debug!(expression = %expr, total, "roll evaluated");

    ResolvedRoll {
        expression: expr.to_string(),
        raw_rolls,
        kept_rolls,
        natural,
        advantage_level: expr.advantage,
        dice_total,
        modifier_total,
        total,
        breakdown,
        warnings,
        hits: Vec::new(),
    }
}

fn saturating_sum(values: impl Iterator<Item = i32>) -> i32 {
    values.fold(0, i32::saturating_add)
}

/// First set with the best sum for the given advantage level
fn pick_set(sets: &[Vec<u32>], level: i32) -> &[u32] {
    let sums: Vec<u32> = sets.iter().map(|s| s.iter().sum()).collect();
    let target = match level {
        l if l > 0 => sums.iter().max(),
        l if l < 0 => sums.iter().min(),
        _ => sums.first(),
    };
    let index = target
        .and_then(|t| sums.iter().position(|s| s == t))
        .unwrap_or(0);
    sets.get(index).map(Vec::as_slice).unwrap_or(&[])
}

fn format_faces(faces: &[u32]) -> String {
    format!(
        "[{}]",
        faces.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::{ScriptedRoller, SignedTerm};

    fn stats(pairs: &[(StatTag, i32)]) -> HashMap<StatTag, i32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_stat_modifier_added() {
        let ctx = stats(&[(StatTag::Strength, 3)]);
        let mut roller = ScriptedRoller::new([12]);
        let roll = resolve_roll("1d20+str", &ctx, &mut roller).unwrap();

        assert_eq!(roll.raw_rolls, vec![12]);
        assert_eq!(roll.total, 15);
        assert_eq!(roll.dice_total, 12);
        assert_eq!(roll.modifier_total, 3);
        assert_eq!(roll.natural, Some(12));
        assert_eq!(roll.breakdown, "1d20 [12] + str (3) = 15");
    }

    #[test]
    fn test_unknown_stat_counts_zero() {
        let mut roller = ScriptedRoller::new([5]);
        let roll = resolve_roll("1d6+luck", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.total, 5);
        assert_eq!(roll.warnings.len(), 1);
        assert!(roll.breakdown.contains("warning"));
    }

    #[test]
    fn test_advantage_keeps_highest() {
        let mut roller = ScriptedRoller::new([7, 12]);
        let roll = resolve_roll("1d20 advantage", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.raw_rolls, vec![7, 12]);
        assert_eq!(roll.kept_rolls, vec![12]);
        assert_eq!(roll.total, 12);
        assert_eq!(roll.advantage_level, 1);
    }

    #[test]
    fn test_disadvantage_keeps_lowest() {
        let mut roller = ScriptedRoller::new([15, 3, 9]);
        let roll = resolve_roll("1d20 disadvantage 2", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.raw_rolls.len(), 3);
        assert_eq!(roll.total, 3);
        assert_eq!(roll.natural, Some(3));
    }

    #[test]
    fn test_advantage_only_on_primary_term() {
        let mut roller = ScriptedRoller::new([4, 18, 2]);
        let roll = resolve_roll("1d20 + 1d4 adv", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.raw_rolls, vec![4, 18, 2]);
        assert_eq!(roll.kept_rolls, vec![18, 2]);
        assert_eq!(roll.total, 20);
    }

    #[test]
    fn test_multihit_sums_strikes() {
        let ctx = stats(&[(StatTag::Dexterity, 2)]);
        let mut roller = ScriptedRoller::new([3, 5, 1]);
        let roll = resolve_roll("1d6+dex multihit 3", &ctx, &mut roller).unwrap();

        assert_eq!(roll.hits.len(), 3);
        assert_eq!(roll.strikes().len(), 3);
        assert_eq!(roll.hits[1].total, 7);
        assert_eq!(roll.total, 5 + 7 + 3);
        assert_eq!(roll.natural, Some(5));
    }

    #[test]
    fn test_negative_terms() {
        let mut roller = ScriptedRoller::new([6, 2]);
        let roll = resolve_roll("1d8 - 1d4 - 1", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.dice_total, 4);
        assert_eq!(roll.total, 3);
    }

    #[test]
    fn test_flat_only() {
        let mut roller = ScriptedRoller::default();
        let roll = resolve_roll("7", &NoStats, &mut roller).unwrap();

        assert_eq!(roll.total, 7);
        assert_eq!(roll.natural, None);
        assert!(roll.raw_rolls.is_empty());
    }

    #[test]
    fn test_large_terms_saturate() {
        let ctx = stats(&[(StatTag::Strength, i32::MAX)]);
        let mut roller = ScriptedRoller::new([20]);
        let roll = resolve_roll("1d20+str+5", &ctx, &mut roller).unwrap();
        assert_eq!(roll.total, i32::MAX);

        let expr = DiceExpression::from_terms(vec![
            SignedTerm::plus(Term::Flat { value: i32::MAX }),
            SignedTerm::plus(Term::Flat { value: i32::MAX }),
            SignedTerm::minus(Term::Flat { value: 1 }),
        ]);
        let roll = evaluate(&expr, &NoStats, &mut ScriptedRoller::default());
        assert_eq!(roll.modifier_total, i32::MAX - 1);

        let bonus = expr.with_flat_bonus(i32::MIN);
        let roll = evaluate(&bonus, &NoStats, &mut ScriptedRoller::default());
        assert!(roll.total < 0);
    }
}
