//! Attack resolution - Hit, crit, save and damage against defense profiles

use super::params::{AttackMode, AttackParameters, DamageFormula};
use super::result::{AttackResult, DamageComponent, SaveOutcome, StrikeOutcome};
use crate::config::CombatConstants;
use crate::defense::{calculate_damage_applied, DefenseProfile};
use crate::dice::{evaluate, parse_with_limits, DiceExpression, DieRoller, ResolvedRoll, RollContext, SignedTerm, Term};
use crate::error::CombatError;
use crate::modifier::ModifierStack;
use crate::store::{CombatantStore, StatContext, StoreError};
use crate::types::{CombatantId, ResourceKind, StatTag};
use tracing::{debug, warn};

/// Per-target slot of an attack: a result, or why the target was skipped
pub type TargetOutcome = Result<AttackResult, CombatError>;

/// Resolve an attack against every target
///
/// Steps:
/// 1. Parse the attack roll and damage formula (nothing changes on failure)
/// 2. Validate targets; in single mode any invalid target aborts the call
/// 3. Fold the attacker's modifier stack into the attack roll
/// 4. Roll once (single) or per target (multi) and compare against AC
/// 5. Roll damage per hitting strike, doubling dice on a critical
/// 6. Roll the target's save, halving or negating damage on success
/// 7. Apply resistances, then subtract from temp HP and HP
pub fn process_attack<S: CombatantStore + ?Sized>(
    params: &AttackParameters,
    stack: Option<&mut ModifierStack>,
    store: &S,
    roller: &mut impl DieRoller,
    constants: &CombatConstants,
) -> Result<Vec<TargetOutcome>, CombatError> {
    let mut attack_roll = params
        .roll_expression
        .as_deref()
        .map(|text| parse_with_limits(text, &constants.dice))
        .transpose()?;
    let damage = params
        .damage_formula
        .as_deref()
        .map(|text| DamageFormula::parse(text, &constants.dice))
        .transpose()?;

    let validated: Vec<Result<(), CombatError>> = params
        .targets
        .iter()
        .map(|target| target_profile(store, target).map(|_| ()))
        .collect();

    if params.mode == AttackMode::Single {
        if let Some(Err(err)) = validated.iter().find(|v| v.is_err()) {
            return Err(err.clone());
        }
    }

    let any_valid = validated.iter().any(Result::is_ok);
    if let (Some(stack), Some(expr), true) = (stack, attack_roll.as_mut(), any_valid) {
        let augmented = stack.resolve(expr);
        *expr = augmented.expression;
    }

    let attacker_ctx = StatContext::new(store, &params.attacker);
    let shared_roll = match params.mode {
        AttackMode::Single => attack_roll
            .as_ref()
            .map(|expr| evaluate(expr, &attacker_ctx, roller)),
        AttackMode::Multi => None,
    };

    let mut outcomes = Vec::with_capacity(params.targets.len());
    for (target, validation) in params.targets.iter().zip(validated) {
        let outcome = validation
            .and_then(|_| target_profile(store, target))
            .and_then(|profile| {
                let roll = match (&shared_roll, &attack_roll) {
                    (Some(roll), _) => Some(roll.clone()),
                    (None, Some(expr)) => Some(evaluate(expr, &attacker_ctx, roller)),
                    (None, None) => None,
                };
                resolve_target(params, target, &profile, roll, damage.as_ref(), store, roller, constants)
            });

        if let Err(err) = &outcome {
            warn!(target = %target, error = %err, "attack slot skipped");
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Defense profile of a target that can still be attacked
fn target_profile<S: CombatantStore + ?Sized>(
    store: &S,
    target: &CombatantId,
) -> Result<DefenseProfile, CombatError> {
    let profile = store
        .get_defense_profile(target)
        .ok_or_else(|| CombatError::invalid_target(target, "not in combat"))?;
    if profile.is_down() {
        return Err(CombatError::invalid_target(target, "already at 0 HP"));
    }
    Ok(profile)
}

#[allow(clippy::too_many_arguments)]
fn resolve_target<S: CombatantStore + ?Sized>(
    params: &AttackParameters,
    target: &CombatantId,
    profile: &DefenseProfile,
    attack_roll: Option<ResolvedRoll>,
    damage: Option<&DamageFormula>,
    store: &S,
    roller: &mut impl DieRoller,
    constants: &CombatConstants,
) -> Result<AttackResult, CombatError> {
    let attacker_ctx = StatContext::new(store, &params.attacker);

    let mut strikes: Vec<StrikeOutcome> = match &attack_roll {
        Some(roll) => roll
            .strikes()
            .iter()
            .map(|strike| {
                let critical = strike.natural.is_some_and(|n| n >= params.crit_range);
                let hit = strike.total >= profile.armor_class
                    || (critical && constants.attack.critical_always_hits);
                StrikeOutcome {
                    roll_total: Some(strike.total),
                    natural: strike.natural,
                    hit,
                    critical,
                    rolled: Vec::new(),
                    applied: Vec::new(),
                }
            })
            .collect(),
        None => vec![StrikeOutcome {
            roll_total: None,
            natural: None,
            hit: true,
            critical: false,
            rolled: Vec::new(),
            applied: Vec::new(),
        }],
    };

    if let Some(formula) = damage {
        for strike in strikes.iter_mut().filter(|s| s.hit) {
            strike.rolled = roll_damage(formula, &attacker_ctx, roller, strike.critical);
        }
    }

    let any_hit = strikes.iter().any(|s| s.hit);
    let save = match (params.save_type, params.save_dc) {
        (Some(stat), Some(dc)) if any_hit => Some(roll_save(store, target, stat, dc, roller)),
        (Some(_), None) | (None, Some(_)) => {
            warn!("save needs both a stat and a DC, skipping save");
            None
        }
        _ => None,
    };
    let saved = save.as_ref().is_some_and(|s| s.success);

    let max_resistance = constants.resistance.max_resistance_pct;
    for strike in strikes.iter_mut() {
        let amounts: Vec<i32> = strike.rolled.iter().map(|c| c.amount).collect();
        let raw = match (saved, params.half_on_save) {
            (false, _) => amounts,
            (true, true) => halve_total(&amounts),
            (true, false) => vec![0; amounts.len()],
        };
        strike.applied = strike
            .rolled
            .iter()
            .zip(raw)
            .map(|(component, raw)| {
                calculate_damage_applied(raw, component.damage_type, profile, max_resistance)
            })
            .collect();
    }

    let conditions_to_apply = if any_hit && !saved {
        params.conditions.clone()
    } else {
        Vec::new()
    };

    let total_damage = strikes
        .iter()
        .map(StrikeOutcome::total_damage)
        .fold(0i32, i32::saturating_add);
    let change = apply_damage(store, target, profile, total_damage)?;

    let result = AttackResult {
        attacker: params.attacker.clone(),
        target: target.clone(),
        attack_roll,
        target_armor_class: profile.armor_class,
        strikes,
        save,
        conditions_to_apply,
        total_damage,
        absorbed_by_temp_hp: change.absorbed,
        temp_hp_before: change.temp_hp_before,
        temp_hp_after: change.temp_hp_after,
        hp_before: change.hp_before,
        hp_after: change.hp_after,
        is_downed: change.hp_before > 0 && change.hp_after <= 0,
    };

    debug!(
        attacker = %params.attacker,
        target = %target,
        hit = result.hit(),
        damage = total_damage,
        "attack resolved"
    );

    Ok(result)
}

/// Temp HP and HP of a target around one damage application
struct HpChange {
    absorbed: i32,
    temp_hp_before: i32,
    temp_hp_after: i32,
    hp_before: i32,
    hp_after: i32,
}

/// Subtract damage from temp HP first, then HP
///
/// Pools are read fresh from the store rather than from the profile taken at
/// validation. If the HP write fails, the temp HP already spent is put back.
fn apply_damage<S: CombatantStore + ?Sized>(
    store: &S,
    target: &CombatantId,
    profile: &DefenseProfile,
    amount: i32,
) -> Result<HpChange, CombatError> {
    let failed = |err: StoreError| CombatError::invalid_target(target, err.to_string());

    let temp_hp_before = store
        .get_resource(target, ResourceKind::TempHp)
        .map_or(profile.current_temp_hp, |pool| pool.current)
        .max(0);
    let hp_before = store
        .get_resource(target, ResourceKind::Hp)
        .map_or(profile.current_hp, |pool| pool.current);

    let absorbed = amount.min(temp_hp_before).max(0);
    let to_hp = amount.saturating_sub(absorbed).min(hp_before.max(0)).max(0);

    let temp_hp_after = if absorbed > 0 {
        store
            .mutate_resource(target, ResourceKind::TempHp, -absorbed)
            .map_err(failed)?
            .current
    } else {
        temp_hp_before
    };

    let hp_after = if to_hp > 0 {
        match store.mutate_resource(target, ResourceKind::Hp, -to_hp) {
            Ok(pool) => pool.current,
            Err(err) => {
                if absorbed > 0 {
                    if let Err(undo) = store.mutate_resource(target, ResourceKind::TempHp, absorbed) {
                        warn!(target = %target, error = %undo, "temp HP rollback failed");
                    }
                }
                return Err(failed(err));
            }
        }
    } else {
        hp_before
    };

    Ok(HpChange {
        absorbed,
        temp_hp_before,
        temp_hp_after,
        hp_before,
        hp_after,
    })
}

/// Halve the summed amounts, rounding down, keeping each type's share
///
/// Every component keeps half of itself; the odd units left over go to the
/// earliest components with an odd amount.
fn halve_total(amounts: &[i32]) -> Vec<i32> {
    let total = amounts.iter().fold(0i32, |acc, a| acc.saturating_add((*a).max(0)));
    let mut halves: Vec<i32> = amounts.iter().map(|a| (*a).max(0) / 2).collect();
    let kept = halves.iter().fold(0i32, |acc, h| acc.saturating_add(*h));
    let mut leftover = total / 2 - kept;

    for (half, amount) in halves.iter_mut().zip(amounts) {
        if leftover <= 0 {
            break;
        }
        if amount % 2 == 1 {
            *half += 1;
            leftover -= 1;
        }
    }
    halves
}

/// Roll every damage component; a critical adds the dice portion again
fn roll_damage(
    formula: &DamageFormula,
    context: &impl RollContext,
    roller: &mut impl DieRoller,
    critical: bool,
) -> Vec<DamageComponent> {
    formula
        .components
        .iter()
        .map(|component| {
            let roll = evaluate(&component.expression, context, roller);
            let amount = if critical {
                roll.total.saturating_add(roll.dice_total)
            } else {
                roll.total
            };
            DamageComponent {
                amount: amount.max(0),
                damage_type: component.damage_type,
                breakdown: roll.breakdown,
            }
        })
        .collect()
}

/// The target rolls 1d20 + stat modifier against the DC
fn roll_save<S: CombatantStore + ?Sized>(
    store: &S,
    target: &CombatantId,
    stat: StatTag,
    dc: i32,
    roller: &mut impl DieRoller,
) -> SaveOutcome {
    let expr = DiceExpression::from_terms(vec![
        SignedTerm::plus(Term::Dice { count: 1, sides: 20 }),
        SignedTerm::plus(Term::Stat { stat }),
    ]);
    let roll = evaluate(&expr, &StatContext::new(store, target), roller);
    let success = roll.total >= dc;

    debug!(target = %target, stat = %stat, dc, total = roll.total, success, "saving throw");

    SaveOutcome {
        stat,
        dc,
        roll,
        success,
    }
}
