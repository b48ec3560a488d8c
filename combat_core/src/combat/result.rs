//! AttackResult - Outcome of resolving an attack against one target

use crate::defense::DamageApplied;
use crate::dice::ResolvedRoll;
use crate::types::{CombatantId, DamageType, StatTag};
use serde::{Deserialize, Serialize};

/// Rolled damage of one type, before defenses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageComponent {
    pub amount: i32,
    pub damage_type: DamageType,
    pub breakdown: String,
}

/// One strike of a (possibly multihit) attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeOutcome {
    /// Attack total; `None` when there was no attack roll
    pub roll_total: Option<i32>,
    /// Natural face of the primary die
    pub natural: Option<u32>,
    pub hit: bool,
    pub critical: bool,
    /// Damage rolled for this strike (crit doubling included)
    pub rolled: Vec<DamageComponent>,
    /// Damage after save and defenses
    pub applied: Vec<DamageApplied>,
}

impl StrikeOutcome {
    pub fn total_damage(&self) -> i32 {
        self.applied
            .iter()
            .fold(0i32, |acc, d| acc.saturating_add(d.final_amount))
    }
}

/// The target's saving throw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub stat: StatTag,
    pub dc: i32,
    pub roll: ResolvedRoll,
    pub success: bool,
}

/// Result of one attack against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    pub attacker: CombatantId,
    pub target: CombatantId,

    // === Attack ===
    pub attack_roll: Option<ResolvedRoll>,
    pub target_armor_class: i32,
    pub strikes: Vec<StrikeOutcome>,

    // === Save ===
    pub save: Option<SaveOutcome>,
    /// Conditions the caller should apply to the target
    pub conditions_to_apply: Vec<String>,

    // === Damage ===
    pub total_damage: i32,
    pub absorbed_by_temp_hp: i32,

    // === State Changes ===
    pub temp_hp_before: i32,
    pub temp_hp_after: i32,
    pub hp_before: i32,
    pub hp_after: i32,

    /// Target was brought to 0 HP by this attack
    pub is_downed: bool,
}

impl AttackResult {
    /// Whether any strike hit
    pub fn hit(&self) -> bool {
        self.strikes.iter().any(|s| s.hit)
    }

    /// Whether any strike was critical
    pub fn critical(&self) -> bool {
        self.strikes.iter().any(|s| s.critical)
    }

    pub fn hit_count(&self) -> usize {
        self.strikes.iter().filter(|s| s.hit).count()
    }

    /// All damage components that reached the target
    pub fn damage_applied(&self) -> impl Iterator<Item = &DamageApplied> {
        self.strikes.iter().flat_map(|s| s.applied.iter())
    }

    /// Final damage dealt of one type
    pub fn damage_of_type(&self, damage_type: DamageType) -> i32 {
        self.damage_applied()
            .filter(|d| d.damage_type == damage_type)
            .fold(0i32, |acc, d| acc.saturating_add(d.final_amount))
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let verdict = match (self.attack_roll.is_some(), self.hit(), self.critical()) {
            (false, _, _) => "automatic hit".to_string(),
            (true, false, _) => "miss".to_string(),
            (true, true, true) => "critical hit".to_string(),
            (true, true, false) => "hit".to_string(),
        };
        if self.strikes.len() > 1 {
            parts.push(format!("{} ({}/{} strikes)", verdict, self.hit_count(), self.strikes.len()));
        } else {
            parts.push(verdict);
        }

        if let Some(save) = &self.save {
            let outcome = if save.success { "succeeded" } else { "failed" };
            parts.push(format!(
                "{} save {} ({} vs DC {})",
                save.stat, outcome, save.roll.total, save.dc
            ));
        }

        if self.hit() {
            parts.push(format!("{} damage", self.total_damage));
            for applied in self.damage_applied() {
                parts.push(applied.describe());
            }
        }

        if self.absorbed_by_temp_hp > 0 {
            parts.push(format!("{} absorbed by temp HP", self.absorbed_by_temp_hp));
        }

        for condition in &self.conditions_to_apply {
            parts.push(format!("applies {}", condition));
        }

        if self.is_downed {
            parts.push("DOWNED".to_string());
        }

        parts.join(", ")
    }
}
