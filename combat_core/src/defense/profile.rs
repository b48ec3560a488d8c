//! DefenseProfile - A combatant's armor, resistances and hit points

use crate::types::DamageType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Defensive view of a combatant, as reported by the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseProfile {
    pub armor_class: i32,

    // === Resistances (percent) ===
    #[serde(default)]
    pub natural_resistances: BTreeMap<DamageType, i32>,
    #[serde(default)]
    pub effect_resistances: BTreeMap<DamageType, i32>,

    // === Vulnerabilities (percent) ===
    #[serde(default)]
    pub natural_vulnerabilities: BTreeMap<DamageType, i32>,
    #[serde(default)]
    pub effect_vulnerabilities: BTreeMap<DamageType, i32>,

    // === Hit points ===
    pub current_temp_hp: i32,
    pub current_hp: i32,
    pub max_hp: i32,
}

impl DefenseProfile {
    pub fn new(armor_class: i32, max_hp: i32) -> Self {
        DefenseProfile {
            armor_class,
            current_hp: max_hp,
            max_hp,
            ..Default::default()
        }
    }

    pub fn with_natural_resistance(mut self, damage_type: DamageType, pct: i32) -> Self {
        self.natural_resistances.insert(damage_type, pct);
        self
    }

    pub fn with_effect_resistance(mut self, damage_type: DamageType, pct: i32) -> Self {
        *self.effect_resistances.entry(damage_type).or_insert(0) += pct;
        self
    }

    pub fn with_natural_vulnerability(mut self, damage_type: DamageType, pct: i32) -> Self {
        self.natural_vulnerabilities.insert(damage_type, pct);
        self
    }

    pub fn with_effect_vulnerability(mut self, damage_type: DamageType, pct: i32) -> Self {
        *self.effect_vulnerabilities.entry(damage_type).or_insert(0) += pct;
        self
    }

    pub fn with_temp_hp(mut self, temp_hp: i32) -> Self {
        self.current_temp_hp = temp_hp;
        self
    }

    /// Natural plus effect resistance, clamped at 0
    pub fn total_resistance(&self, damage_type: DamageType) -> i32 {
        let natural = self.natural_resistances.get(&damage_type).copied().unwrap_or(0);
        let effect = self.effect_resistances.get(&damage_type).copied().unwrap_or(0);
        (natural + effect).max(0)
    }

    /// Natural plus effect vulnerability, clamped at 0
    pub fn total_vulnerability(&self, damage_type: DamageType) -> i32 {
        let natural = self.natural_vulnerabilities.get(&damage_type).copied().unwrap_or(0);
        let effect = self.effect_vulnerabilities.get(&damage_type).copied().unwrap_or(0);
        (natural + effect).max(0)
    }

    pub fn is_down(&self) -> bool {
        self.current_hp <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistances_sum_across_sources() {
        let profile = DefenseProfile::new(12, 30)
            .with_natural_resistance(DamageType::Fire, 25)
            .with_effect_resistance(DamageType::Fire, 20)
            .with_effect_resistance(DamageType::Fire, 30);

        assert_eq!(profile.total_resistance(DamageType::Fire), 75);
        assert_eq!(profile.total_resistance(DamageType::Cold), 0);
    }

    #[test]
    fn test_negative_resistance_clamped() {
        let profile = DefenseProfile::new(12, 30).with_effect_resistance(DamageType::Acid, -40);
        assert_eq!(profile.total_resistance(DamageType::Acid), 0);
    }
}
