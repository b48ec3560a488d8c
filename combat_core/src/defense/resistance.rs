//! Resistance and vulnerability adjustment
//!
//! Formula:
//! - effective_resist = min(resistance, cap), resistance already clamped at 0
//! - adjusted = floor(raw * (1 - effective_resist / 100) * (1 + vulnerability / 100))
//!
//! Computed in integer percent so the single floor happens at the end.

use super::profile::DefenseProfile;
use crate::types::DamageType;
use serde::{Deserialize, Serialize};

/// A damage component after defensive adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageApplied {
    pub damage_type: DamageType,
    /// Damage before resistances (after crit doubling and save halving)
    pub raw_amount: i32,
    /// Resistance percentage actually applied
    pub resistance_pct: i32,
    /// Vulnerability percentage actually applied
    pub vulnerability_pct: i32,
    pub final_amount: i32,
}

impl DamageApplied {
    /// Short text describing how defenses changed the damage
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("{} {}", self.final_amount, self.damage_type)];

        if self.resistance_pct > 0 {
            parts.push(format!("resisted {}%", self.resistance_pct));
        }
        if self.vulnerability_pct > 100 {
            parts.push(format!("amplified {}%", self.vulnerability_pct));
        } else if self.vulnerability_pct > 0 {
            parts.push(format!("vulnerable {}%", self.vulnerability_pct));
        }

        parts.join(", ")
    }
}

/// Apply resistance then vulnerability to a raw amount
pub fn adjust_for_defenses(raw: i32, resistance_pct: i32, vulnerability_pct: i32, max_resistance: i32) -> i32 {
    if raw <= 0 {
        return 0;
    }

    let resist = i64::from(resistance_pct.clamp(0, max_resistance.max(0)));
    let vuln = i64::from(vulnerability_pct.max(0));
    let scaled = i64::from(raw) * (100 - resist) * (100 + vuln) / 10_000;

    i32::try_from(scaled).unwrap_or(i32::MAX)
}

/// Adjust one damage component against a target's profile
pub fn calculate_damage_applied(
    raw: i32,
    damage_type: DamageType,
    profile: &DefenseProfile,
    max_resistance: i32,
) -> DamageApplied {
    let raw = raw.max(0);

    if damage_type.bypasses_defenses() {
        return DamageApplied {
            damage_type,
            raw_amount: raw,
            resistance_pct: 0,
            vulnerability_pct: 0,
            final_amount: raw,
        };
    }

    let resistance_pct = profile.total_resistance(damage_type).min(max_resistance);
    let vulnerability_pct = profile.total_vulnerability(damage_type);

    DamageApplied {
        damage_type,
        raw_amount: raw,
        resistance_pct,
        vulnerability_pct,
        final_amount: adjust_for_defenses(raw, resistance_pct, vulnerability_pct, max_resistance),
    }
}
