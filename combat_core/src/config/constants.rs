//! Combat constants configuration

use serde::{Deserialize, Serialize};

/// Tunable combat constants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatConstants {
    #[serde(default)]
    pub dice: DiceConstants,
    #[serde(default)]
    pub attack: AttackConstants,
    #[serde(default)]
    pub resistance: ResistanceConstants,
}

/// Limits enforced when parsing dice formulas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceConstants {
    /// Most dice a single `NdM` term may roll
    #[serde(default = "default_max_dice_count")]
    pub max_dice_count: u32,
    /// Largest die allowed
    #[serde(default = "default_max_sides")]
    pub max_sides: u32,
    /// Largest `multihit` count
    #[serde(default = "default_max_multihit")]
    pub max_multihit: u32,
    /// Largest level a literal advantage/disadvantage qualifier may request
    #[serde(default = "default_max_advantage_level")]
    pub max_advantage_level: u32,
    /// Largest constant a flat term may carry
    #[serde(default = "default_max_flat")]
    pub max_flat: u32,
}

impl Default for DiceConstants {
    fn default() -> Self {
        DiceConstants {
            max_dice_count: 100,
            max_sides: 1000,
            max_multihit: 10,
            max_advantage_level: 5,
            max_flat: 100_000,
        }
    }
}

fn default_max_dice_count() -> u32 {
    100
}
fn default_max_sides() -> u32 {
    1000
}
fn default_max_multihit() -> u32 {
    10
}
fn default_max_advantage_level() -> u32 {
    5
}
fn default_max_flat() -> u32 {
    100_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConstants {
    /// Natural roll at or above which an attack is critical
    #[serde(default = "default_crit_range")]
    pub default_crit_range: u32,
    /// Whether a critical hits regardless of armor class
    #[serde(default)]
    pub critical_always_hits: bool,
}

impl Default for AttackConstants {
    fn default() -> Self {
        AttackConstants {
            default_crit_range: 20,
            critical_always_hits: false,
        }
    }
}

pub(crate) fn default_crit_range() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResistanceConstants {
    /// Resistance percentage at which damage is fully negated
    #[serde(default = "default_max_resistance")]
    pub max_resistance_pct: i32,
}

impl Default for ResistanceConstants {
    fn default() -> Self {
        ResistanceConstants {
            max_resistance_pct: 100,
        }
    }
}

fn default_max_resistance() -> i32 {
    100
}
