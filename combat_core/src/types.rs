//! Core identifiers and closed tag enums shared by every module

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque reference to a combatant held by the external store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(pub String);

impl CombatantId {
    pub fn new(id: impl Into<String>) -> Self {
        CombatantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(s: &str) -> Self {
        CombatantId(s.to_string())
    }
}

impl From<String> for CombatantId {
    fn from(s: String) -> Self {
        CombatantId(s)
    }
}

/// Session-unique identifier of a live move effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Stats that dice expressions and saves may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTag {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
    /// Flat proficiency bonus, used as-is rather than converted from a score
    Proficiency,
}

impl StatTag {
    /// Short token used in formulas and breakdowns
    pub fn short_name(&self) -> &'static str {
        match self {
            StatTag::Strength => "str",
            StatTag::Dexterity => "dex",
            StatTag::Constitution => "con",
            StatTag::Intelligence => "int",
            StatTag::Wisdom => "wis",
            StatTag::Charisma => "cha",
            StatTag::Proficiency => "prof",
        }
    }

    /// Convert a stored stat value into the modifier added to rolls
    pub fn modifier(&self, value: i32) -> i32 {
        match self {
            StatTag::Proficiency => value,
            _ => ability_modifier(value),
        }
    }
}

/// Ability modifier for a raw score: floor((score - 10) / 2)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

impl fmt::Display for StatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for StatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(StatTag::Strength),
            "dex" | "dexterity" => Ok(StatTag::Dexterity),
            "con" | "constitution" => Ok(StatTag::Constitution),
            "int" | "intelligence" => Ok(StatTag::Intelligence),
            "wis" | "wisdom" => Ok(StatTag::Wisdom),
            "cha" | "charisma" => Ok(StatTag::Charisma),
            "prof" | "proficiency" => Ok(StatTag::Proficiency),
            other => Err(format!("Unknown stat: {}", other)),
        }
    }
}

/// Damage type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Psychic,
    Radiant,
    Necrotic,
    Force,
    Wind,
    Water,
    Divine,
    /// Untyped damage, also the fallback for unrecognised tags
    #[default]
    Generic,
    /// Ignores resistances and vulnerabilities
    True,
}

impl DamageType {
    /// Parse a tag, falling back to `Generic` for anything unrecognised
    pub fn from_tag_or_generic(tag: &str) -> (DamageType, bool) {
        match tag.parse() {
            Ok(damage_type) => (damage_type, true),
            Err(_) => (DamageType::Generic, false),
        }
    }

    /// Whether this type skips resistance and vulnerability adjustment
    pub fn bypasses_defenses(&self) -> bool {
        matches!(self, DamageType::True)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Radiant => "radiant",
            DamageType::Necrotic => "necrotic",
            DamageType::Force => "force",
            DamageType::Wind => "wind",
            DamageType::Water => "water",
            DamageType::Divine => "divine",
            DamageType::Generic => "generic",
            DamageType::True => "true",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slashing" => Ok(DamageType::Slashing),
            "piercing" => Ok(DamageType::Piercing),
            "bludgeoning" => Ok(DamageType::Bludgeoning),
            "fire" => Ok(DamageType::Fire),
            "cold" | "ice" => Ok(DamageType::Cold),
            "lightning" | "electric" => Ok(DamageType::Lightning),
            "thunder" | "sonic" => Ok(DamageType::Thunder),
            "acid" => Ok(DamageType::Acid),
            "poison" => Ok(DamageType::Poison),
            "psychic" => Ok(DamageType::Psychic),
            "radiant" => Ok(DamageType::Radiant),
            "necrotic" => Ok(DamageType::Necrotic),
            "force" => Ok(DamageType::Force),
            "wind" => Ok(DamageType::Wind),
            "water" => Ok(DamageType::Water),
            "divine" => Ok(DamageType::Divine),
            "generic" | "unspecified" => Ok(DamageType::Generic),
            "true" => Ok(DamageType::True),
            other => Err(format!("Unknown damage type: {}", other)),
        }
    }
}

/// Resource pools exposed by the combatant store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Hp,
    TempHp,
    Mp,
    /// Action stars spent to activate moves
    Stars,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Hp => "HP",
            ResourceKind::TempHp => "temp HP",
            ResourceKind::Mp => "MP",
            ResourceKind::Stars => "stars",
        };
        f.write_str(name)
    }
}
