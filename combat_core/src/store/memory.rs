//! InMemoryStore - Lock-protected combatant table, loadable from a TOML roster

use super::{CombatantStore, ResourcePool, StoreError};
use crate::config::ConfigError;
use crate::defense::DefenseProfile;
use crate::types::{CombatantId, DamageType, ResourceKind, StatTag};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Ability scores plus proficiency bonus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(default = "default_score")]
    pub strength: i32,
    #[serde(default = "default_score")]
    pub dexterity: i32,
    #[serde(default = "default_score")]
    pub constitution: i32,
    #[serde(default = "default_score")]
    pub intelligence: i32,
    #[serde(default = "default_score")]
    pub wisdom: i32,
    #[serde(default = "default_score")]
    pub charisma: i32,
    #[serde(default = "default_proficiency")]
    pub proficiency: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        AbilityScores {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
            proficiency: 2,
        }
    }
}

fn default_score() -> i32 {
    10
}
fn default_proficiency() -> i32 {
    2
}

impl AbilityScores {
    pub fn get(&self, stat: StatTag) -> i32 {
        match stat {
            StatTag::Strength => self.strength,
            StatTag::Dexterity => self.dexterity,
            StatTag::Constitution => self.constitution,
            StatTag::Intelligence => self.intelligence,
            StatTag::Wisdom => self.wisdom,
            StatTag::Charisma => self.charisma,
            StatTag::Proficiency => self.proficiency,
        }
    }

    pub fn set(&mut self, stat: StatTag, value: i32) {
        let slot = match stat {
            StatTag::Strength => &mut self.strength,
            StatTag::Dexterity => &mut self.dexterity,
            StatTag::Constitution => &mut self.constitution,
            StatTag::Intelligence => &mut self.intelligence,
            StatTag::Wisdom => &mut self.wisdom,
            StatTag::Charisma => &mut self.charisma,
            StatTag::Proficiency => &mut self.proficiency,
        };
        *slot = value;
    }
}

/// Everything the in-memory store knows about one combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantRecord {
    pub id: CombatantId,
    pub name: String,
    pub stats: AbilityScores,

    // === Resources ===
    pub hp: i32,
    pub max_hp: i32,
    pub temp_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub stars: i32,
    pub max_stars: i32,

    // === Defense ===
    pub armor_class: i32,
    pub natural_resistances: BTreeMap<DamageType, i32>,
    pub effect_resistances: BTreeMap<DamageType, i32>,
    pub natural_vulnerabilities: BTreeMap<DamageType, i32>,
    pub effect_vulnerabilities: BTreeMap<DamageType, i32>,
}

impl CombatantRecord {
    /// Record at full HP with default scores and no MP or stars
    pub fn new(id: impl Into<CombatantId>, armor_class: i32, max_hp: i32) -> Self {
        let id = id.into();
        CombatantRecord {
            name: id.to_string(),
            id,
            stats: AbilityScores::default(),
            hp: max_hp,
            max_hp,
            temp_hp: 0,
            mp: 0,
            max_mp: 0,
            stars: 0,
            max_stars: 0,
            armor_class,
            natural_resistances: BTreeMap::new(),
            effect_resistances: BTreeMap::new(),
            natural_vulnerabilities: BTreeMap::new(),
            effect_vulnerabilities: BTreeMap::new(),
        }
    }

    pub fn with_stat(mut self, stat: StatTag, value: i32) -> Self {
        self.stats.set(stat, value);
        self
    }

    pub fn with_mp(mut self, max_mp: i32) -> Self {
        self.mp = max_mp;
        self.max_mp = max_mp;
        self
    }

    pub fn with_stars(mut self, max_stars: i32) -> Self {
        self.stars = max_stars;
        self.max_stars = max_stars;
        self
    }

    pub fn with_temp_hp(mut self, temp_hp: i32) -> Self {
        self.temp_hp = temp_hp;
        self
    }

    pub fn with_resistance(mut self, damage_type: DamageType, pct: i32) -> Self {
        self.natural_resistances.insert(damage_type, pct);
        self
    }

    pub fn with_vulnerability(mut self, damage_type: DamageType, pct: i32) -> Self {
        self.natural_vulnerabilities.insert(damage_type, pct);
        self
    }

    fn pool(&self, kind: ResourceKind) -> ResourcePool {
        match kind {
            ResourceKind::Hp => ResourcePool {
                current: self.hp,
                max: self.max_hp,
            },
            ResourceKind::TempHp => ResourcePool {
                current: self.temp_hp,
                max: self.temp_hp,
            },
            ResourceKind::Mp => ResourcePool {
                current: self.mp,
                max: self.max_mp,
            },
            ResourceKind::Stars => ResourcePool {
                current: self.stars,
                max: self.max_stars,
            },
        }
    }

    fn pool_mut(&mut self, kind: ResourceKind) -> &mut i32 {
        match kind {
            ResourceKind::Hp => &mut self.hp,
            ResourceKind::TempHp => &mut self.temp_hp,
            ResourceKind::Mp => &mut self.mp,
            ResourceKind::Stars => &mut self.stars,
        }
    }

    fn defense_profile(&self) -> DefenseProfile {
        DefenseProfile {
            armor_class: self.armor_class,
            natural_resistances: self.natural_resistances.clone(),
            effect_resistances: self.effect_resistances.clone(),
            natural_vulnerabilities: self.natural_vulnerabilities.clone(),
            effect_vulnerabilities: self.effect_vulnerabilities.clone(),
            current_temp_hp: self.temp_hp,
            current_hp: self.hp,
            max_hp: self.max_hp,
        }
    }
}

/// Combatant table guarded by a read-write lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<CombatantId, CombatantRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CombatantRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Add or replace a combatant
    pub fn insert(&self, record: CombatantRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    pub fn remove(&self, combatant: &CombatantId) -> Option<CombatantRecord> {
        self.records.write().remove(combatant)
    }

    pub fn record(&self, combatant: &CombatantId) -> Option<CombatantRecord> {
        self.records.read().get(combatant).cloned()
    }

    /// All combatant ids, sorted
    pub fn ids(&self) -> Vec<CombatantId> {
        let mut ids: Vec<_> = self.records.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Add (or with a negative value, reduce) an effect-granted resistance
    pub fn add_effect_resistance(
        &self,
        combatant: &CombatantId,
        damage_type: DamageType,
        pct: i32,
    ) -> Result<(), StoreError> {
        self.update(combatant, |record| {
            *record.effect_resistances.entry(damage_type).or_insert(0) += pct;
        })
    }

    pub fn add_effect_vulnerability(
        &self,
        combatant: &CombatantId,
        damage_type: DamageType,
        pct: i32,
    ) -> Result<(), StoreError> {
        self.update(combatant, |record| {
            *record.effect_vulnerabilities.entry(damage_type).or_insert(0) += pct;
        })
    }

    /// Replace the combatant's temporary HP
    pub fn set_temp_hp(&self, combatant: &CombatantId, temp_hp: i32) -> Result<(), StoreError> {
        self.update(combatant, |record| record.temp_hp = temp_hp.max(0))
    }

    fn update(
        &self,
        combatant: &CombatantId,
        f: impl FnOnce(&mut CombatantRecord),
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(combatant)
            .ok_or_else(|| StoreError::UnknownCombatant(combatant.clone()))?;
        f(record);
        Ok(())
    }

    /// Build a store from a parsed roster
    pub fn from_roster(roster: RosterConfig) -> Result<Self, ConfigError> {
        let store = Self::new();
        for entry in roster.combatants {
            let record = entry.into_record()?;
            if store.record(&record.id).is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate combatant id '{}'",
                    record.id
                )));
            }
            store.insert(record);
        }
        Ok(store)
    }

    /// Load a roster TOML file
    pub fn load_roster(path: &Path) -> Result<Self, ConfigError> {
        Self::from_roster(crate::config::load_toml(path)?)
    }

    /// Load a roster from a TOML string
    pub fn parse_roster(content: &str) -> Result<Self, ConfigError> {
        Self::from_roster(crate::config::parse_toml(content)?)
    }
}

impl CombatantStore for InMemoryStore {
    fn get_stat(&self, combatant: &CombatantId, stat: StatTag) -> Option<i32> {
        self.records.read().get(combatant).map(|r| r.stats.get(stat))
    }

    fn get_resource(&self, combatant: &CombatantId, kind: ResourceKind) -> Option<ResourcePool> {
        self.records.read().get(combatant).map(|r| r.pool(kind))
    }

    fn mutate_resource(
        &self,
        combatant: &CombatantId,
        kind: ResourceKind,
        delta: i32,
    ) -> Result<ResourcePool, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(combatant)
            .ok_or_else(|| StoreError::UnknownCombatant(combatant.clone()))?;

        let pool = record.pool(kind);
        let next = pool.current.saturating_add(delta);
        if next < 0 {
            return Err(StoreError::Underflow {
                combatant: combatant.clone(),
                kind,
                available: pool.current,
                requested: -delta,
            });
        }

        let next = match kind {
            ResourceKind::TempHp => next,
            _ if delta > 0 => next.min(pool.max.max(pool.current)),
            _ => next,
        };
        *record.pool_mut(kind) = next;

        debug!(combatant = %combatant, kind = %kind, delta, current = next, "resource changed");
        Ok(record.pool(kind))
    }

    fn get_defense_profile(&self, combatant: &CombatantId) -> Option<DefenseProfile> {
        self.records.read().get(combatant).map(CombatantRecord::defense_profile)
    }
}

/// `[[combatants]]` tables of a roster file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub combatants: Vec<RosterEntry>,
}

/// One combatant as written in a roster file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stats: AbilityScores,
    pub armor_class: i32,
    pub max_hp: i32,
    /// Starting HP, defaults to max
    #[serde(default)]
    pub hp: Option<i32>,
    #[serde(default)]
    pub temp_hp: i32,
    #[serde(default)]
    pub max_mp: i32,
    #[serde(default)]
    pub max_stars: i32,
    /// Natural resistances keyed by damage type tag
    #[serde(default)]
    pub resistances: BTreeMap<String, i32>,
    /// Natural vulnerabilities keyed by damage type tag
    #[serde(default)]
    pub vulnerabilities: BTreeMap<String, i32>,
}

impl RosterEntry {
    fn into_record(self) -> Result<CombatantRecord, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::ValidationError("combatant id is empty".to_string()));
        }
        if self.max_hp <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "combatant '{}' must have positive max_hp",
                self.id
            )));
        }

        let resistances = damage_map(&self.id, self.resistances)?;
        let vulnerabilities = damage_map(&self.id, self.vulnerabilities)?;

        let mut record = CombatantRecord::new(self.id.as_str(), self.armor_class, self.max_hp)
            .with_mp(self.max_mp)
            .with_stars(self.max_stars)
            .with_temp_hp(self.temp_hp.max(0));
        record.stats = self.stats;
        record.hp = self.hp.unwrap_or(self.max_hp).clamp(0, self.max_hp);
        record.natural_resistances = resistances;
        record.natural_vulnerabilities = vulnerabilities;
        if let Some(name) = self.name {
            record.name = name;
        }

        Ok(record)
    }
}

fn damage_map(
    combatant: &str,
    raw: BTreeMap<String, i32>,
) -> Result<BTreeMap<DamageType, i32>, ConfigError> {
    raw.into_iter()
        .map(|(tag, pct)| {
            tag.parse::<DamageType>()
                .map(|damage_type| (damage_type, pct))
                .map_err(|e| ConfigError::ValidationError(format!("combatant '{}': {}", combatant, e)))
        })
        .collect()
}
