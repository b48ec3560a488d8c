//! MoveDefinition - Static description of an activated ability

use crate::combat::{AttackMode, AttackParameters, DamageFormula};
use crate::config::{ConfigError, DiceConstants};
use crate::dice::parse_with_limits;
use crate::store::CombatantStore;
use crate::types::{CombatantId, ResourceKind, StatTag};
use serde::{Deserialize, Serialize};

/// When the primary roll fires while the move is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollTiming {
    /// Once, on entering the active phase
    #[default]
    Instant,
    /// On entry and again at every turn start while active
    PerTurn,
}

/// Resources spent on activation; negative amounts are gains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCost {
    #[serde(default)]
    pub stars: i32,
    #[serde(default)]
    pub mp: i32,
    #[serde(default)]
    pub hp: i32,
}

impl MoveCost {
    pub fn get(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Stars => self.stars,
            ResourceKind::Mp => self.mp,
            ResourceKind::Hp => self.hp,
            ResourceKind::TempHp => 0,
        }
    }

    /// Non-zero (kind, amount) pairs
    pub fn entries(&self) -> Vec<(ResourceKind, i32)> {
        [ResourceKind::Stars, ResourceKind::Mp, ResourceKind::Hp]
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|(_, amount)| *amount != 0)
            .collect()
    }
}

/// The attack a move performs when it triggers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackTemplate {
    #[serde(default)]
    pub roll: Option<String>,
    #[serde(default)]
    pub damage: Option<String>,
    #[serde(default)]
    pub crit_range: Option<u32>,

    // === Save ===
    #[serde(default)]
    pub save: Option<StatTag>,
    #[serde(default)]
    pub save_dc: Option<i32>,
    /// DC = 8 + owner's proficiency + owner's modifier for this stat
    #[serde(default)]
    pub save_dc_stat: Option<StatTag>,
    #[serde(default)]
    pub half_on_save: bool,
    #[serde(default)]
    pub conditions: Vec<String>,

    #[serde(default)]
    pub mode: AttackMode,
}

impl AttackTemplate {
    /// Build concrete parameters for an owner and target list
    pub fn to_parameters<S: CombatantStore + ?Sized>(
        &self,
        owner: &CombatantId,
        targets: &[CombatantId],
        store: &S,
        default_crit_range: u32,
    ) -> AttackParameters {
        let save_dc = self.save_dc.or_else(|| {
            self.save_dc_stat
                .map(|stat| spell_save_dc(store, owner, stat))
        });

        AttackParameters {
            attacker: owner.clone(),
            roll_expression: self.roll.clone(),
            targets: targets.to_vec(),
            damage_formula: self.damage.clone(),
            crit_range: self.crit_range.unwrap_or(default_crit_range),
            save_type: self.save,
            save_dc,
            half_on_save: self.half_on_save,
            conditions: self.conditions.clone(),
            mode: self.mode,
        }
    }
}

/// 8 + proficiency + stat modifier
pub fn spell_save_dc<S: CombatantStore + ?Sized>(store: &S, owner: &CombatantId, stat: StatTag) -> i32 {
    let proficiency = store.get_stat(owner, StatTag::Proficiency).unwrap_or(0);
    let modifier = store
        .get_stat(owner, stat)
        .map(|value| stat.modifier(value))
        .unwrap_or(0);
    8 + proficiency + modifier
}

/// Static definition of a move, usually loaded from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,

    // === Costs ===
    #[serde(default)]
    pub cost: MoveCost,
    /// Activations allowed per combatant per session
    #[serde(default)]
    pub uses: Option<u32>,

    // === Timing (in owner turns) ===
    #[serde(default)]
    pub cast_time: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cooldown: u32,
    #[serde(default)]
    pub roll_timing: RollTiming,

    #[serde(default)]
    pub attack: Option<AttackTemplate>,
}

impl MoveDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        MoveDefinition {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            cost: MoveCost::default(),
            uses: None,
            cast_time: 0,
            duration: 0,
            cooldown: 0,
            roll_timing: RollTiming::Instant,
            attack: None,
        }
    }

    pub fn with_cost(mut self, kind: ResourceKind, amount: i32) -> Self {
        match kind {
            ResourceKind::Stars => self.cost.stars = amount,
            ResourceKind::Mp => self.cost.mp = amount,
            ResourceKind::Hp => self.cost.hp = amount,
            ResourceKind::TempHp => {}
        }
        self
    }

    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses = Some(uses);
        self
    }

    pub fn with_timing(mut self, cast_time: u32, duration: u32, cooldown: u32) -> Self {
        self.cast_time = cast_time;
        self.duration = duration;
        self.cooldown = cooldown;
        self
    }

    pub fn with_roll_timing(mut self, roll_timing: RollTiming) -> Self {
        self.roll_timing = roll_timing;
        self
    }

    pub fn with_attack(mut self, attack: AttackTemplate) -> Self {
        self.attack = Some(attack);
        self
    }

    /// Check ids and that every formula parses
    pub fn validate(&self, limits: &DiceConstants) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::ValidationError(format!("move '{}': {}", self.id, msg));

        if self.id.trim().is_empty() {
            return Err(ConfigError::ValidationError("move id is empty".to_string()));
        }
        if self.uses == Some(0) {
            return Err(invalid("uses must be at least 1 when set".to_string()));
        }

        if let Some(attack) = &self.attack {
            if let Some(roll) = &attack.roll {
                parse_with_limits(roll, limits).map_err(|e| invalid(e.to_string()))?;
            }
            if let Some(damage) = &attack.damage {
                DamageFormula::parse(damage, limits).map_err(|e| invalid(e.to_string()))?;
            }
            if attack.save.is_some() && attack.save_dc.is_none() && attack.save_dc_stat.is_none() {
                return Err(invalid("save requires save_dc or save_dc_stat".to_string()));
            }
        }

        Ok(())
    }
}
