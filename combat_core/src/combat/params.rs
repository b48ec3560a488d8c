//! AttackParameters and damage formula parsing

use crate::config::{default_crit_range, DiceConstants};
use crate::dice::{parse_with_limits, DiceExpression, ParseError};
use crate::types::{CombatantId, DamageType, StatTag};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Whether the attack roll is shared across targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    /// One roll compared against every target
    #[default]
    Single,
    /// A fresh roll per target; invalid targets are skipped
    Multi,
}

/// A request to resolve an attack or save effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackParameters {
    pub attacker: CombatantId,
    /// Attack roll formula; `None` for pure save effects, which always hit
    #[serde(default)]
    pub roll_expression: Option<String>,
    pub targets: Vec<CombatantId>,
    /// Comma separated `"<formula> <type>"` components
    #[serde(default)]
    pub damage_formula: Option<String>,
    #[serde(default = "default_crit_range")]
    pub crit_range: u32,

    // === Save ===
    #[serde(default)]
    pub save_type: Option<StatTag>,
    #[serde(default)]
    pub save_dc: Option<i32>,
    #[serde(default)]
    pub half_on_save: bool,
    /// Conditions handed back to the caller when the target fails (or has no) save
    #[serde(default)]
    pub conditions: Vec<String>,

    #[serde(default)]
    pub mode: AttackMode,
}

impl AttackParameters {
    pub fn new(attacker: impl Into<CombatantId>, targets: Vec<CombatantId>) -> Self {
        AttackParameters {
            attacker: attacker.into(),
            roll_expression: None,
            targets,
            damage_formula: None,
            crit_range: default_crit_range(),
            save_type: None,
            save_dc: None,
            half_on_save: false,
            conditions: Vec::new(),
            mode: AttackMode::Single,
        }
    }

    pub fn with_roll(mut self, expression: impl Into<String>) -> Self {
        self.roll_expression = Some(expression.into());
        self
    }

    pub fn with_damage(mut self, formula: impl Into<String>) -> Self {
        self.damage_formula = Some(formula.into());
        self
    }

    pub fn with_crit_range(mut self, crit_range: u32) -> Self {
        self.crit_range = crit_range;
        self
    }

    pub fn with_save(mut self, stat: StatTag, dc: i32, half_on_save: bool) -> Self {
        self.save_type = Some(stat);
        self.save_dc = Some(dc);
        self.half_on_save = half_on_save;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_mode(mut self, mode: AttackMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One typed part of a damage formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageSpec {
    pub expression: DiceExpression,
    pub damage_type: DamageType,
}

/// Parsed damage formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageFormula {
    pub components: Vec<DamageSpec>,
    /// Type tags that were not recognised and fell back to generic
    pub unknown_types: Vec<String>,
}

impl DamageFormula {
    /// Parse `"2d6+str fire, 1d4 cold"`
    ///
    /// The last word of a component names its type when it is a known tag.
    /// A component without a type tag is generic; an unrecognised trailing
    /// word is treated as a generic type with a warning.
    pub fn parse(text: &str, limits: &DiceConstants) -> Result<Self, ParseError> {
        let mut components = Vec::new();
        let mut unknown_types = Vec::new();

        for part in text.split(',') {
            let part = part.trim();
            let Some((head, tail)) = part.rsplit_once(char::is_whitespace) else {
                components.push(DamageSpec {
                    expression: parse_with_limits(part, limits)?,
                    damage_type: DamageType::Generic,
                });
                continue;
            };

            let (damage_type, known) = DamageType::from_tag_or_generic(tail);
            if known {
                components.push(DamageSpec {
                    expression: parse_with_limits(head, limits)?,
                    damage_type,
                });
                continue;
            }

            match parse_with_limits(part, limits) {
                Ok(expression) => components.push(DamageSpec {
                    expression,
                    damage_type: DamageType::Generic,
                }),
                Err(err) => {
                    let looks_like_tag = tail.chars().all(|c| c.is_ascii_alphabetic());
                    match parse_with_limits(head, limits) {
                        Ok(expression) if looks_like_tag => {
                            warn!(tag = tail, "unknown damage type, using generic");
                            unknown_types.push(tail.to_lowercase());
                            components.push(DamageSpec {
                                expression,
                                damage_type,
                            });
                        }
                        _ => return Err(err),
                    }
                }
            }
        }

        Ok(DamageFormula {
            components,
            unknown_types,
        })
    }
}
