//! Move configuration loading

use super::{ConfigError, DiceConstants};
use crate::moves::{AttackTemplate, MoveCatalog, MoveDefinition};
use crate::types::ResourceKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container for move configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovesConfig {
    #[serde(rename = "moves")]
    pub moves: Vec<MoveDefinition>,
}

fn build_catalog(config: MovesConfig) -> Result<MoveCatalog, ConfigError> {
    let limits = DiceConstants::default();
    let mut catalog = MoveCatalog::new();

    for definition in config.moves {
        definition.validate(&limits)?;
        if catalog.get(&definition.id).is_some() {
            return Err(ConfigError::ValidationError(format!(
                "duplicate move id '{}'",
                definition.id
            )));
        }
        catalog.register(definition);
    }

    Ok(catalog)
}

/// Load move configurations from a TOML file
pub fn load_move_configs(path: &Path) -> Result<MoveCatalog, ConfigError> {
    build_catalog(super::load_toml(path)?)
}

/// Load move configurations from a TOML string
pub fn parse_move_configs(content: &str) -> Result<MoveCatalog, ConfigError> {
    build_catalog(super::parse_toml(content)?)
}

/// Get default move configurations
pub fn default_moves() -> MoveCatalog {
    let toml = include_str!("../../config/moves.toml");
    parse_move_configs(toml).unwrap_or_else(|_| {
        let mut catalog = MoveCatalog::new();
        catalog.register(
            MoveDefinition::new("strike", "Strike")
                .with_cost(ResourceKind::Stars, 1)
                .with_attack(AttackTemplate {
                    roll: Some("1d20+str+prof".to_string()),
                    damage: Some("1d6+str bludgeoning".to_string()),
                    ..Default::default()
                }),
        );
        catalog
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::RollTiming;
    use crate::types::StatTag;

    #[test]
    fn test_parse_moves() {
        let toml = r#"
[[moves]]
id = "fireball"
name = "Fireball"
cast_time = 1
cooldown = 2
uses = 3

[moves.cost]
stars = 2
mp = 5

[moves.attack]
damage = "8d6 fire"
save = "dexterity"
save_dc_stat = "intelligence"
half_on_save = true
mode = "multi"
"#;

        let catalog = parse_move_configs(toml).unwrap();
        let fireball = catalog.get("fireball").unwrap();

        assert_eq!(fireball.cast_time, 1);
        assert_eq!(fireball.duration, 0);
        assert_eq!(fireball.uses, Some(3));
        assert_eq!(fireball.cost.mp, 5);
        assert_eq!(fireball.roll_timing, RollTiming::Instant);

        let attack = fireball.attack.as_ref().unwrap();
        assert_eq!(attack.save, Some(StatTag::Dexterity));
        assert!(attack.half_on_save);
    }

    #[test]
    fn test_invalid_formula_rejected() {
        let toml = r#"
[[moves]]
id = "broken"
name = "Broken"

[moves.attack]
roll = "1d20 sneaky"
"#;

        assert!(matches!(
            parse_move_configs(toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let toml = r#"
[[moves]]
id = "jab"
name = "Jab"

[[moves]]
id = "jab"
name = "Other Jab"
"#;

        assert!(parse_move_configs(toml).is_err());
    }

    #[test]
    fn test_default_moves_load_all() {
        let toml = include_str!("../../config/moves.toml");
        let catalog = parse_move_configs(toml).expect("bundled moves must parse");

        assert_eq!(catalog.len(), 6);
        for id in ["strike", "fire_bolt", "fireball", "healing_word", "storm_aura", "guided_shot"] {
            assert!(catalog.get(id).is_some(), "missing default move {}", id);
        }
    }
}
