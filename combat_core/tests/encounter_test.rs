//! Integration test: Roster -> Initiative -> Moves -> Attacks
//!
//! Drives whole encounters through a CombatSession backed by the in-memory
//! store, with scripted dice where exact numbers matter.

use combat_core::{
    combat::{AttackMode, AttackParameters},
    config::{default_moves, CombatConstants},
    dice::ScriptedRoller,
    error::{CombatError, CostKind, Shortfall},
    modifier::RollModifierEffect,
    moves::{AttackTemplate, MoveDefinition, MovePhase, PhaseEvent},
    session::CombatSession,
    store::{CombatantRecord, CombatantStore, InMemoryStore},
    types::{CombatantId, DamageType, ResourceKind, StatTag},
};

const ROSTER: &str = r#"
[[combatants]]
id = "knight"
name = "Knight"
armor_class = 17
max_hp = 34
max_stars = 3
max_mp = 4

[combatants.stats]
strength = 16
dexterity = 10

[[combatants]]
id = "mage"
name = "Mage"
armor_class = 12
max_hp = 20
max_stars = 3
max_mp = 20

[combatants.stats]
intelligence = 16
dexterity = 14

[[combatants]]
id = "troll"
name = "Troll"
armor_class = 15
max_hp = 60
max_stars = 3

[combatants.stats]
strength = 18
dexterity = 12

[combatants.resistances]
slashing = 25

[combatants.vulnerabilities]
fire = 50
"#;

fn id(s: &str) -> CombatantId {
    CombatantId::new(s)
}

/// Session over the shared roster with a fixed die script
fn scripted(faces: impl IntoIterator<Item = u32>) -> CombatSession<InMemoryStore> {
    let store = InMemoryStore::parse_roster(ROSTER).unwrap();
    CombatSession::new(store, CombatConstants::default(), ScriptedRoller::new(faces))
}

fn hp(session: &CombatSession<InMemoryStore>, who: &str) -> i32 {
    session.store().get_resource(&id(who), ResourceKind::Hp).unwrap().current
}

fn mp(session: &CombatSession<InMemoryStore>, who: &str) -> i32 {
    session.store().get_resource(&id(who), ResourceKind::Mp).unwrap().current
}

#[test]
fn test_attack_meets_armor_class() {
    let store = InMemoryStore::with_records([
        CombatantRecord::new("rogue", 14, 20).with_stat(StatTag::Strength, 16),
        CombatantRecord::new("guard", 15, 20),
    ]);
    let session = CombatSession::new(store, CombatConstants::default(), ScriptedRoller::new([12]));

    let params = AttackParameters::new("rogue", vec![id("guard")]).with_roll("1d20+str");
    let outcomes = session.process_attack(&params).unwrap();
    let result = outcomes[0].as_ref().unwrap();

    assert_eq!(result.attack_roll.as_ref().unwrap().total, 15);
    assert!(result.hit());
    assert!(!result.critical());
}

#[test]
fn test_fire_damage_halved_by_resistance() {
    let store = InMemoryStore::with_records([
        CombatantRecord::new("mage", 12, 20),
        CombatantRecord::new("salamander", 10, 30).with_resistance(DamageType::Fire, 50),
    ]);
    let session = CombatSession::new(store, CombatConstants::default(), ScriptedRoller::new([4, 5]));

    let params = AttackParameters::new("mage", vec![id("salamander")]).with_damage("2d6 fire");
    let outcomes = session.process_attack(&params).unwrap();
    let result = outcomes[0].as_ref().unwrap();

    assert_eq!(result.damage_of_type(DamageType::Fire), 4);
    assert_eq!(result.hp_after, 26);
}

#[test]
fn test_effect_resistances_sum_before_flooring() {
    let session = scripted([6, 4]);
    session.store().add_effect_resistance(&id("knight"), DamageType::Cold, 20).unwrap();
    session.store().add_effect_resistance(&id("knight"), DamageType::Cold, 30).unwrap();

    let params = AttackParameters::new("mage", vec![id("knight")]).with_damage("2d6 cold");
    let outcomes = session.process_attack(&params).unwrap();
    let applied: Vec<_> = outcomes[0].as_ref().unwrap().damage_applied().cloned().collect();

    assert_eq!(applied[0].resistance_pct, 50);
    assert_eq!(applied[0].final_amount, 5);
    assert_eq!(hp(&session, "knight"), 29);
}

#[test]
fn test_multi_mode_with_removed_target() {
    let session = scripted([18, 18]);
    session.store().remove(&id("mage"));

    let params = AttackParameters::new("troll", vec![id("knight"), id("mage"), id("knight")])
        .with_roll("1d20+str")
        .with_mode(AttackMode::Multi);
    let outcomes = session.process_attack(&params).unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(matches!(
        &outcomes[1],
        Err(CombatError::InvalidTarget { target, .. }) if target == &id("mage")
    ));
    assert!(outcomes[2].is_ok());
}

#[test]
fn test_next_roll_only_bonus_used_once() {
    let session = scripted([10, 10]);
    session.apply_roll_modifier(&id("mage"), RollModifierEffect::bonus("bless", 5).next_roll_only());

    let params = AttackParameters::new("mage", vec![id("troll")]).with_roll("1d20");
    let first = session.process_attack(&params).unwrap();
    let second = session.process_attack(&params).unwrap();

    assert!(first[0].as_ref().unwrap().hit());
    assert!(!second[0].as_ref().unwrap().hit());
    assert!(session.roll_modifiers(&id("mage")).is_empty());
}

#[test]
fn test_balanced_advantage_rolls_once() {
    let session = scripted([7, 19]);
    session.apply_roll_modifier(&id("knight"), RollModifierEffect::advantage("flanking"));
    session.apply_roll_modifier(&id("knight"), RollModifierEffect::disadvantage("prone"));

    let roll = session.resolve_roll(&id("knight"), "1d20").unwrap();

    assert_eq!(roll.raw_rolls, vec![7]);
    assert_eq!(roll.total, 7);
    assert_eq!(session.roll_modifiers(&id("knight")).len(), 2);
}

#[test]
fn test_cast_time_two_then_fires() {
    // cast at round 1, active at round 3: 1d20+int+prof = 12+3+2 vs AC 15, then 2d6 fire
    let session = scripted([12, 3, 3]);
    let meteor = MoveDefinition::new("meteor", "Meteor")
        .with_cost(ResourceKind::Mp, 6)
        .with_timing(2, 1, 1)
        .with_attack(AttackTemplate {
            roll: Some("1d20+int+prof".to_string()),
            damage: Some("2d6 fire".to_string()),
            ..Default::default()
        });

    let activation = session
        .create_move_effect(&meteor, &id("mage"), vec![id("troll")], 1)
        .unwrap();
    let effect_id = activation.effect.id;
    assert_eq!(activation.effect.phase, MovePhase::Casting);
    assert_eq!(mp(&session, "mage"), 14);

    let events = session.advance_move_phase(effect_id, 2).unwrap();
    assert!(!events.iter().any(PhaseEvent::is_trigger));
    assert_eq!(session.effect(effect_id).unwrap().phase, MovePhase::Casting);

    let events = session.advance_move_phase(effect_id, 3).unwrap();
    assert!(events.iter().any(PhaseEvent::is_trigger));
    assert_eq!(session.effect(effect_id).unwrap().phase, MovePhase::Active);

    // 6 fire, +50% vulnerability
    assert_eq!(hp(&session, "troll"), 51);

    session.advance_move_phase(effect_id, 4).unwrap();
    assert_eq!(session.effect(effect_id).unwrap().phase, MovePhase::Cooldown);
    session.advance_move_phase(effect_id, 5).unwrap();
    assert_eq!(session.effect(effect_id).unwrap().phase, MovePhase::Expired);
}

#[test]
fn test_insufficient_resources_creates_nothing() {
    let session = scripted([]);
    let catalog = default_moves();
    let fireball = catalog.require("fireball").unwrap();

    let err = session
        .create_move_effect(fireball, &id("knight"), vec![id("troll")], 1)
        .unwrap_err();

    assert_eq!(
        err,
        CombatError::InsufficientResources {
            combatant: id("knight"),
            shortfall: Shortfall {
                cost: CostKind::Resource(ResourceKind::Mp),
                required: 5,
                available: 4,
            },
        }
    );
    assert_eq!(mp(&session, "knight"), 4);
    assert_eq!(
        session.store().get_resource(&id("knight"), ResourceKind::Stars).unwrap().current,
        3
    );
    assert!(session.effects_of(&id("knight")).is_empty());
    assert_eq!(session.uses_remaining(&id("knight"), fireball), Some(3));
}

#[test]
fn test_cancel_keeps_cost() {
    let session = scripted([]);
    let catalog = default_moves();
    let fireball = catalog.require("fireball").unwrap();

    let activation = session
        .create_move_effect(fireball, &id("mage"), vec![id("troll"), id("knight")], 1)
        .unwrap();
    session.cancel_move_effect(activation.effect.id, 1).unwrap();

    assert_eq!(mp(&session, "mage"), 15);
    assert_eq!(session.uses_remaining(&id("mage"), fireball), Some(2));
    assert!(matches!(
        session.advance_move_phase(activation.effect.id, 2),
        Err(CombatError::StateTransition { phase: MovePhase::Expired, .. })
    ));
    assert_eq!(hp(&session, "troll"), 60);
}

#[test]
fn test_concurrent_activations_cannot_overspend() {
    let session = scripted([]);
    let first = MoveDefinition::new("ward", "Ward").with_cost(ResourceKind::Mp, 12);
    let second = MoveDefinition::new("haste", "Haste").with_cost(ResourceKind::Mp, 12);

    let results: Vec<_> = std::thread::scope(|scope| {
        let a = scope.spawn(|| session.create_move_effect(&first, &id("mage"), Vec::new(), 1));
        let b = scope.spawn(|| session.create_move_effect(&second, &id("mage"), Vec::new(), 1));
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(mp(&session, "mage"), 8);
}

#[test]
fn test_next_roll_bonus_seen_once_under_contention() {
    for _ in 0..20 {
        let session = scripted(std::iter::repeat(10).take(40));

        let mut totals: Vec<i32> = std::thread::scope(|scope| {
            let rolls = scope.spawn(|| {
                (0..16)
                    .map(|_| session.resolve_roll(&id("mage"), "1d20").unwrap().total)
                    .collect::<Vec<_>>()
            });
            scope.spawn(|| {
                session.apply_roll_modifier(&id("mage"), RollModifierEffect::bonus("inspire", 5).next_roll_only());
            });
            rolls.join().unwrap()
        });
        totals.push(session.resolve_roll(&id("mage"), "1d20").unwrap().total);

        assert_eq!(totals.iter().filter(|&&t| t == 15).count(), 1);
        assert_eq!(totals.iter().filter(|&&t| t == 10).count(), totals.len() - 1);
        assert!(session.roll_modifiers(&id("mage")).is_empty());
    }
}

#[test]
fn test_initiative_skips_downed_and_wraps() {
    // knight 10+0, mage 15+2, troll 5+1
    let session = scripted([10, 15, 5]);
    let (mut state, rolls) = session.roll_initiative(&[id("knight"), id("mage"), id("troll")]);
    assert_eq!(state.order, vec![id("mage"), id("knight"), id("troll")]);
    assert_eq!(rolls.len(), 3);

    let turn = session.advance_turn(&mut state).unwrap();
    assert_eq!((turn.actor, turn.round), (id("mage"), 1));

    session.store().mutate_resource(&id("knight"), ResourceKind::Hp, -34).unwrap();
    let turn = session.advance_turn(&mut state).unwrap();
    assert_eq!(turn.actor, id("troll"));

    state.remove(&id("troll"));
    let turn = session.advance_turn(&mut state).unwrap();
    assert_eq!(turn.actor, id("mage"));
    assert!(turn.round_incremented);
    assert_eq!(turn.round, 2);
}

/// Run a few rounds where everybody strikes the next living combatant
fn run_encounter(seed: u64) -> (Vec<i32>, String) {
    let store = InMemoryStore::parse_roster(ROSTER).unwrap();
    let session = CombatSession::seeded(store, CombatConstants::default(), seed);
    let catalog = default_moves();
    let strike = catalog.require("strike").unwrap();
    let ids = session.store().ids();

    let (mut state, _) = session.roll_initiative(&ids);
    for _ in 0..12 {
        let Some(turn) = session.advance_turn(&mut state) else {
            break;
        };
        session.advance_owner_effects(&turn.actor, turn.round);

        let target = ids
            .iter()
            .find(|other| *other != &turn.actor && session.store().can_act(other))
            .cloned();
        if let Some(target) = target {
            // running out of stars is expected
            let _ = session.create_move_effect(strike, &turn.actor, vec![target], turn.round);
        }
        session.tick_roll_modifiers(&turn.actor);
    }

    let hps = ids.iter().map(|c| session.store().record(c).unwrap().hp).collect();
    let snapshot = serde_json::to_string(&session.snapshot()).unwrap();
    (hps, snapshot)
}

#[test]
fn test_seeded_encounter_is_reproducible() {
    let (first_hp, first_snapshot) = run_encounter(42);
    let (second_hp, second_snapshot) = run_encounter(42);

    assert_eq!(first_hp, second_hp);
    assert_eq!(first_snapshot, second_snapshot);

    let store = InMemoryStore::parse_roster(ROSTER).unwrap();
    for (who, hp) in store.ids().iter().zip(&first_hp) {
        let max = store.record(who).unwrap().max_hp;
        assert!((0..=max).contains(hp), "{} hp {} out of range", who, hp);
    }
}
