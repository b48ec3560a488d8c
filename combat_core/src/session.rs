//! CombatSession - Per-encounter engine state
//!
//! Holds every piece of mutable engine state for one encounter: each
//! combatant's modifier stack and move-use counters, the live move effects,
//! and the die source. Character data stays in the store.
//!
//! Locking: each combatant has its own slot mutex. Resource check-and-deduct
//! and modifier-stack resolution happen while holding the owning
//! combatant's slot. The effect table and the die source are leaf locks and
//! are never held while a slot is being acquired.

use crate::combat::{self, AttackParameters, TargetOutcome};
use crate::config::CombatConstants;
use crate::dice::{evaluate, parse_with_limits, DieRoller, ResolvedRoll, RngRoller};
use crate::error::{CombatError, CostKind, Shortfall};
use crate::initiative::{roll_initiative, InitiativeRoll, InitiativeState, TurnAdvance};
use crate::modifier::{ModifierStack, RollModifierEffect};
use crate::moves::{MoveDefinition, MoveEffect, PhaseEvent, PhaseEventKind};
use crate::store::{CombatantStore, StatContext, StoreError};
use crate::types::{CombatantId, EffectId, ResourceKind};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine state owned by one combatant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSlot {
    pub modifiers: ModifierStack,
    /// Activations per move id
    pub move_uses: BTreeMap<String, u32>,
}

/// Serializable copy of a session's own state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub combatants: BTreeMap<CombatantId, CombatantSlot>,
    pub effects: Vec<MoveEffect>,
    pub next_effect_id: u64,
}

/// A freshly created move effect and what happened on activation
#[derive(Debug, Clone, PartialEq)]
pub struct MoveActivation {
    pub effect: MoveEffect,
    pub events: Vec<PhaseEvent>,
}

pub struct CombatSession<S: CombatantStore> {
    store: S,
    constants: CombatConstants,
    roller: Mutex<Box<dyn DieRoller + Send>>,
    slots: RwLock<HashMap<CombatantId, Arc<Mutex<CombatantSlot>>>>,
    effects: Mutex<BTreeMap<EffectId, MoveEffect>>,
    next_effect_id: AtomicU64,
}

impl<S: CombatantStore> CombatSession<S> {
    pub fn new(store: S, constants: CombatConstants, roller: impl DieRoller + Send + 'static) -> Self {
        CombatSession {
            store,
            constants,
            roller: Mutex::new(Box::new(roller)),
            slots: RwLock::new(HashMap::new()),
            effects: Mutex::new(BTreeMap::new()),
            next_effect_id: AtomicU64::new(1),
        }
    }

    /// Session whose dice are reproducible for `seed`
    pub fn seeded(store: S, constants: CombatConstants, seed: u64) -> Self {
        Self::new(store, constants, RngRoller::seeded(seed))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn constants(&self) -> &CombatConstants {
        &self.constants
    }

    /// Swap the die source
    pub fn set_roller(&self, roller: impl DieRoller + Send + 'static) {
        *self.roller.lock() = Box::new(roller);
    }

    fn slot(&self, combatant: &CombatantId) -> Arc<Mutex<CombatantSlot>> {
        if let Some(slot) = self.slots.read().get(combatant) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(combatant.clone()).or_default())
    }

    // === Rolls and modifiers ===

    /// Resolve a free-form roll for a combatant, folding in their modifier stack
    pub fn resolve_roll(&self, combatant: &CombatantId, expression: &str) -> Result<ResolvedRoll, CombatError> {
        let expr = parse_with_limits(expression, &self.constants.dice)?;

        let slot = self.slot(combatant);
        let mut slot = slot.lock();
        let augmented = slot.modifiers.resolve(&expr);

        let context = StatContext::new(&self.store, combatant);
        let mut roller = self.roller.lock();
        Ok(evaluate(&augmented.expression, &context, &mut *roller))
    }

    pub fn apply_roll_modifier(&self, combatant: &CombatantId, effect: RollModifierEffect) {
        debug!(combatant = %combatant, source = %effect.source, kind = ?effect.kind, "roll modifier applied");
        self.slot(combatant).lock().modifiers.apply(effect);
    }

    /// Remove every modifier from `source`; returns how many were removed
    pub fn clear_roll_modifiers(&self, combatant: &CombatantId, source: &str) -> usize {
        self.slot(combatant).lock().modifiers.clear_source(source)
    }

    /// End-of-turn countdown for timed modifiers; returns the expired ones
    pub fn tick_roll_modifiers(&self, combatant: &CombatantId) -> Vec<RollModifierEffect> {
        self.slot(combatant).lock().modifiers.tick_turn_end()
    }

    pub fn roll_modifiers(&self, combatant: &CombatantId) -> Vec<RollModifierEffect> {
        self.slot(combatant).lock().modifiers.effects().to_vec()
    }

    // === Attacks ===

    /// Resolve an attack with the attacker's modifier stack
    pub fn process_attack(&self, params: &AttackParameters) -> Result<Vec<TargetOutcome>, CombatError> {
        let slot = self.slot(&params.attacker);
        let mut slot = slot.lock();
        let mut roller = self.roller.lock();
        combat::process_attack(
            params,
            Some(&mut slot.modifiers),
            &self.store,
            &mut *roller,
            &self.constants,
        )
    }

    // === Moves ===

    /// Pay for and activate a move
    ///
    /// Uses and every positive cost are checked, then deducted, while the
    /// owner's slot is held. A deduction that still fails rolls back what was
    /// already paid. Negative costs are granted afterwards.
    pub fn create_move_effect(
        &self,
        definition: &MoveDefinition,
        owner: &CombatantId,
        targets: Vec<CombatantId>,
        round: u32,
    ) -> Result<MoveActivation, CombatError> {
        if self.store.get_resource(owner, ResourceKind::Hp).is_none() {
            return Err(CombatError::invalid_target(owner, "not in combat"));
        }

        let slot = self.slot(owner);
        let mut slot = slot.lock();

        if let Some(live) = self
            .effects
            .lock()
            .values()
            .find(|e| &e.owner == owner && e.move_id == definition.id && !e.is_expired())
        {
            return Err(live.transition_error("activate again"));
        }

        let used = slot.move_uses.get(&definition.id).copied().unwrap_or(0);
        if let Some(max_uses) = definition.uses {
            if used >= max_uses {
                return Err(CombatError::InsufficientResources {
                    combatant: owner.clone(),
                    shortfall: Shortfall {
                        cost: CostKind::Uses,
                        required: 1,
                        available: 0,
                    },
                });
            }
        }

        let costs = definition.cost.entries();
        for &(kind, amount) in costs.iter().filter(|(_, amount)| *amount > 0) {
            let available = self
                .store
                .get_resource(owner, kind)
                .map(|pool| pool.current)
                .unwrap_or(0);
            if available < amount {
                return Err(insufficient(owner, kind, amount, available));
            }
        }

        let mut paid = Vec::new();
        for &(kind, amount) in costs.iter().filter(|(_, amount)| *amount > 0) {
            match self.store.mutate_resource(owner, kind, -amount) {
                Ok(_) => paid.push((kind, amount)),
                Err(err) => {
                    self.refund(owner, &paid);
                    return Err(match err {
                        StoreError::Underflow { available, .. } => insufficient(owner, kind, amount, available),
                        other => CombatError::invalid_target(owner, other.to_string()),
                    });
                }
            }
        }

        for &(kind, amount) in costs.iter().filter(|(_, amount)| *amount < 0) {
            if let Err(err) = self.store.mutate_resource(owner, kind, -amount) {
                warn!(combatant = %owner, kind = %kind, error = %err, "move gain not applied");
            }
        }

        *slot.move_uses.entry(definition.id.clone()).or_insert(0) += 1;

        let id = EffectId(self.next_effect_id.fetch_add(1, Ordering::Relaxed));
        let (effect, events) = MoveEffect::activate(id, definition, owner.clone(), targets, round);
        self.effects.lock().insert(id, effect.clone());
        drop(slot);

        info!(combatant = %owner, move_id = %definition.id, effect = %id, phase = %effect.phase, "move activated");

        let events = self.run_triggers(&effect, events);
        Ok(MoveActivation { effect, events })
    }

    /// Handle the owner's turn start for one effect
    pub fn advance_move_phase(&self, effect_id: EffectId, round: u32) -> Result<Vec<PhaseEvent>, CombatError> {
        let (effect, events) = {
            let mut effects = self.effects.lock();
            let effect = effects
                .get_mut(&effect_id)
                .ok_or(CombatError::UnknownEffect(effect_id))?;
            let events = effect.on_turn_start(round)?;
            (effect.clone(), events)
        };

        Ok(self.run_triggers(&effect, events))
    }

    /// Advance every live effect owned by `owner`
    pub fn advance_owner_effects(&self, owner: &CombatantId, round: u32) -> Vec<PhaseEvent> {
        let ids: Vec<EffectId> = self
            .effects
            .lock()
            .values()
            .filter(|e| &e.owner == owner && !e.is_expired())
            .map(|e| e.id)
            .collect();

        let mut events = Vec::new();
        for id in ids {
            match self.advance_move_phase(id, round) {
                Ok(mut advanced) => events.append(&mut advanced),
                Err(err) => debug!(effect = %id, error = %err, "effect not advanced"),
            }
        }
        events
    }

    /// Force an effect to expire; its cost is not refunded
    pub fn cancel_move_effect(&self, effect_id: EffectId, round: u32) -> Result<PhaseEvent, CombatError> {
        let mut effects = self.effects.lock();
        let effect = effects
            .get_mut(&effect_id)
            .ok_or(CombatError::UnknownEffect(effect_id))?;
        effect.cancel(round)
    }

    pub fn effect(&self, effect_id: EffectId) -> Option<MoveEffect> {
        self.effects.lock().get(&effect_id).cloned()
    }

    /// Effects owned by a combatant, expired ones included
    pub fn effects_of(&self, owner: &CombatantId) -> Vec<MoveEffect> {
        self.effects
            .lock()
            .values()
            .filter(|e| &e.owner == owner)
            .cloned()
            .collect()
    }

    /// Drop expired effects; returns how many were removed
    pub fn prune_expired(&self) -> usize {
        let mut effects = self.effects.lock();
        let before = effects.len();
        effects.retain(|_, e| !e.is_expired());
        before - effects.len()
    }

    /// Activations left for a limited move, `None` if unlimited
    pub fn uses_remaining(&self, owner: &CombatantId, definition: &MoveDefinition) -> Option<u32> {
        let used = self
            .slot(owner)
            .lock()
            .move_uses
            .get(&definition.id)
            .copied()
            .unwrap_or(0);
        definition.uses.map(|max| max.saturating_sub(used))
    }

    fn refund(&self, owner: &CombatantId, paid: &[(ResourceKind, i32)]) {
        for &(kind, amount) in paid {
            if let Err(err) = self.store.mutate_resource(owner, kind, amount) {
                warn!(combatant = %owner, kind = %kind, error = %err, "rollback failed");
            }
        }
    }

    fn run_triggers(&self, effect: &MoveEffect, events: Vec<PhaseEvent>) -> Vec<PhaseEvent> {
        events
            .into_iter()
            .map(|mut event| {
                if let PhaseEventKind::Triggered { result } = &mut event.kind {
                    if let Some(template) = &effect.attack {
                        let params = template.to_parameters(
                            &effect.owner,
                            &effect.targets,
                            &self.store,
                            self.constants.attack.default_crit_range,
                        );
                        let outcome = self.process_attack(&params);
                        if let Err(err) = &outcome {
                            warn!(effect = %effect.id, move_id = %effect.move_id, error = %err, "move trigger failed");
                        }
                        *result = Some(outcome);
                    }
                }
                event
            })
            .collect()
    }

    // === Initiative ===

    /// Roll initiative for the given combatants
    pub fn roll_initiative(&self, combatants: &[CombatantId]) -> (InitiativeState, Vec<InitiativeRoll>) {
        let mut roller = self.roller.lock();
        roll_initiative(combatants, &self.store, &mut *roller)
    }

    /// Move to the next combatant who can act
    pub fn advance_turn(&self, state: &mut InitiativeState) -> Option<TurnAdvance> {
        let turn = state.advance(|c| self.store.can_act(c));
        if let Some(turn) = &turn {
            debug!(actor = %turn.actor, round = turn.round, "turn advanced");
        }
        turn
    }

    // === Snapshots ===

    pub fn snapshot(&self) -> SessionSnapshot {
        let combatants = self
            .slots
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.lock().clone()))
            .collect();

        SessionSnapshot {
            combatants,
            effects: self.effects.lock().values().cloned().collect(),
            next_effect_id: self.next_effect_id.load(Ordering::Relaxed),
        }
    }

    /// Replace the session's state with a snapshot
    pub fn restore(&self, snapshot: SessionSnapshot) {
        let slots = snapshot
            .combatants
            .into_iter()
            .map(|(id, slot)| (id, Arc::new(Mutex::new(slot))))
            .collect();
        *self.slots.write() = slots;

        let max_id = snapshot.effects.iter().map(|e| e.id.0).max().unwrap_or(0);
        *self.effects.lock() = snapshot.effects.into_iter().map(|e| (e.id, e)).collect();
        self.next_effect_id
            .store(snapshot.next_effect_id.max(max_id + 1), Ordering::Relaxed);
    }
}

fn insufficient(owner: &CombatantId, kind: ResourceKind, required: i32, available: i32) -> CombatError {
    CombatError::InsufficientResources {
        combatant: owner.clone(),
        shortfall: Shortfall {
            cost: CostKind::Resource(kind),
            required,
            available,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedRoller;
    use crate::moves::{AttackTemplate, MovePhase, RollTiming};
    use crate::store::{CombatantRecord, InMemoryStore};
    use crate::types::{DamageType, StatTag};

    fn id(s: &str) -> CombatantId {
        CombatantId::new(s)
    }

    fn setup(faces: impl IntoIterator<Item = u32>) -> CombatSession<InMemoryStore> {
        let store = InMemoryStore::with_records([
            CombatantRecord::new("mage", 12, 20)
                .with_stat(StatTag::Intelligence, 16)
                .with_mp(10)
                .with_stars(3),
            CombatantRecord::new("orc", 13, 30).with_resistance(DamageType::Fire, 50),
        ]);
        CombatSession::new(store, CombatConstants::default(), ScriptedRoller::new(faces))
    }

    fn bolt() -> MoveDefinition {
        MoveDefinition::new("bolt", "Bolt")
            .with_cost(ResourceKind::Mp, 4)
            .with_cost(ResourceKind::Stars, 1)
            .with_attack(AttackTemplate {
                roll: Some("1d20+int".to_string()),
                damage: Some("2d6 fire".to_string()),
                ..Default::default()
            })
    }

    fn pool(session: &CombatSession<InMemoryStore>, kind: ResourceKind) -> i32 {
        session.store().get_resource(&id("mage"), kind).unwrap().current
    }

    #[test]
    fn test_activation_deducts_and_triggers() {
        let session = setup([12, 4, 5]);
        let activation = session.create_move_effect(&bolt(), &id("mage"), vec![id("orc")], 1).unwrap();

        assert_eq!(activation.effect.phase, MovePhase::Active);
        assert_eq!(pool(&session, ResourceKind::Mp), 6);
        assert_eq!(pool(&session, ResourceKind::Stars), 2);

        let trigger = activation.events.iter().find(|e| e.is_trigger()).unwrap();
        let PhaseEventKind::Triggered { result: Some(Ok(outcomes)) } = &trigger.kind else {
            panic!("expected trigger outcome");
        };
        let result = outcomes[0].as_ref().unwrap();
        assert!(result.hit());
        assert_eq!(result.total_damage, 4);
    }

    #[test]
    fn test_insufficient_resources_changes_nothing() {
        let session = setup([]);
        let expensive = bolt().with_cost(ResourceKind::Mp, 11);

        let err = session
            .create_move_effect(&expensive, &id("mage"), vec![id("orc")], 1)
            .unwrap_err();

        assert!(matches!(
            err,
            CombatError::InsufficientResources {
                shortfall: Shortfall { required: 11, available: 10, .. },
                ..
            }
        ));
        assert_eq!(pool(&session, ResourceKind::Mp), 10);
        assert_eq!(pool(&session, ResourceKind::Stars), 3);
        assert!(session.effects_of(&id("mage")).is_empty());
    }

    #[test]
    fn test_uses_are_limited() {
        let session = setup([]);
        let shield = MoveDefinition::new("shield", "Shield").with_uses(1);

        session.create_move_effect(&shield, &id("mage"), Vec::new(), 1).unwrap();
        session.advance_owner_effects(&id("mage"), 2);
        assert_eq!(session.uses_remaining(&id("mage"), &shield), Some(0));

        let err = session.create_move_effect(&shield, &id("mage"), Vec::new(), 3).unwrap_err();
        assert!(matches!(
            err,
            CombatError::InsufficientResources { shortfall: Shortfall { cost: CostKind::Uses, .. }, .. }
        ));
    }

    #[test]
    fn test_live_move_cannot_be_reactivated() {
        let session = setup([]);
        let ward = MoveDefinition::new("ward", "Ward").with_timing(0, 2, 1);

        session.create_move_effect(&ward, &id("mage"), Vec::new(), 1).unwrap();
        let err = session.create_move_effect(&ward, &id("mage"), Vec::new(), 1).unwrap_err();
        assert!(matches!(err, CombatError::StateTransition { phase: MovePhase::Active, .. }));
    }

    #[test]
    fn test_negative_cost_is_gain() {
        let session = setup([]);
        session.store().mutate_resource(&id("mage"), ResourceKind::Hp, -10).unwrap();
        let heal = MoveDefinition::new("heal", "Heal")
            .with_cost(ResourceKind::Mp, 3)
            .with_cost(ResourceKind::Hp, -8);

        session.create_move_effect(&heal, &id("mage"), Vec::new(), 1).unwrap();
        assert_eq!(pool(&session, ResourceKind::Hp), 18);
        assert_eq!(pool(&session, ResourceKind::Mp), 7);
    }

    #[test]
    fn test_cancel_keeps_cost_and_blocks_advance() {
        let session = setup([]);
        let slow = bolt().with_timing(2, 1, 0);

        let activation = session.create_move_effect(&slow, &id("mage"), vec![id("orc")], 1).unwrap();
        let effect_id = activation.effect.id;
        session.cancel_move_effect(effect_id, 1).unwrap();

        assert_eq!(pool(&session, ResourceKind::Mp), 6);
        assert!(matches!(
            session.advance_move_phase(effect_id, 2),
            Err(CombatError::StateTransition { .. })
        ));
        assert_eq!(session.effect(effect_id).unwrap().phase, MovePhase::Expired);
    }

    #[test]
    fn test_per_turn_move_triggers_each_turn() {
        let session = setup([1, 1, 1]);
        let aura = MoveDefinition::new("aura", "Aura")
            .with_timing(0, 2, 0)
            .with_roll_timing(RollTiming::PerTurn)
            .with_attack(AttackTemplate {
                damage: Some("1d4 fire".to_string()),
                ..Default::default()
            });

        let activation = session.create_move_effect(&aura, &id("mage"), vec![id("orc")], 1).unwrap();
        let events = session.advance_owner_effects(&id("mage"), 2);
        assert!(events.iter().any(PhaseEvent::is_trigger));

        let events = session.advance_owner_effects(&id("mage"), 3);
        assert!(!events.iter().any(PhaseEvent::is_trigger));
        assert_eq!(session.effect(activation.effect.id).unwrap().phase, MovePhase::Expired);
        assert_eq!(session.prune_expired(), 1);
    }

    #[test]
    fn test_resolve_roll_consumes_next_roll_only() {
        let session = setup([10, 10]);
        session.apply_roll_modifier(&id("mage"), RollModifierEffect::bonus("guidance", 2).next_roll_only());

        assert_eq!(session.resolve_roll(&id("mage"), "1d20+int").unwrap().total, 15);
        assert_eq!(session.resolve_roll(&id("mage"), "1d20+int").unwrap().total, 13);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let session = setup([12, 4, 5]);
        session.apply_roll_modifier(&id("mage"), RollModifierEffect::advantage("hidden"));
        session.create_move_effect(&bolt().with_timing(1, 1, 0), &id("mage"), vec![id("orc")], 1).unwrap();

        let snapshot = session.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);

        let other = setup([]);
        other.restore(restored);
        assert_eq!(other.roll_modifiers(&id("mage")).len(), 1);
        assert_eq!(other.effects_of(&id("mage")).len(), 1);

        let next = other
            .create_move_effect(&MoveDefinition::new("ward", "Ward"), &id("mage"), Vec::new(), 1)
            .unwrap();
        assert_eq!(next.effect.id, EffectId(2));
    }

    #[test]
    fn test_advance_turn_skips_downed() {
        let session = setup([]);
        let mut state = InitiativeState::new(vec![id("mage"), id("orc")]);
        session.store().mutate_resource(&id("orc"), ResourceKind::Hp, -30).unwrap();

        assert_eq!(session.advance_turn(&mut state).unwrap().actor, id("mage"));
        let turn = session.advance_turn(&mut state).unwrap();
        assert_eq!(turn.actor, id("mage"));
        assert!(turn.round_incremented);
    }
}
