//! combat_sim - Runs a seeded encounter with combat_core and prints the log
//!
//! The encounter file is a roster (`[[combatants]]`) plus `[[tactics]]`
//! tables saying which side each combatant fights for and which moves it
//! tries, in order of preference.

use anyhow::{Context, Result};
use clap::Parser;
use combat_core::{
    config::{default_moves, load_constants, load_move_configs, CombatConstants},
    error::CombatError,
    moves::{MoveCatalog, PhaseEvent, PhaseEventKind},
    session::CombatSession,
    store::{CombatantStore, InMemoryStore},
    types::{CombatantId, ResourceKind},
    AttackMode, InitiativeState, TurnAdvance,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ENCOUNTER: &str = include_str!("../config/encounter.toml");

/// Run a turn-based encounter
#[derive(Parser, Debug)]
#[command(name = "combat_sim")]
#[command(about = "Simulate a turn-based encounter", long_about = None)]
#[command(version)]
struct Args {
    /// Encounter file (roster plus tactics); the bundled one if omitted
    #[arg(short, long)]
    encounter: Option<PathBuf>,

    /// Move catalogue; the bundled defaults if omitted
    #[arg(short, long)]
    moves: Option<PathBuf>,

    /// Combat constants TOML
    #[arg(short, long)]
    constants: Option<PathBuf>,

    /// Seed for dice and target choice
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    /// Stop after this many rounds
    #[arg(short, long, default_value_t = 6)]
    rounds: u32,

    /// Write the final session snapshot as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct EncounterFile {
    #[serde(default)]
    tactics: Vec<Tactic>,
}

/// Side and move preference for one combatant
#[derive(Debug, Clone, Deserialize)]
struct Tactic {
    combatant: String,
    side: String,
    #[serde(default = "default_tactic_moves")]
    moves: Vec<String>,
}

fn default_tactic_moves() -> Vec<String> {
    vec!["strike".to_string()]
}

struct Encounter {
    session: CombatSession<InMemoryStore>,
    catalog: MoveCatalog,
    tactics: HashMap<CombatantId, Tactic>,
    rng: ChaCha8Rng,
}

impl Encounter {
    fn side_of(&self, combatant: &CombatantId) -> Option<&str> {
        self.tactics.get(combatant).map(|t| t.side.as_str())
    }

    /// Living combatants not on `combatant`'s side
    fn enemies_of(&self, combatant: &CombatantId) -> Vec<CombatantId> {
        let side = self.side_of(combatant);
        self.session
            .store()
            .ids()
            .into_iter()
            .filter(|other| self.side_of(other) != side && self.session.store().can_act(other))
            .collect()
    }

    fn sides_standing(&self) -> usize {
        let mut sides: Vec<&str> = self
            .session
            .store()
            .ids()
            .iter()
            .filter(|c| self.session.store().can_act(c))
            .filter_map(|c| self.side_of(c))
            .collect();
        sides.sort_unstable();
        sides.dedup();
        sides.len()
    }

    /// Refill action stars at the start of the combatant's turn
    fn refresh_stars(&self, combatant: &CombatantId) {
        let Some(stars) = self.session.store().get_resource(combatant, ResourceKind::Stars) else {
            return;
        };
        if stars.current < stars.max {
            if let Err(err) = self
                .session
                .store()
                .mutate_resource(combatant, ResourceKind::Stars, stars.max - stars.current)
            {
                warn!(combatant = %combatant, error = %err, "could not refresh stars");
            }
        }
    }

    fn take_turn(&mut self, turn: &TurnAdvance) {
        let actor = &turn.actor;
        let Some(tactic) = self.tactics.get(actor).cloned() else {
            println!("  {} has no orders and waits", actor);
            return;
        };

        let enemies = self.enemies_of(actor);
        let Some(focus) = enemies.choose(&mut self.rng).cloned() else {
            return;
        };

        for move_id in &tactic.moves {
            let definition = match self.catalog.require(move_id) {
                Ok(definition) => definition,
                Err(err) => {
                    warn!(combatant = %actor, error = %err, "tactic names an unknown move");
                    continue;
                }
            };

            let targets = match &definition.attack {
                Some(attack) if attack.mode == AttackMode::Multi => enemies.clone(),
                Some(_) => vec![focus.clone()],
                None => Vec::new(),
            };

            match self
                .session
                .create_move_effect(definition, actor, targets, turn.round)
            {
                Ok(activation) => {
                    println!("  {} uses {}", actor, definition.name);
                    activation.events.iter().for_each(report_event);
                    return;
                }
                Err(err @ CombatError::InsufficientResources { .. })
                | Err(err @ CombatError::StateTransition { .. }) => {
                    info!(combatant = %actor, move_id = %move_id, reason = %err, "move skipped");
                }
                Err(err) => {
                    warn!(combatant = %actor, move_id = %move_id, error = %err, "move failed");
                }
            }
        }

        println!("  {} has nothing left to do", actor);
    }
}

fn report_event(event: &PhaseEvent) {
    match &event.kind {
        PhaseEventKind::Entered { from: Some(_), to } => {
            println!("  {}'s {} is now {}", event.owner, event.move_id, to);
        }
        PhaseEventKind::Entered { from: None, .. } => {}
        PhaseEventKind::Triggered { result: Some(Ok(outcomes)) } => {
            for outcome in outcomes {
                match outcome {
                    Ok(result) => println!("    {}", result.summary()),
                    Err(err) => println!("    {}", err),
                }
            }
        }
        PhaseEventKind::Triggered { result: Some(Err(err)) } => {
            println!("    {} fizzles: {}", event.move_id, err);
        }
        PhaseEventKind::Triggered { result: None } => {}
        PhaseEventKind::Cancelled { from } => {
            println!("  {}'s {} was cancelled while {}", event.owner, event.move_id, from);
        }
    }
}

fn print_status(session: &CombatSession<InMemoryStore>) {
    println!("\nStatus:");
    for id in session.store().ids() {
        let Some(record) = session.store().record(&id) else {
            continue;
        };
        let mut parts = vec![format!("HP {}/{}", record.hp, record.max_hp)];
        if record.temp_hp > 0 {
            parts.push(format!("temp {}", record.temp_hp));
        }
        if record.max_mp > 0 {
            parts.push(format!("MP {}/{}", record.mp, record.max_mp));
        }
        let state = if record.hp == 0 { " (down)" } else { "" };
        println!("  {:<12} {}{}", record.name, parts.join(", "), state);
    }
}

fn run(args: &Args) -> Result<()> {
    let text = match &args.encounter {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading encounter {}", path.display()))?,
        None => DEFAULT_ENCOUNTER.to_string(),
    };
    let store = InMemoryStore::parse_roster(&text).context("parsing roster")?;
    let encounter_file: EncounterFile = toml::from_str(&text).context("parsing tactics")?;

    let catalog = match &args.moves {
        Some(path) => load_move_configs(path).with_context(|| format!("loading moves {}", path.display()))?,
        None => default_moves(),
    };
    let constants = match &args.constants {
        Some(path) => load_constants(path).with_context(|| format!("loading constants {}", path.display()))?,
        None => CombatConstants::default(),
    };

    let tactics = encounter_file
        .tactics
        .into_iter()
        .map(|t| (CombatantId::new(t.combatant.as_str()), t))
        .collect();

    let mut encounter = Encounter {
        session: CombatSession::seeded(store, constants, args.seed),
        catalog,
        tactics,
        rng: ChaCha8Rng::seed_from_u64(args.seed.wrapping_add(1)),
    };

    let ids = encounter.session.store().ids();
    let (mut state, rolls): (InitiativeState, _) = encounter.session.roll_initiative(&ids);
    info!(combatants = ids.len(), seed = args.seed, "encounter started");

    println!("Initiative:");
    for roll in &rolls {
        println!("  {:<12} {}", roll.combatant, roll.roll.breakdown);
    }

    while let Some(turn) = encounter.session.advance_turn(&mut state) {
        if turn.round > args.rounds {
            break;
        }
        if turn.round_incremented {
            println!("\n=== Round {} ===", turn.round);
        }

        println!("{}'s turn", turn.actor);
        encounter.refresh_stars(&turn.actor);
        for event in encounter.session.advance_owner_effects(&turn.actor, turn.round) {
            report_event(&event);
        }

        if encounter.session.store().can_act(&turn.actor) {
            encounter.take_turn(&turn);
        }
        encounter.session.tick_roll_modifiers(&turn.actor);

        if encounter.sides_standing() <= 1 {
            println!("\nThe fight is over after round {}", turn.round);
            break;
        }
    }

    print_status(&encounter.session);

    if let Some(path) = &args.snapshot {
        let json = serde_json::to_string_pretty(&encounter.session.snapshot())?;
        fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "combat_sim=info,combat_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    run(&args)
}
