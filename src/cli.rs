use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::combat::{
    events_to_csv, resolve, run_forecast, Category, CombatOutcome, ResolveConfig, SideHealth,
    UnitSnapshot, DEFAULT_FORECAST_ITERATIONS, DEFAULT_MAX_ROUNDS,
};
use crate::config::{bind_addr, EngineConfig};
use crate::report::render_log;
use crate::server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Simulate,
    Forecast,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("simulate") => Some(Command::Simulate),
        Some("forecast") => Some(Command::Forecast),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Forecast) => handle_forecast(args),
        None => {
            eprintln!("usage: bioclash <serve|simulate|forecast>");
            2
        }
    }
}

fn handle_serve() -> i32 {
    let config = EngineConfig::load_default();
    match server::run_server(&bind_addr(), config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn demo_unit(id: &str, category: Category, health: u32, attack: u32, defense: u32) -> UnitSnapshot {
    UnitSnapshot {
        id: id.to_string(),
        category,
        health,
        max_health: health,
        attack_power: attack,
        defense,
        accuracy: 85,
        evasion: 10,
        special_modifiers: BTreeMap::new(),
    }
}

/// Fixed skirmish used by `simulate` and `forecast`: a viral swarm against
/// a mixed antibody squad.
pub fn demo_rosters() -> (Vec<UnitSnapshot>, Vec<UnitSnapshot>) {
    let pathogens = vec![
        demo_unit("influenza", Category::Viral, 90, 22, 2),
        demo_unit("rhinovirus", Category::Viral, 60, 18, 1),
        demo_unit("staph", Category::Bacterial, 110, 20, 4),
    ];
    let antibodies = vec![
        demo_unit("interferon", Category::Energy, 100, 26, 3),
        demo_unit("macrophage", Category::Physical, 130, 20, 5),
    ];
    (pathogens, antibodies)
}

#[derive(Debug, Serialize)]
struct SimulationSummary {
    seed: u64,
    max_rounds: u32,
    outcome: CombatOutcome,
    rounds: u32,
    initial_health: SideHealth,
    final_health: SideHealth,
    event_count: usize,
    log: Vec<String>,
}

fn handle_simulate(args: &[String]) -> i32 {
    let max_rounds = parse_u32_arg(args.get(2), "max_rounds", DEFAULT_MAX_ROUNDS);
    let seed = parse_u64_arg(args.get(3), "seed", 7);
    let as_csv = args.iter().any(|arg| arg == "--csv");

    let (pathogens, antibodies) = demo_rosters();
    let resolution = resolve(&pathogens, &antibodies, ResolveConfig { max_rounds, seed });

    if as_csv {
        return match events_to_csv(&resolution.events) {
            Ok(csv) => {
                print!("{csv}");
                0
            }
            Err(err) => {
                eprintln!("failed to export damage log: {err}");
                1
            }
        };
    }

    let summary = SimulationSummary {
        seed,
        max_rounds: resolution.max_rounds,
        outcome: resolution.outcome,
        rounds: resolution.rounds,
        initial_health: resolution.initial_health,
        final_health: resolution.final_health,
        event_count: resolution.events.len(),
        log: render_log(&resolution.events),
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize simulation result: {err}");
            1
        }
    }
}

fn handle_forecast(args: &[String]) -> i32 {
    let iterations = parse_u32_arg(args.get(2), "iterations", DEFAULT_FORECAST_ITERATIONS);
    let seed = parse_u64_arg(args.get(3), "seed", 7);
    let max_rounds = EngineConfig::load_default().max_rounds;

    let (pathogens, antibodies) = demo_rosters();
    let forecast = run_forecast(&pathogens, &antibodies, max_rounds, iterations, seed);
    match serde_json::to_string_pretty(&forecast) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize forecast: {err}");
            1
        }
    }
}

fn parse_u32_arg(raw: Option<&String>, name: &str, default: u32) -> u32 {
    raw.filter(|value| !value.starts_with("--"))
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw.filter(|value| !value.starts_with("--")) {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.filter(|value| !value.starts_with("--"))
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw.filter(|value| !value.starts_with("--")) {
                let mut msg = String::new();
                let _ = write!(&mut msg, "invalid {name} '{value}', defaulting to {default}");
                eprintln!("{msg}");
            }
            default
        })
}
