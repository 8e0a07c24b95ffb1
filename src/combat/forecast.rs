//! Outcome preview over many seeded resolutions.
//!
//! Iteration `i` resolves with seed `seed + i`, so a forecast is reproducible
//! for a fixed seed. Iterations are spread across cores with Rayon; the
//! tallies do not depend on scheduling order.

use rayon::prelude::*;
use serde::Serialize;

use crate::combat::engine::{resolve, CombatOutcome, ResolveConfig};
use crate::combat::snapshot::UnitSnapshot;

pub const DEFAULT_FORECAST_ITERATIONS: u32 = 1_000;
pub const MAX_FORECAST_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub iterations: u32,
    pub seed: u64,
    pub victory_rate: f64,
    pub defeat_rate: f64,
    pub draw_rate: f64,
    pub avg_rounds: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    victories: u32,
    defeats: u32,
    draws: u32,
    rounds: u64,
}

impl Tally {
    fn record(mut self, outcome: CombatOutcome, rounds: u32) -> Self {
        match outcome {
            CombatOutcome::Victory => self.victories += 1,
            CombatOutcome::Defeat => self.defeats += 1,
            CombatOutcome::Draw => self.draws += 1,
        }
        self.rounds += rounds as u64;
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            victories: self.victories + other.victories,
            defeats: self.defeats + other.defeats,
            draws: self.draws + other.draws,
            rounds: self.rounds + other.rounds,
        }
    }
}

pub fn run_forecast(
    pathogens: &[UnitSnapshot],
    antibodies: &[UnitSnapshot],
    max_rounds: u32,
    iterations: u32,
    seed: u64,
) -> Forecast {
    let iterations = iterations.clamp(1, MAX_FORECAST_ITERATIONS);
    let tally = (0..iterations)
        .into_par_iter()
        .map(|i| {
            let resolution = resolve(
                pathogens,
                antibodies,
                ResolveConfig {
                    max_rounds,
                    seed: seed.wrapping_add(i as u64),
                },
            );
            Tally::default().record(resolution.outcome, resolution.rounds)
        })
        .reduce(Tally::default, Tally::merge);

    let n = iterations as f64;
    Forecast {
        iterations,
        seed,
        victory_rate: tally.victories as f64 / n,
        defeat_rate: tally.defeats as f64 / n,
        draw_rate: tally.draws as f64 / n,
        avg_rounds: tally.rounds as f64 / n,
    }
}
