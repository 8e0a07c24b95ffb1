pub mod effectiveness;
pub mod engine;
pub mod export_csv;
pub mod forecast;
pub mod rng;
pub mod snapshot;

pub use effectiveness::{multiplier, side_multiplier, Category};
pub use engine::{
    applied_damage, check_max_rounds, hit_probability, resolve, resolve_phase, CombatOutcome,
    DamageEvent, PhaseDamage, Resolution, ResolveConfig, SideHealth, DEFAULT_MAX_ROUNDS,
    MAX_ROUNDS_LIMIT, VARIANCE_HIGH, VARIANCE_LOW,
};
pub use export_csv::{events_to_csv, ExportError};
pub use forecast::{
    run_forecast, Forecast, DEFAULT_FORECAST_ITERATIONS, MAX_FORECAST_ITERATIONS,
};
pub use rng::{entropy_seed, Rng};
pub use snapshot::{validate_roster, Side, SideProfile, UnitRecord, UnitSnapshot};
