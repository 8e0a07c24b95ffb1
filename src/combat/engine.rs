//! Round-based resolution loop over two pooled rosters.
//!
//! Each round is a simultaneous exchange: both phases read the start-of-round
//! pools, the antibody phase event is logged first, then the pathogen phase.
//! The loop stops when a pool is drained or the round cap is reached and
//! never fails.

use serde::{Deserialize, Serialize};

use crate::combat::effectiveness::side_multiplier;
use crate::combat::rng::Rng;
use crate::combat::snapshot::{Side, SideProfile, UnitSnapshot};
use crate::error::{CombatError, Result};

pub const DEFAULT_MAX_ROUNDS: u32 = 10;
/// Hard ceiling on the round cap, whatever the caller asks for.
pub const MAX_ROUNDS_LIMIT: u32 = 1_000;
pub const VARIANCE_LOW: f64 = 0.85;
pub const VARIANCE_HIGH: f64 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Draw,
}

impl CombatOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Victory => "victory",
            Self::Defeat => "defeat",
            Self::Draw => "draw",
        }
    }

    /// Outcome from the antibody side's point of view. Simultaneous zero-out
    /// and cap exhaustion are both draws; remaining health is never compared.
    pub const fn from_pools(pathogen_health: u32, antibody_health: u32) -> Self {
        match (pathogen_health == 0, antibody_health == 0) {
            (true, false) => Self::Victory,
            (false, true) => Self::Defeat,
            _ => Self::Draw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub round: u32,
    pub source_id: String,
    pub target_id: String,
    pub raw_damage: f64,
    pub applied_damage: u32,
    pub hit: bool,
}

impl DamageEvent {
    pub fn source_side(&self) -> Option<Side> {
        match self.source_id.as_str() {
            "antibodies" => Some(Side::Antibodies),
            "pathogens" => Some(Side::Pathogens),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideHealth {
    pub pathogens: u32,
    pub antibodies: u32,
}

impl SideHealth {
    pub const fn of(&self, side: Side) -> u32 {
        match side {
            Side::Pathogens => self.pathogens,
            Side::Antibodies => self.antibodies,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveConfig {
    pub max_rounds: u32,
    pub seed: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: CombatOutcome,
    pub events: Vec<DamageEvent>,
    pub initial_health: SideHealth,
    pub final_health: SideHealth,
    pub rounds: u32,
    pub max_rounds: u32,
}

impl Resolution {
    pub fn cap_reached(&self) -> bool {
        self.rounds >= self.max_rounds
    }
}

/// Accept a caller-supplied round cap only within `[1, MAX_ROUNDS_LIMIT]`.
pub fn check_max_rounds(max_rounds: u32) -> Result<u32> {
    if (1..=MAX_ROUNDS_LIMIT).contains(&max_rounds) {
        return Ok(max_rounds);
    }
    Err(CombatError::InvalidInput(format!(
        "max_rounds must be between 1 and {MAX_ROUNDS_LIMIT}, got {max_rounds}"
    )))
}

/// Outcome of one attacking side's phase against the opposing pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseDamage {
    pub raw: f64,
    pub applied: u32,
    pub hit: bool,
}

/// Hit chance in percent: accuracy minus target evasion, clamped to [0, 100].
pub fn hit_probability(accuracy: u32, target_evasion: u32) -> f64 {
    (accuracy as f64 - target_evasion as f64).clamp(0.0, 100.0)
}

/// Post-mitigation damage of one hit, rounded before subtraction and floored at 0.
pub fn applied_damage(attack_power: u32, multiplier: f64, variance: f64, target_defense: u32) -> u32 {
    let scaled = (attack_power as f64 * multiplier * variance).round();
    (scaled - target_defense as f64).max(0.0) as u32
}

/// Resolve every live attacker independently against the defending side's profile.
pub fn resolve_phase(
    attackers: &[UnitSnapshot],
    defenders: &[UnitSnapshot],
    target: &SideProfile,
    rng: &mut Rng,
) -> PhaseDamage {
    let mut phase = PhaseDamage {
        raw: 0.0,
        applied: 0,
        hit: false,
    };
    for attacker in attackers.iter().filter(|u| u.is_alive()) {
        let chance = hit_probability(attacker.accuracy, target.mean_evasion);
        let roll = rng.roll_percent();
        // variance is drawn on every swing so the stream does not depend on hit order
        let variance = rng.variance(VARIANCE_LOW, VARIANCE_HIGH);
        if roll >= chance {
            continue;
        }
        let multiplier = side_multiplier(
            attacker.category,
            defenders.iter().filter(|u| u.is_alive()).map(|u| u.category),
        );
        phase.hit = true;
        phase.raw += attacker.attack_power as f64 * multiplier * variance;
        phase.applied = phase.applied.saturating_add(applied_damage(
            attacker.attack_power,
            multiplier,
            variance,
            target.mean_defense,
        ));
    }
    phase
}

fn phase_event(round: u32, side: Side, damage: PhaseDamage) -> DamageEvent {
    DamageEvent {
        round,
        source_id: side.label().to_string(),
        target_id: side.opponent().label().to_string(),
        raw_damage: damage.raw,
        applied_damage: damage.applied,
        hit: damage.hit,
    }
}

pub fn resolve(
    pathogens: &[UnitSnapshot],
    antibodies: &[UnitSnapshot],
    config: ResolveConfig,
) -> Resolution {
    let max_rounds = config.max_rounds.clamp(1, MAX_ROUNDS_LIMIT);
    let mut rng = Rng::new(config.seed);

    let pathogen_profile = SideProfile::of(pathogens);
    let antibody_profile = SideProfile::of(antibodies);
    let initial_health = SideHealth {
        pathogens: pathogen_profile.pooled_health,
        antibodies: antibody_profile.pooled_health,
    };
    let mut pools = initial_health;
    let mut events = Vec::with_capacity(max_rounds as usize * 2);
    let mut rounds = 0;

    for round in 1..=max_rounds {
        if pools.pathogens == 0 || pools.antibodies == 0 {
            break;
        }
        rounds = round;

        let antibody_phase = resolve_phase(antibodies, pathogens, &pathogen_profile, &mut rng);
        let pathogen_phase = resolve_phase(pathogens, antibodies, &antibody_profile, &mut rng);

        pools.pathogens = pools.pathogens.saturating_sub(antibody_phase.applied);
        pools.antibodies = pools.antibodies.saturating_sub(pathogen_phase.applied);

        events.push(phase_event(round, Side::Antibodies, antibody_phase));
        events.push(phase_event(round, Side::Pathogens, pathogen_phase));

        tracing::trace!(
            round,
            pathogen_pool = pools.pathogens,
            antibody_pool = pools.antibodies,
            "round resolved"
        );
    }

    Resolution {
        outcome: CombatOutcome::from_pools(pools.pathogens, pools.antibodies),
        events,
        initial_health,
        final_health: pools,
        rounds,
        max_rounds,
    }
}
