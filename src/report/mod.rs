//! Combat reports and reward tiers derived from completed sessions.
//!
//! A report is built once from a `Completed` session and is read-only
//! afterwards. Building is a pure function of the session: the same session
//! always renders to the same report.

pub mod advice;
pub mod chronicle;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combat::{CombatOutcome, DamageEvent, Side, UnitSnapshot};
use crate::error::{CombatError, Result};
use crate::session::{CombatSession, SessionStatus};

pub use advice::advise;
pub use chronicle::{narrate, templated_chronicle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub pathogens: Vec<UnitSnapshot>,
    pub antibodies: Vec<UnitSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatReport {
    pub combat_id: String,
    pub user_id: String,
    pub base_id: String,
    pub date: DateTime<Utc>,
    pub result: CombatOutcome,
    pub log: Vec<String>,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub units_deployed: Vec<String>,
    pub units_lost: Vec<String>,
    pub rounds: u32,
    pub max_rounds: u32,
    pub roster: RosterSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardTier {
    pub credits: u32,
    pub energy: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTable {
    pub victory: RewardTier,
    pub draw: RewardTier,
    pub defeat: RewardTier,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            victory: RewardTier {
                credits: 100,
                energy: 50,
            },
            draw: RewardTier {
                credits: 40,
                energy: 20,
            },
            defeat: RewardTier {
                credits: 10,
                energy: 5,
            },
        }
    }
}

impl RewardTable {
    pub const fn tier(&self, outcome: CombatOutcome) -> RewardTier {
        match outcome {
            CombatOutcome::Victory => self.victory,
            CombatOutcome::Draw => self.draw,
            CombatOutcome::Defeat => self.defeat,
        }
    }
}

impl RewardTier {
    pub const fn for_outcome(outcome: CombatOutcome, table: &RewardTable) -> Self {
        table.tier(outcome)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RoundTotals {
    antibodies: u64,
    pathogens: u64,
}

fn totals_by_round(events: &[DamageEvent]) -> BTreeMap<u32, RoundTotals> {
    let mut rounds: BTreeMap<u32, RoundTotals> = BTreeMap::new();
    for event in events {
        let entry = rounds.entry(event.round).or_default();
        match event.source_side() {
            Some(Side::Antibodies) => entry.antibodies += event.applied_damage as u64,
            Some(Side::Pathogens) => entry.pathogens += event.applied_damage as u64,
            None => {}
        }
    }
    rounds
}

/// One line per round: "Round N: antibodies deal X, pathogens deal Y".
pub fn render_log(events: &[DamageEvent]) -> Vec<String> {
    totals_by_round(events)
        .into_iter()
        .map(|(round, totals)| {
            format!(
                "Round {round}: antibodies deal {}, pathogens deal {}",
                totals.antibodies, totals.pathogens
            )
        })
        .collect()
}

pub fn build(session: &CombatSession) -> Result<CombatReport> {
    if session.status != SessionStatus::Completed {
        return Err(CombatError::PreconditionFailed(format!(
            "session {} is {}, report requires completed",
            session.session_id,
            session.status.label()
        )));
    }
    let (Some(outcome), Some(final_health), Some(ended_at)) =
        (session.outcome, session.final_health, session.ended_at)
    else {
        return Err(CombatError::PreconditionFailed(format!(
            "session {} is completed without a resolution",
            session.session_id
        )));
    };

    let totals = totals_by_round(&session.log);
    let damage_dealt = totals.values().map(|t| t.antibodies).sum();
    let damage_taken = totals.values().map(|t| t.pathogens).sum();

    let ids = |roster: &[UnitSnapshot]| roster.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
    let mut units_deployed = ids(&session.antibodies);
    units_deployed.extend(ids(&session.pathogens));

    // pool model: a drained side loses every unit together
    let mut units_lost = Vec::new();
    if final_health.antibodies == 0 {
        units_lost.extend(ids(&session.antibodies));
    }
    if final_health.pathogens == 0 {
        units_lost.extend(ids(&session.pathogens));
    }

    Ok(CombatReport {
        combat_id: session.session_id.clone(),
        user_id: session.user_id.clone(),
        base_id: session.base_id.clone(),
        date: ended_at,
        result: outcome,
        log: render_log(&session.log),
        damage_dealt,
        damage_taken,
        units_deployed,
        units_lost,
        rounds: session.rounds,
        max_rounds: session.max_rounds,
        roster: RosterSnapshot {
            pathogens: session.pathogens.clone(),
            antibodies: session.antibodies.clone(),
        },
    })
}
