//! Narrative rendering of a completed report.
//!
//! External generation is best-effort: it runs under a time budget and any
//! failure or timeout falls back to the local template. Errors never leave
//! this module.

use std::time::Duration;

use serde::Serialize;

use crate::collaborators::NarrativeGenerator;
use crate::combat::CombatOutcome;
use crate::error::CombatError;
use crate::report::CombatReport;

/// Structured input handed to the narrative generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSummary {
    pub combat_id: String,
    pub base_id: String,
    pub result: CombatOutcome,
    pub rounds: u32,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub antibodies_fielded: usize,
    pub pathogens_fielded: usize,
    pub units_lost: usize,
    pub log: Vec<String>,
}

impl NarrativeSummary {
    pub fn from_report(report: &CombatReport) -> Self {
        Self {
            combat_id: report.combat_id.clone(),
            base_id: report.base_id.clone(),
            result: report.result,
            rounds: report.rounds,
            damage_dealt: report.damage_dealt,
            damage_taken: report.damage_taken,
            antibodies_fielded: report.roster.antibodies.len(),
            pathogens_fielded: report.roster.pathogens.len(),
            units_lost: report.units_lost.len(),
            log: report.log.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChronicleSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chronicle {
    pub text: String,
    pub source: ChronicleSource,
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn templated_chronicle(report: &CombatReport) -> String {
    let rounds = report.rounds;
    let opening = format!(
        "At base {}, {} antibod{} met {} pathogen{}.",
        report.base_id,
        report.roster.antibodies.len(),
        if report.roster.antibodies.len() == 1 { "y" } else { "ies" },
        report.roster.pathogens.len(),
        if report.roster.pathogens.len() == 1 { "" } else { "s" },
    );
    let closing = match report.result {
        CombatOutcome::Victory => format!(
            "The defenders purged the infection in {rounds} round{}.",
            plural(rounds)
        ),
        CombatOutcome::Defeat => format!(
            "The pathogens overran the defenses after {rounds} round{}.",
            plural(rounds)
        ),
        CombatOutcome::Draw => format!(
            "Neither side prevailed after {rounds} round{}.",
            plural(rounds)
        ),
    };
    let tally = format!(
        "Antibodies dealt {} damage and took {}; {} unit{} fell.",
        report.damage_dealt,
        report.damage_taken,
        report.units_lost.len(),
        plural(report.units_lost.len() as u32)
    );
    [opening, tally, closing].join(" ")
}

/// Ask the generator for narrative text within `budget`, else use the template.
pub async fn narrate(
    report: &CombatReport,
    generator: &dyn NarrativeGenerator,
    budget: Duration,
) -> Chronicle {
    let summary = NarrativeSummary::from_report(report);
    let failure = match tokio::time::timeout(budget, generator.generate(&summary)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => {
            return Chronicle {
                text,
                source: ChronicleSource::Generated,
            }
        }
        Ok(Ok(_)) => CombatError::BestEffortFailure("narrative generator returned no text".to_string()),
        Ok(Err(err)) => CombatError::BestEffortFailure(err.to_string()),
        Err(_) => CombatError::BestEffortFailure(format!(
            "narrative generator exceeded {} ms",
            budget.as_millis()
        )),
    };
    tracing::warn!(
        combat_id = %report.combat_id,
        error = %failure,
        "narrative generation failed, using template"
    );
    Chronicle {
        text: templated_chronicle(report),
        source: ChronicleSource::Template,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::collaborators::memory::{OfflineNarrator, ScriptedNarrator};
    use crate::report::RosterSnapshot;

    fn report(result: CombatOutcome, rounds: u32) -> CombatReport {
        CombatReport {
            combat_id: "c7".to_string(),
            user_id: "u1".to_string(),
            base_id: "thymus".to_string(),
            date: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            result,
            log: vec!["Round 1: antibodies deal 40, pathogens deal 10".to_string()],
            damage_dealt: 40,
            damage_taken: 10,
            units_deployed: vec!["a1".to_string(), "p1".to_string()],
            units_lost: vec!["p1".to_string()],
            rounds,
            max_rounds: 10,
            roster: RosterSnapshot {
                pathogens: Vec::new(),
                antibodies: Vec::new(),
            },
        }
    }

    #[test]
    fn template_mentions_outcome_and_totals() {
        let text = templated_chronicle(&report(CombatOutcome::Victory, 1));
        assert!(text.contains("thymus"));
        assert!(text.contains("purged the infection in 1 round."));
        assert!(text.contains("dealt 40 damage and took 10; 1 unit fell."));
    }

    #[tokio::test]
    async fn generated_text_is_used_when_available() {
        let narrator = ScriptedNarrator {
            text: "A saga".to_string(),
            ..ScriptedNarrator::default()
        };
        let chronicle = narrate(
            &report(CombatOutcome::Draw, 10),
            &narrator,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(chronicle.source, ChronicleSource::Generated);
        assert_eq!(chronicle.text, "A saga (c7)");
    }

    #[tokio::test]
    async fn failure_falls_back_to_template() {
        let chronicle = narrate(
            &report(CombatOutcome::Defeat, 4),
            &OfflineNarrator,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(chronicle.source, ChronicleSource::Template);
        assert!(chronicle.text.contains("overran the defenses after 4 rounds."));
    }

    #[tokio::test]
    async fn slow_generator_falls_back_to_template() {
        let narrator = ScriptedNarrator {
            text: "late".to_string(),
            delay: Duration::from_secs(5),
            fail: false,
        };
        let chronicle = narrate(
            &report(CombatOutcome::Victory, 2),
            &narrator,
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(chronicle.source, ChronicleSource::Template);
    }
}
