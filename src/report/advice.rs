//! Tactical suggestions derived from a finished report. Every matching rule
//! contributes one line; a sparse report simply yields fewer lines.

use crate::combat::{CombatOutcome, SideProfile};
use crate::report::CombatReport;

pub const ADVICE_REINFORCE_ATTACK: &str =
    "Pathogen attack outpaced your antibodies: reinforce attack power before the next engagement.";
pub const ADVICE_FASTER_ABILITIES: &str =
    "The combat ran to the round cap: field units with faster-resolving special abilities.";
pub const ADVICE_MATCHUP_COVERAGE: &str =
    "Defeat: re-evaluate type-matchup coverage against the pathogen categories you faced.";

pub fn advise(report: &CombatReport) -> Vec<String> {
    let mut advice = Vec::new();

    let pathogen_attack = SideProfile::of(&report.roster.pathogens).total_attack;
    let antibody_attack = SideProfile::of(&report.roster.antibodies).total_attack;
    if pathogen_attack > antibody_attack {
        advice.push(ADVICE_REINFORCE_ATTACK.to_string());
    }
    if report.max_rounds > 0 && report.rounds >= report.max_rounds {
        advice.push(ADVICE_FASTER_ABILITIES.to_string());
    }
    if report.result == CombatOutcome::Defeat {
        advice.push(ADVICE_MATCHUP_COVERAGE.to_string());
    }

    advice
}
