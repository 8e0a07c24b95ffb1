//! Per-combatant values captured once at combat start.
//!
//! The resolution loop only ever reads [UnitSnapshot]s; live entity state is
//! never consulted mid-combat. Special modifiers are folded into the effective
//! stats at capture time (same layering as a pre-combat bonus profile).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::effectiveness::Category;
use crate::error::{CombatError, Result};

pub const MAX_PERCENT: u32 = 100;

/// The two opposing sides of a combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Pathogens,
    Antibodies,
}

impl Side {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pathogens => "pathogens",
            Self::Antibodies => "antibodies",
        }
    }

    pub const fn opponent(self) -> Self {
        match self {
            Self::Pathogens => Self::Antibodies,
            Self::Antibodies => Self::Pathogens,
        }
    }
}

/// Entity record as handed over by the entity directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: String,
    pub category: Category,
    pub health: u32,
    pub max_health: u32,
    pub attack_power: u32,
    pub defense: u32,
    pub accuracy: u32,
    pub evasion: u32,
    #[serde(default)]
    pub special_modifiers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: String,
    pub category: Category,
    pub health: u32,
    pub max_health: u32,
    pub attack_power: u32,
    pub defense: u32,
    pub accuracy: u32,
    pub evasion: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub special_modifiers: BTreeMap<String, f64>,
}

fn modifier(modifiers: &BTreeMap<String, f64>, key: &str) -> f64 {
    modifiers.get(key).copied().unwrap_or(0.0)
}

fn apply_additive(base: u32, bonus: f64) -> u32 {
    (base as f64 + bonus).round().max(0.0) as u32
}

impl UnitSnapshot {
    /// Capture effective stats from a directory record.
    /// Keys: attack_power (multiplier bonus), defense, accuracy, evasion (additive).
    /// Accuracy and evasion are clamped to [0, 100], health to max health.
    pub fn capture(record: &UnitRecord) -> Self {
        let mods = &record.special_modifiers;
        let attack_factor = (1.0 + modifier(mods, "attack_power")).max(0.0);
        Self {
            id: record.id.clone(),
            category: record.category,
            health: record.health.min(record.max_health),
            max_health: record.max_health,
            attack_power: (record.attack_power as f64 * attack_factor).round() as u32,
            defense: apply_additive(record.defense, modifier(mods, "defense")),
            accuracy: apply_additive(record.accuracy, modifier(mods, "accuracy")).min(MAX_PERCENT),
            evasion: apply_additive(record.evasion, modifier(mods, "evasion")).min(MAX_PERCENT),
            special_modifiers: mods.clone(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CombatError::InvalidInput("unit id must not be empty".to_string()));
        }
        if self.health > self.max_health {
            return Err(CombatError::InvalidInput(format!(
                "unit {}: health {} exceeds max health {}",
                self.id, self.health, self.max_health
            )));
        }
        if self.accuracy > MAX_PERCENT || self.evasion > MAX_PERCENT {
            return Err(CombatError::InvalidInput(format!(
                "unit {}: accuracy and evasion must be within 0..=100",
                self.id
            )));
        }
        Ok(())
    }

    /// New snapshot with a replaced health value, clamped to max health.
    pub fn with_health(&self, health: u32) -> Self {
        Self {
            health: health.min(self.max_health),
            ..self.clone()
        }
    }
}

pub fn validate_roster(side: Side, roster: &[UnitSnapshot]) -> Result<()> {
    if roster.is_empty() {
        return Err(CombatError::InvalidInput(format!(
            "{} roster must not be empty",
            side.label()
        )));
    }
    roster.iter().try_for_each(UnitSnapshot::validate)
}

/// Pool-model summary of one roster: one health total and averaged defensive stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideProfile {
    pub pooled_health: u32,
    pub live_units: usize,
    pub total_attack: u64,
    pub mean_defense: u32,
    pub mean_evasion: u32,
}

impl SideProfile {
    pub fn of(roster: &[UnitSnapshot]) -> Self {
        let live: Vec<&UnitSnapshot> = roster.iter().filter(|u| u.is_alive()).collect();
        let pooled_health = live
            .iter()
            .fold(0u32, |acc, u| acc.saturating_add(u.health));
        let total_attack = live.iter().map(|u| u.attack_power as u64).sum();
        let mean = |f: fn(&UnitSnapshot) -> u32| -> u32 {
            if live.is_empty() {
                0
            } else {
                let sum: u64 = live.iter().map(|u| f(u) as u64).sum();
                (sum as f64 / live.len() as f64).round() as u32
            }
        };
        Self {
            pooled_health,
            live_units: live.len(),
            total_attack,
            mean_defense: mean(|u| u.defense),
            mean_evasion: mean(|u| u.evasion),
        }
    }
}
