//! Combat session lifecycle.
//!
//! ```text
//! Pending ──begin──▶ InProgress ──complete──▶ Completed
//!    │                   │
//!    └──────abort────────┴──────────────────▶ Aborted
//! ```
//!
//! Completed and Aborted are terminal: every further transition is rejected
//! with `PreconditionFailed` and leaves the session untouched.

pub mod cache;
pub mod service;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combat::{
    validate_roster, CombatOutcome, DamageEvent, Resolution, ResolveConfig, Side, SideHealth,
    SideProfile, UnitSnapshot, MAX_ROUNDS_LIMIT,
};
use crate::error::{CombatError, Result};

pub use cache::ReportCache;
pub use service::{
    CombatService, EndCombatResult, ForecastRequest, SideEffectHandle, SideEffectReport,
    StartCombatRequest,
};
pub use store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Health values reported by the client at the end of a combat, applied to
/// the captured snapshots before resolution. Keyed by unit id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterOverrides {
    #[serde(default)]
    pub health: BTreeMap<String, u32>,
}

impl RosterOverrides {
    pub fn is_empty(&self) -> bool {
        self.health.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub session_id: String,
    pub user_id: String,
    pub base_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub seed: u64,
    pub max_rounds: u32,
    pub pathogens: Vec<UnitSnapshot>,
    pub antibodies: Vec<UnitSnapshot>,
    pub log: Vec<DamageEvent>,
    pub rounds: u32,
    pub final_health: Option<SideHealth>,
    pub outcome: Option<CombatOutcome>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CombatSession {
    pub fn new(
        user_id: &str,
        base_id: &str,
        pathogens: Vec<UnitSnapshot>,
        antibodies: Vec<UnitSnapshot>,
        seed: u64,
        max_rounds: u32,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            base_id: base_id.to_string(),
            status: SessionStatus::Pending,
            abort_reason: None,
            seed,
            max_rounds: max_rounds.clamp(1, MAX_ROUNDS_LIMIT),
            pathogens,
            antibodies,
            log: Vec::new(),
            rounds: 0,
            final_health: None,
            outcome: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    fn require(&self, expected: SessionStatus, action: &str) -> Result<()> {
        if self.status == expected {
            return Ok(());
        }
        Err(CombatError::PreconditionFailed(format!(
            "cannot {action} session {}: status is {}",
            self.session_id,
            self.status.label()
        )))
    }

    /// Checks rosters and snapshot invariants, then the host base.
    pub fn validate_inputs(&self, base_valid: bool) -> Result<()> {
        validate_roster(Side::Pathogens, &self.pathogens)?;
        validate_roster(Side::Antibodies, &self.antibodies)?;
        for (side, roster) in [
            (Side::Pathogens, &self.pathogens),
            (Side::Antibodies, &self.antibodies),
        ] {
            if SideProfile::of(roster).pooled_health == 0 {
                return Err(CombatError::InvalidInput(format!(
                    "{} roster has no health to commit",
                    side.label()
                )));
            }
        }
        if !base_valid {
            return Err(CombatError::InvalidInput(format!(
                "base {} is not a valid host: needs at least one defense and level >= 1",
                self.base_id
            )));
        }
        Ok(())
    }

    /// Pending → InProgress, or Pending → Aborted when validation fails. The
    /// validation error is returned after the abort is recorded.
    pub fn begin(&mut self, base_valid: bool) -> Result<()> {
        self.require(SessionStatus::Pending, "begin")?;
        if let Err(err) = self.validate_inputs(base_valid) {
            self.abort(&err.to_string())?;
            return Err(err);
        }
        self.status = SessionStatus::InProgress;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn abort(&mut self, reason: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CombatError::PreconditionFailed(format!(
                "cannot abort session {}: status is {}",
                self.session_id,
                self.status.label()
            )));
        }
        self.status = SessionStatus::Aborted;
        self.abort_reason = Some(reason.to_string());
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn has_unit(&self, id: &str) -> bool {
        self.pathogens
            .iter()
            .chain(&self.antibodies)
            .any(|u| u.id == id)
    }

    /// Replace captured health values before resolution. Every id must belong
    /// to one of the rosters; values are clamped to max health.
    pub fn apply_overrides(&mut self, overrides: &RosterOverrides) -> Result<()> {
        self.require(SessionStatus::InProgress, "override")?;
        if let Some(unknown) = overrides.health.keys().find(|id| !self.has_unit(id)) {
            return Err(CombatError::InvalidInput(format!(
                "override references unit {unknown} which is not in this session"
            )));
        }
        let derive = |roster: &[UnitSnapshot]| -> Vec<UnitSnapshot> {
            roster
                .iter()
                .map(|u| match overrides.health.get(&u.id) {
                    Some(&health) => u.with_health(health),
                    None => u.clone(),
                })
                .collect()
        };
        self.pathogens = derive(&self.pathogens);
        self.antibodies = derive(&self.antibodies);
        Ok(())
    }

    pub fn resolve_config(&self) -> ResolveConfig {
        ResolveConfig {
            max_rounds: self.max_rounds,
            seed: self.seed,
        }
    }

    /// InProgress → Completed with the loop's result.
    pub fn complete(&mut self, resolution: Resolution) -> Result<()> {
        self.require(SessionStatus::InProgress, "complete")?;
        self.log = resolution.events;
        self.rounds = resolution.rounds;
        self.final_health = Some(resolution.final_health);
        self.outcome = Some(resolution.outcome);
        self.status = SessionStatus::Completed;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Drop rosters and damage log of a terminal session. The report holds
    /// the persisted copies; live sessions are left untouched.
    pub fn retire(&mut self) {
        if !self.status.is_terminal() {
            return;
        }
        self.pathogens = Vec::new();
        self.antibodies = Vec::new();
        self.log = Vec::new();
    }
}
