//! In-memory session store with a single writer per session.
//!
//! A session being resolved carries a lease; a second end request that
//! observes the lease is rejected instead of queued. The resolution loop runs
//! outside the store lock, so sessions never block one another.
//!
//! Terminal sessions keep only their metadata and report. At most
//! `retention` of them stay in the store; older ones are evicted and handed
//! back so their reports can age out through the report cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::combat::{Resolution, ResolveConfig, UnitSnapshot};
use crate::error::{CombatError, Result};
use crate::report::{self, CombatReport};
use crate::session::service::SideEffectReport;
use crate::session::{CombatSession, RosterOverrides, SessionStatus};

#[derive(Debug)]
struct SessionSlot {
    session: CombatSession,
    resolving: bool,
    report: Option<CombatReport>,
    side_effects: Option<SideEffectReport>,
}

/// What an end request is allowed to do with a session.
#[derive(Debug)]
pub enum ResolutionClaim {
    /// Already completed: return the report, never re-simulate.
    Cached(CombatReport),
    /// The caller holds the lease and must resolve, then commit.
    Resolve {
        pathogens: Vec<UnitSnapshot>,
        antibodies: Vec<UnitSnapshot>,
        config: ResolveConfig,
    },
}

pub const DEFAULT_SESSION_RETENTION: usize = 1_024;

#[derive(Debug)]
pub struct SessionStore {
    slots: Mutex<HashMap<String, SessionSlot>>,
    retention: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_SESSION_RETENTION)
    }
}

impl SessionStore {
    /// Store that keeps at most `retention` terminal sessions.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            retention,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, SessionSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, session: CombatSession) {
        self.slots().insert(
            session.session_id.clone(),
            SessionSlot {
                session,
                resolving: false,
                report: None,
                side_effects: None,
            },
        );
    }

    pub fn get(&self, session_id: &str) -> Option<CombatSession> {
        self.slots().get(session_id).map(|slot| slot.session.clone())
    }

    /// Run a state transition on one session under the store lock. A session
    /// left terminal by the transition is retired, even when it failed.
    pub fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut CombatSession) -> Result<R>,
    ) -> Result<R> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(session_id)
            .ok_or_else(|| CombatError::session_not_found(session_id))?;
        let outcome = f(&mut slot.session);
        slot.session.retire();
        outcome
    }

    /// Take the resolution lease, applying end-of-combat overrides first.
    pub fn claim_resolution(
        &self,
        session_id: &str,
        overrides: Option<&RosterOverrides>,
    ) -> Result<ResolutionClaim> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(session_id)
            .ok_or_else(|| CombatError::session_not_found(session_id))?;

        match slot.session.status {
            SessionStatus::Completed => {
                let report = match &slot.report {
                    Some(report) => report.clone(),
                    None => report::build(&slot.session)?,
                };
                return Ok(ResolutionClaim::Cached(report));
            }
            SessionStatus::Pending | SessionStatus::Aborted => {
                return Err(CombatError::PreconditionFailed(format!(
                    "cannot end session {session_id}: status is {}",
                    slot.session.status.label()
                )));
            }
            SessionStatus::InProgress => {}
        }
        if slot.resolving {
            return Err(CombatError::PreconditionFailed(format!(
                "session {session_id} is already being resolved"
            )));
        }
        if let Some(overrides) = overrides.filter(|o| !o.is_empty()) {
            slot.session.apply_overrides(overrides)?;
        }
        slot.resolving = true;
        Ok(ResolutionClaim::Resolve {
            pathogens: slot.session.pathogens.clone(),
            antibodies: slot.session.antibodies.clone(),
            config: slot.session.resolve_config(),
        })
    }

    /// Commit a resolution produced under the lease: InProgress → Completed.
    pub fn commit_resolution(
        &self,
        session_id: &str,
        resolution: Resolution,
    ) -> Result<CombatReport> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(session_id)
            .ok_or_else(|| CombatError::session_not_found(session_id))?;
        slot.resolving = false;
        slot.session.complete(resolution)?;
        let report = report::build(&slot.session)?;
        slot.report = Some(report.clone());
        slot.session.retire();
        Ok(report)
    }

    /// Remove the oldest terminal sessions beyond the retention bound and
    /// return the reports of the completed ones.
    pub fn evict_terminal(&self) -> Vec<CombatReport> {
        let mut slots = self.slots();
        let mut terminal: Vec<(String, Option<DateTime<Utc>>)> = slots
            .iter()
            .filter(|(_, slot)| slot.session.status.is_terminal())
            .map(|(id, slot)| (id.clone(), slot.session.ended_at))
            .collect();
        if terminal.len() <= self.retention {
            return Vec::new();
        }
        terminal.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = terminal.len() - self.retention;
        terminal
            .into_iter()
            .take(excess)
            .filter_map(|(id, _)| slots.remove(&id))
            .filter_map(|slot| slot.report)
            .collect()
    }

    pub fn report(&self, session_id: &str) -> Option<Result<CombatReport>> {
        let slots = self.slots();
        let slot = slots.get(session_id)?;
        Some(match &slot.report {
            Some(report) => Ok(report.clone()),
            None => report::build(&slot.session),
        })
    }

    pub fn record_side_effects(&self, session_id: &str, outcome: SideEffectReport) {
        if let Some(slot) = self.slots().get_mut(session_id) {
            slot.side_effects = Some(outcome);
        }
    }

    pub fn side_effects(&self, session_id: &str) -> Option<SideEffectReport> {
        self.slots()
            .get(session_id)
            .and_then(|slot| slot.side_effects.clone())
    }

    /// Completed reports of one user, newest first.
    pub fn completed_reports_for(&self, user_id: &str) -> Vec<CombatReport> {
        let mut reports: Vec<CombatReport> = self
            .slots()
            .values()
            .filter(|slot| slot.session.user_id == user_id)
            .filter_map(|slot| slot.report.clone())
            .collect();
        reports.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.combat_id.cmp(&b.combat_id))
        });
        reports
    }

    pub fn count(&self, status: SessionStatus) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.session.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
