//! In-process collaborators: a JSON catalog of units and bases, a ledger, a
//! report archive, an offline narrator and a recording notifier.
//!
//! Archive, ledger and narrator carry failure switches so partial-success and
//! fallback paths can be driven from tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    BaseRegistry, CollaboratorResult, EntityDirectory, NarrativeGenerator, Notifier,
    ProgressionLedger, ReportArchive,
};
use crate::combat::{Side, UnitRecord};
use crate::error::CollaboratorError;
use crate::report::chronicle::NarrativeSummary;
use crate::report::{CombatReport, RewardTier};

fn lock<T>(mutex: &Mutex<T>) -> CollaboratorResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| CollaboratorError::Unavailable(format!("lock poisoned: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    pub id: String,
    pub defenses: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub pathogens: Vec<UnitRecord>,
    #[serde(default)]
    pub antibodies: Vec<UnitRecord>,
    #[serde(default)]
    pub bases: Vec<BaseRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_catalog(path: &str) -> Result<Catalog, CatalogError> {
    let raw = fs::read_to_string(Path::new(path)).map_err(|source| CatalogError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Entity directory and base registry over one catalog.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    units: HashMap<(Side, String), UnitRecord>,
    bases: HashMap<String, BaseRecord>,
}

impl InMemoryDirectory {
    pub fn new(catalog: Catalog) -> Self {
        let tagged = catalog
            .pathogens
            .into_iter()
            .map(|u| (Side::Pathogens, u))
            .chain(catalog.antibodies.into_iter().map(|u| (Side::Antibodies, u)));
        Self {
            units: tagged.map(|(side, u)| ((side, u.id.clone()), u)).collect(),
            bases: catalog.bases.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }
}

#[async_trait]
impl EntityDirectory for InMemoryDirectory {
    async fn lookup(&self, side: Side, id: &str) -> CollaboratorResult<UnitRecord> {
        self.units
            .get(&(side, id.to_string()))
            .cloned()
            .ok_or_else(|| CollaboratorError::Missing(format!("{} unit {id}", side.label())))
    }
}

#[async_trait]
impl BaseRegistry for InMemoryDirectory {
    async fn is_valid_base(&self, base_id: &str) -> CollaboratorResult<bool> {
        Ok(self
            .bases
            .get(base_id)
            .is_some_and(|b| b.defenses >= 1 && b.level >= 1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Account {
    pub credits: u64,
    pub energy: u64,
    pub counters: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    applied: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    failing: AtomicBool,
}

impl InMemoryLedger {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn account(&self, user_id: &str) -> Account {
        lock(&self.state)
            .ok()
            .and_then(|state| state.accounts.get(user_id).cloned())
            .unwrap_or_default()
    }

    fn check_available(&self) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("ledger offline".to_string()));
        }
        Ok(())
    }

    /// Applies `update` once per (combat id, operation) key.
    fn apply_once(
        &self,
        user_id: &str,
        key: (String, String),
        update: impl FnOnce(&mut Account),
    ) -> CollaboratorResult<()> {
        self.check_available()?;
        let mut state = lock(&self.state)?;
        if !state.applied.insert(key) {
            return Ok(());
        }
        update(state.accounts.entry(user_id.to_string()).or_default());
        Ok(())
    }
}

#[async_trait]
impl ProgressionLedger for InMemoryLedger {
    async fn credit_reward(
        &self,
        user_id: &str,
        combat_id: &str,
        reward: RewardTier,
    ) -> CollaboratorResult<()> {
        self.apply_once(
            user_id,
            (combat_id.to_string(), "reward".to_string()),
            |account| {
                account.credits += reward.credits as u64;
                account.energy += reward.energy as u64;
            },
        )
    }

    async fn increment_counter(
        &self,
        user_id: &str,
        combat_id: &str,
        counter: &str,
    ) -> CollaboratorResult<()> {
        self.apply_once(
            user_id,
            (combat_id.to_string(), format!("counter:{counter}")),
            |account| *account.counters.entry(counter.to_string()).or_default() += 1,
        )
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArchive {
    reports: Mutex<HashMap<String, CombatReport>>,
    failing: AtomicBool,
    loads: AtomicUsize,
}

impl InMemoryArchive {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `load` calls served, used to observe the report cache.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.reports).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, report: CombatReport) {
        if let Ok(mut reports) = lock(&self.reports) {
            reports.insert(report.combat_id.clone(), report);
        }
    }
}

#[async_trait]
impl ReportArchive for InMemoryArchive {
    async fn save(&self, report: &CombatReport) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("archive offline".to_string()));
        }
        lock(&self.reports)?.insert(report.combat_id.clone(), report.clone());
        Ok(())
    }

    async fn load(&self, combat_id: &str) -> CollaboratorResult<Option<CombatReport>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("archive offline".to_string()));
        }
        Ok(lock(&self.reports)?.get(combat_id).cloned())
    }
}

/// No external text generator configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl NarrativeGenerator for OfflineNarrator {
    async fn generate(&self, _summary: &NarrativeSummary) -> CollaboratorResult<String> {
        Err(CollaboratorError::Unavailable(
            "no narrative generator configured".to_string(),
        ))
    }
}

/// Returns fixed text after an optional delay, or fails on demand.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNarrator {
    pub text: String,
    pub delay: Duration,
    pub fail: bool,
}

#[async_trait]
impl NarrativeGenerator for ScriptedNarrator {
    async fn generate(&self, summary: &NarrativeSummary) -> CollaboratorResult<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(CollaboratorError::Unavailable("narrator refused".to_string()));
        }
        Ok(format!("{} ({})", self.text, summary.combat_id))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> CollaboratorResult<()> {
        lock(&self.sent)?.push((user_id.to_string(), message.to_string()));
        Ok(())
    }
}
