//! Seams to the systems around the combat core: entity lookup, base checks,
//! the user ledger, report persistence, narrative text and notifications.
//!
//! The core only depends on these traits. [memory] provides in-process
//! implementations used by the binary and the test suites.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::combat::{Side, UnitRecord};
use crate::error::CollaboratorError;
use crate::report::chronicle::NarrativeSummary;
use crate::report::{CombatReport, RewardTier};

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Snapshot-compatible record for a pathogen or antibody; `Missing` if absent.
    async fn lookup(&self, side: Side, id: &str) -> CollaboratorResult<UnitRecord>;
}

#[async_trait]
pub trait BaseRegistry: Send + Sync {
    /// True when the base has at least one defense and level >= 1.
    async fn is_valid_base(&self, base_id: &str) -> CollaboratorResult<bool>;
}

/// User resources and progression counters. Writes are keyed by combat id so
/// a retried side effect is applied at most once.
#[async_trait]
pub trait ProgressionLedger: Send + Sync {
    async fn credit_reward(
        &self,
        user_id: &str,
        combat_id: &str,
        reward: RewardTier,
    ) -> CollaboratorResult<()>;

    async fn increment_counter(
        &self,
        user_id: &str,
        combat_id: &str,
        counter: &str,
    ) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait ReportArchive: Send + Sync {
    async fn save(&self, report: &CombatReport) -> CollaboratorResult<()>;
    async fn load(&self, combat_id: &str) -> CollaboratorResult<Option<CombatReport>>;
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, summary: &NarrativeSummary) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str) -> CollaboratorResult<()>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn EntityDirectory>,
    pub bases: Arc<dyn BaseRegistry>,
    pub ledger: Arc<dyn ProgressionLedger>,
    pub archive: Arc<dyn ReportArchive>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// In-process collaborators around one catalog. Narrative generation is
    /// offline, so chronicles always use the local template.
    pub fn in_memory(catalog: memory::Catalog) -> Self {
        let directory = Arc::new(memory::InMemoryDirectory::new(catalog));
        Self {
            directory: directory.clone(),
            bases: directory,
            ledger: Arc::new(memory::InMemoryLedger::default()),
            archive: Arc::new(memory::InMemoryArchive::default()),
            narrator: Arc::new(memory::OfflineNarrator),
            notifier: Arc::new(memory::RecordingNotifier::default()),
        }
    }
}
