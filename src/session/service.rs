//! Public operations of the combat core, independent of transport.
//!
//! Side effects of a completed combat (archive, reward, progression,
//! notification) start only after the Completed transition has committed and
//! run in a detached task. The caller gets the report immediately and may
//! await the returned [SideEffectHandle] or drop it.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::collaborators::Collaborators;
use crate::combat::{
    check_max_rounds, entropy_seed, events_to_csv, resolve, run_forecast, validate_roster,
    CombatOutcome, ExportError, Forecast, ResolveConfig, Side, UnitSnapshot,
    DEFAULT_FORECAST_ITERATIONS,
};
use crate::config::EngineConfig;
use crate::error::{CollaboratorError, CombatError, Result};
use crate::report::chronicle::{narrate, Chronicle};
use crate::report::{advise, CombatReport, RewardTable};
use crate::session::cache::ReportCache;
use crate::session::store::{ResolutionClaim, SessionStore};
use crate::session::{CombatSession, RosterOverrides, SessionStatus};

pub const COUNTER_COMBATS: &str = "combats_completed";
pub const COUNTER_VICTORIES: &str = "victories";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCombatRequest {
    pub user_id: String,
    pub base_id: String,
    pub pathogens: Vec<String>,
    pub antibodies: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Outcome preview over catalog units. No session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub pathogens: Vec<String>,
    pub antibodies: Vec<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Result of the post-completion side effects for one combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectReport {
    pub combat_id: String,
    pub failures: Vec<CombatError>,
}

impl SideEffectReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Detached side-effect task of one `end_combat` call.
#[derive(Debug)]
pub struct SideEffectHandle {
    combat_id: String,
    task: Option<JoinHandle<SideEffectReport>>,
}

impl SideEffectHandle {
    fn none(combat_id: &str) -> Self {
        Self {
            combat_id: combat_id.to_string(),
            task: None,
        }
    }

    /// True when this call spawned side effects (false for cached replays).
    pub fn is_spawned(&self) -> bool {
        self.task.is_some()
    }

    pub async fn wait(self) -> SideEffectReport {
        let Some(task) = self.task else {
            return SideEffectReport {
                combat_id: self.combat_id,
                failures: Vec::new(),
            };
        };
        match task.await {
            Ok(report) => report,
            Err(err) => SideEffectReport {
                combat_id: self.combat_id,
                failures: vec![CombatError::DependencyUnavailable {
                    collaborator: "side effect task",
                    message: err.to_string(),
                }],
            },
        }
    }
}

#[derive(Debug)]
pub struct EndCombatResult {
    pub report: CombatReport,
    /// False when the session was already completed and the cached report was returned.
    pub resolved_now: bool,
    pub side_effects: SideEffectHandle,
}

pub struct CombatService {
    store: Arc<SessionStore>,
    collaborators: Collaborators,
    config: EngineConfig,
    cache: ReportCache,
}

fn dependency(collaborator: &'static str, err: CollaboratorError) -> CombatError {
    CombatError::DependencyUnavailable {
        collaborator,
        message: err.to_string(),
    }
}

impl CombatService {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let cache = ReportCache::new(config.report_cache_capacity, config.report_cache_ttl());
        Self {
            store: Arc::new(SessionStore::with_retention(config.session_retention)),
            collaborators,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of stored sessions currently in `status`.
    pub fn session_count(&self, status: SessionStatus) -> usize {
        self.store.count(status)
    }

    /// Evicted reports stay reachable by id through the report cache.
    fn evict_terminal(&self) {
        for report in self.store.evict_terminal() {
            tracing::debug!(combat_id = %report.combat_id, "completed session evicted from store");
            self.cache.insert(report);
        }
    }

    pub fn session(&self, session_id: &str) -> Result<CombatSession> {
        self.store
            .get(session_id)
            .ok_or_else(|| CombatError::session_not_found(session_id))
    }

    async fn capture_roster(&self, side: Side, ids: &[String]) -> Result<Vec<UnitSnapshot>> {
        let mut roster = Vec::with_capacity(ids.len());
        for id in ids {
            let record = match self.collaborators.directory.lookup(side, id).await {
                Ok(record) => record,
                Err(CollaboratorError::Missing(_)) => {
                    return Err(CombatError::NotFound {
                        what: side_entity(side),
                        id: id.clone(),
                    })
                }
                Err(err) => return Err(dependency("entity directory", err)),
            };
            roster.push(UnitSnapshot::capture(&record));
        }
        Ok(roster)
    }

    /// Capture snapshots and store a Pending session. Lookup failures leave no session behind.
    pub async fn create_session(&self, request: &StartCombatRequest) -> Result<String> {
        if request.user_id.trim().is_empty() {
            return Err(CombatError::InvalidInput("user id must not be empty".to_string()));
        }
        let pathogens = self.capture_roster(Side::Pathogens, &request.pathogens).await?;
        let antibodies = self.capture_roster(Side::Antibodies, &request.antibodies).await?;
        let seed = request.seed.unwrap_or_else(entropy_seed);
        let session = CombatSession::new(
            &request.user_id,
            &request.base_id,
            pathogens,
            antibodies,
            seed,
            self.config.max_rounds,
        );
        let session_id = session.session_id.clone();
        tracing::debug!(
            session_id = %session_id,
            user_id = %request.user_id,
            seed,
            "session created"
        );
        self.store.insert(session);
        Ok(session_id)
    }

    /// Pending → InProgress after validating rosters and the host base, or → Aborted.
    /// An unreachable base registry also aborts the session.
    pub async fn begin_session(&self, session_id: &str) -> Result<()> {
        let base_id = self.session(session_id)?.base_id;
        let outcome = match self.collaborators.bases.is_valid_base(&base_id).await {
            Ok(base_valid) => self
                .store
                .update(session_id, |session| session.begin(base_valid)),
            Err(err) => {
                let err = dependency("base registry", err);
                let reason = err.to_string();
                self.store
                    .update(session_id, |session| session.abort(&reason))?;
                Err(err)
            }
        };
        match &outcome {
            Ok(()) => tracing::info!(session_id, base_id = %base_id, "combat started"),
            Err(err) => {
                tracing::warn!(session_id, error = %err, "combat start rejected");
                self.evict_terminal();
            }
        }
        outcome
    }

    pub async fn start_combat(&self, request: StartCombatRequest) -> Result<String> {
        let session_id = self.create_session(&request).await?;
        self.begin_session(&session_id).await?;
        Ok(session_id)
    }

    pub async fn end_combat(
        &self,
        session_id: &str,
        overrides: Option<RosterOverrides>,
    ) -> Result<EndCombatResult> {
        let (pathogens, antibodies, config) =
            match self.store.claim_resolution(session_id, overrides.as_ref())? {
                ResolutionClaim::Cached(report) => {
                    tracing::debug!(session_id, "session already completed, returning cached report");
                    return Ok(EndCombatResult {
                        report,
                        resolved_now: false,
                        side_effects: SideEffectHandle::none(session_id),
                    });
                }
                ResolutionClaim::Resolve {
                    pathogens,
                    antibodies,
                    config,
                } => (pathogens, antibodies, config),
            };

        let resolution = resolve(&pathogens, &antibodies, config);
        let report = self.store.commit_resolution(session_id, resolution)?;
        self.evict_terminal();
        tracing::info!(
            session_id,
            user_id = %report.user_id,
            result = report.result.label(),
            rounds = report.rounds,
            "combat completed"
        );

        let side_effects = self.spawn_side_effects(report.clone());
        Ok(EndCombatResult {
            report,
            resolved_now: true,
            side_effects,
        })
    }

    fn spawn_side_effects(&self, report: CombatReport) -> SideEffectHandle {
        let combat_id = report.combat_id.clone();
        let collaborators = self.collaborators.clone();
        let rewards = self.config.rewards;
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            let outcome = run_side_effects(&collaborators, rewards, &report).await;
            store.record_side_effects(&report.combat_id, outcome.clone());
            outcome
        });
        SideEffectHandle {
            combat_id,
            task: Some(task),
        }
    }

    /// Re-run side effects of a completed combat. Collaborators key writes by combat id.
    pub async fn retry_side_effects(&self, session_id: &str) -> Result<SideEffectReport> {
        let report = self.get_report(session_id).await?;
        Ok(self.spawn_side_effects(report).wait().await)
    }

    /// Last recorded side-effect outcome, `None` while still running.
    pub fn side_effect_status(&self, session_id: &str) -> Result<Option<SideEffectReport>> {
        self.session(session_id)?;
        Ok(self.store.side_effects(session_id))
    }

    pub async fn get_report(&self, session_id: &str) -> Result<CombatReport> {
        if let Some(report) = self.store.report(session_id) {
            return report;
        }
        if let Some(report) = self.cache.get(session_id) {
            return Ok(report);
        }
        let archived = self
            .collaborators
            .archive
            .load(session_id)
            .await
            .map_err(|err| dependency("report archive", err))?
            .ok_or_else(|| CombatError::session_not_found(session_id))?;
        self.cache.insert(archived.clone());
        Ok(archived)
    }

    /// Completed reports of `user_id`, newest first. `page` is 1-based.
    pub fn get_history(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<CombatReport>> {
        if page == 0 {
            return Err(CombatError::InvalidInput("page starts at 1".to_string()));
        }
        let page_size = page_size.clamp(1, self.config.history_page_size_max.max(1)) as usize;
        let skip = (page as usize - 1).saturating_mul(page_size);
        Ok(self
            .store
            .completed_reports_for(user_id)
            .into_iter()
            .skip(skip)
            .take(page_size)
            .collect())
    }

    pub async fn generate_chronicle(&self, session_id: &str) -> Result<Chronicle> {
        let report = self.get_report(session_id).await?;
        Ok(narrate(
            &report,
            self.collaborators.narrator.as_ref(),
            self.config.narrative_timeout(),
        )
        .await)
    }

    /// Damage log of a completed combat as CSV, one row per event. The log is
    /// replayed from the report's rosters and the session seed.
    pub fn export_log_csv(&self, session_id: &str) -> Result<String> {
        let session = self.session(session_id)?;
        let report = self
            .store
            .report(session_id)
            .ok_or_else(|| CombatError::session_not_found(session_id))??;
        let config = ResolveConfig {
            max_rounds: report.max_rounds,
            seed: session.seed,
        };
        let replay = resolve(&report.roster.pathogens, &report.roster.antibodies, config);
        events_to_csv(&replay.events).map_err(export_failure)
    }

    pub async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
        let max_rounds = check_max_rounds(request.max_rounds.unwrap_or(self.config.max_rounds))?;
        let pathogens = self.capture_roster(Side::Pathogens, &request.pathogens).await?;
        let antibodies = self.capture_roster(Side::Antibodies, &request.antibodies).await?;
        validate_roster(Side::Pathogens, &pathogens)?;
        validate_roster(Side::Antibodies, &antibodies)?;
        let iterations = request.iterations.unwrap_or(DEFAULT_FORECAST_ITERATIONS);
        let seed = request.seed.unwrap_or_else(entropy_seed);
        tokio::task::spawn_blocking(move || {
            run_forecast(&pathogens, &antibodies, max_rounds, iterations, seed)
        })
        .await
        .map_err(|err| CombatError::DependencyUnavailable {
            collaborator: "forecast worker",
            message: err.to_string(),
        })
    }

    pub async fn get_tactical_advice(&self, session_id: &str) -> Result<Vec<String>> {
        Ok(advise(&self.get_report(session_id).await?))
    }
}

fn export_failure(err: ExportError) -> CombatError {
    CombatError::DependencyUnavailable {
        collaborator: "csv export",
        message: err.to_string(),
    }
}

fn side_entity(side: Side) -> &'static str {
    match side {
        Side::Pathogens => "pathogen",
        Side::Antibodies => "antibody",
    }
}

/// Persist, credit, count and notify concurrently; failures are logged and collected.
async fn run_side_effects(
    collaborators: &Collaborators,
    rewards: RewardTable,
    report: &CombatReport,
) -> SideEffectReport {
    let combat_id = report.combat_id.as_str();
    let user_id = report.user_id.as_str();
    let tier = rewards.tier(report.result);

    let persist = async {
        collaborators
            .archive
            .save(report)
            .await
            .map_err(|err| dependency("report archive", err))
    };
    let reward = async {
        collaborators
            .ledger
            .credit_reward(user_id, combat_id, tier)
            .await
            .map_err(|err| dependency("reward ledger", err))
    };
    let progress = async {
        let mut counters = vec![COUNTER_COMBATS];
        if report.result == CombatOutcome::Victory {
            counters.push(COUNTER_VICTORIES);
        }
        let results = join_all(
            counters
                .into_iter()
                .map(|counter| collaborators.ledger.increment_counter(user_id, combat_id, counter)),
        )
        .await;
        results
            .into_iter()
            .collect::<std::result::Result<Vec<()>, _>>()
            .map(|_| ())
            .map_err(|err| dependency("progression ledger", err))
    };
    let notify = async {
        let message = format!(
            "Combat report {combat_id} is ready: {}",
            report.result.label()
        );
        collaborators
            .notifier
            .notify(user_id, &message)
            .await
            .map_err(|err| CombatError::BestEffortFailure(format!("notification: {err}")))
    };

    let (persisted, rewarded, progressed, notified) =
        futures_util::join!(persist, reward, progress, notify);

    let failures: Vec<CombatError> = [persisted, rewarded, progressed, notified]
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect();
    for failure in &failures {
        tracing::error!(combat_id, user_id, error = %failure, "combat side effect failed");
    }
    SideEffectReport {
        combat_id: combat_id.to_string(),
        failures,
    }
}
