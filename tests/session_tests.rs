use std::sync::Arc;
use std::time::Duration;

use bioclash::collaborators::memory::{
    BaseRecord, Catalog, InMemoryArchive, InMemoryDirectory, InMemoryLedger, RecordingNotifier,
    ScriptedNarrator,
};
use async_trait::async_trait;
use bioclash::collaborators::{BaseRegistry, Collaborators, NarrativeGenerator};
use bioclash::combat::{Category, CombatOutcome, UnitRecord};
use bioclash::config::EngineConfig;
use bioclash::error::{CollaboratorError, CombatError, ErrorKind};
use bioclash::report::advice::{
    ADVICE_FASTER_ABILITIES, ADVICE_MATCHUP_COVERAGE, ADVICE_REINFORCE_ATTACK,
};
use bioclash::report::chronicle::ChronicleSource;
use bioclash::report::RewardTier;
use bioclash::session::service::{COUNTER_COMBATS, COUNTER_VICTORIES};
use bioclash::session::{CombatService, RosterOverrides, SessionStatus, StartCombatRequest};

fn record(id: &str, category: Category, health: u32, attack: u32) -> UnitRecord {
    UnitRecord {
        id: id.to_string(),
        category,
        health,
        max_health: health,
        attack_power: attack,
        defense: 2,
        accuracy: 90,
        evasion: 5,
        special_modifiers: Default::default(),
    }
}

fn catalog() -> Catalog {
    Catalog {
        pathogens: vec![
            record("flu", Category::Viral, 60, 10),
            record("mold", Category::Fungal, 70, 12),
            record("husk", Category::Bacterial, 0, 10),
            UnitRecord {
                health: 120,
                ..record("bloat", Category::Viral, 100, 10)
            },
        ],
        antibodies: vec![
            record("interferon", Category::Energy, 150, 45),
            record("macrophage", Category::Physical, 140, 30),
        ],
        bases: vec![
            BaseRecord {
                id: "thymus".to_string(),
                defenses: 2,
                level: 1,
            },
            BaseRecord {
                id: "ruin".to_string(),
                defenses: 0,
                level: 3,
            },
        ],
    }
}

struct UnreachableBases;

#[async_trait]
impl BaseRegistry for UnreachableBases {
    async fn is_valid_base(&self, _base_id: &str) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unavailable("base registry offline".to_string()))
    }
}

struct Harness {
    service: CombatService,
    ledger: Arc<InMemoryLedger>,
    archive: Arc<InMemoryArchive>,
    notifier: Arc<RecordingNotifier>,
}

fn harness_with(narrator: Arc<dyn NarrativeGenerator>, config: EngineConfig) -> Harness {
    let directory = Arc::new(InMemoryDirectory::new(catalog()));
    let ledger = Arc::new(InMemoryLedger::default());
    let archive = Arc::new(InMemoryArchive::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        directory: directory.clone(),
        bases: directory,
        ledger: ledger.clone(),
        archive: archive.clone(),
        narrator,
        notifier: notifier.clone(),
    };
    Harness {
        service: CombatService::new(collaborators, config),
        ledger,
        archive,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(ScriptedNarrator {
            fail: true,
            ..ScriptedNarrator::default()
        }),
        EngineConfig::default(),
    )
}

fn request(user: &str, seed: u64) -> StartCombatRequest {
    StartCombatRequest {
        user_id: user.to_string(),
        base_id: "thymus".to_string(),
        pathogens: vec!["flu".to_string(), "mold".to_string()],
        antibodies: vec!["interferon".to_string(), "macrophage".to_string()],
        seed: Some(seed),
    }
}

#[tokio::test]
async fn start_then_end_completes_and_credits_rewards() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 7)).await.unwrap();
    assert_eq!(h.service.session(&id).unwrap().status, SessionStatus::InProgress);

    let ended = h.service.end_combat(&id, None).await.unwrap();
    assert!(ended.resolved_now);
    assert_eq!(ended.report.combat_id, id);
    assert_eq!(ended.report.user_id, "u1");
    assert_eq!(
        ended.report.units_deployed,
        vec!["interferon", "macrophage", "flu", "mold"]
    );

    let result = ended.report.result;
    let side_effects = ended.side_effects.wait().await;
    assert!(side_effects.is_complete(), "{side_effects:?}");

    let account = h.ledger.account("u1");
    let tier = EngineConfig::default().rewards.tier(result);
    assert_eq!(account.credits, tier.credits as u64);
    assert_eq!(account.energy, tier.energy as u64);
    assert_eq!(account.counters.get(COUNTER_COMBATS), Some(&1));
    assert_eq!(
        account.counters.get(COUNTER_VICTORIES).copied().unwrap_or(0),
        u64::from(result == CombatOutcome::Victory)
    );
    assert_eq!(h.archive.len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.service.session(&id).unwrap().status, SessionStatus::Completed);
}

#[tokio::test]
async fn ending_a_pending_session_is_rejected() {
    let h = harness();
    let id = h.service.create_session(&request("u1", 1)).await.unwrap();
    let err = h.service.end_combat(&id, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(h.service.session(&id).unwrap().status, SessionStatus::Pending);
}

#[tokio::test]
async fn re_ending_returns_the_cached_report_without_side_effects() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 3)).await.unwrap();
    let first = h.service.end_combat(&id, None).await.unwrap();
    let first_report = first.report.clone();
    first.side_effects.wait().await;

    let second = h.service.end_combat(&id, None).await.unwrap();
    assert!(!second.resolved_now);
    assert!(!second.side_effects.is_spawned());
    assert_eq!(second.report, first_report);
    assert_eq!(h.ledger.account("u1").counters.get(COUNTER_COMBATS), Some(&1));
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn completed_sessions_keep_the_report_but_not_the_rosters() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 5)).await.unwrap();
    let ended = h.service.end_combat(&id, None).await.unwrap();

    let session = h.service.session(&id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.pathogens.is_empty() && session.antibodies.is_empty());
    assert!(session.log.is_empty());
    assert_eq!(h.service.get_report(&id).await.unwrap(), ended.report);
    assert_eq!(ended.report.roster.antibodies.len(), 2);
}

#[tokio::test]
async fn unreachable_base_registry_aborts_the_pending_session() {
    let directory = Arc::new(InMemoryDirectory::new(catalog()));
    let collaborators = Collaborators {
        directory,
        bases: Arc::new(UnreachableBases),
        ..Collaborators::in_memory(catalog())
    };
    let service = CombatService::new(collaborators, EngineConfig::default());

    let err = service.start_combat(request("u1", 1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
    assert_eq!(service.session_count(SessionStatus::Pending), 0);
    assert_eq!(service.session_count(SessionStatus::Aborted), 1);
}

#[tokio::test]
async fn terminal_sessions_beyond_retention_age_out_to_the_cache() {
    let h = harness_with(
        Arc::new(ScriptedNarrator::default()),
        EngineConfig {
            session_retention: 2,
            ..EngineConfig::default()
        },
    );
    let mut reports = Vec::new();
    for seed in 0..3 {
        let id = h.service.start_combat(request("keeper", seed)).await.unwrap();
        reports.push(h.service.end_combat(&id, None).await.unwrap().report);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert_eq!(h.service.session_count(SessionStatus::Completed), 2);
    let oldest = &reports[0];
    assert_eq!(
        h.service.session(&oldest.combat_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(&h.service.get_report(&oldest.combat_id).await.unwrap(), oldest);
    assert_eq!(h.service.get_history("keeper", 1, 10).unwrap().len(), 2);
}

#[tokio::test]
async fn csv_export_replays_the_resolved_log() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 21)).await.unwrap();
    let mut overrides = RosterOverrides::default();
    overrides.health.insert("flu".to_string(), 30);
    let report = h.service.end_combat(&id, Some(overrides)).await.unwrap().report;

    let csv = h.service.export_log_csv(&id).unwrap();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), report.rounds as usize * 2);
    let dealt: u64 = rows
        .iter()
        .filter(|row| row.split(',').nth(1) == Some("antibodies"))
        .filter_map(|row| row.split(',').nth(4)?.parse::<u64>().ok())
        .sum();
    assert_eq!(dealt, report.damage_dealt);
}

#[tokio::test]
async fn overfull_directory_health_is_clamped_at_capture() {
    let h = harness();
    let mut req = request("u1", 6);
    req.pathogens = vec!["bloat".to_string()];
    let id = h.service.start_combat(req).await.unwrap();
    let session = h.service.session(&id).unwrap();
    assert_eq!(session.pathogens[0].health, 100);
}

#[tokio::test]
async fn invalid_base_aborts_the_session() {
    let h = harness();
    let mut req = request("u1", 1);
    req.base_id = "ruin".to_string();
    let id = h.service.create_session(&req).await.unwrap();
    let err = h.service.begin_session(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let session = h.service.session(&id).unwrap();
    assert_eq!(session.status, SessionStatus::Aborted);
    assert!(session.abort_reason.is_some());
    assert_eq!(
        h.service.end_combat(&id, None).await.unwrap_err().kind(),
        ErrorKind::PreconditionFailed
    );
}

#[tokio::test]
async fn unknown_units_are_not_found() {
    let h = harness();
    let mut req = request("u1", 1);
    req.pathogens.push("ghost".to_string());
    let err = h.service.start_combat(req).await.unwrap_err();
    assert!(matches!(
        err,
        CombatError::NotFound { what: "pathogen", ref id } if id == "ghost"
    ));
}

#[tokio::test]
async fn empty_roster_is_invalid_input() {
    let h = harness();
    let mut req = request("u1", 1);
    req.antibodies.clear();
    assert_eq!(
        h.service.start_combat(req).await.unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[tokio::test]
async fn roster_without_health_is_invalid_input() {
    let h = harness();
    let mut req = request("u1", 1);
    req.pathogens = vec!["husk".to_string()];
    assert_eq!(
        h.service.start_combat(req).await.unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[tokio::test]
async fn overrides_change_the_resolved_rosters() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 11)).await.unwrap();
    let mut overrides = RosterOverrides::default();
    overrides.health.insert("interferon".to_string(), 1);
    overrides.health.insert("macrophage".to_string(), 1);
    let ended = h.service.end_combat(&id, Some(overrides)).await.unwrap();

    let antibodies = &ended.report.roster.antibodies;
    assert!(antibodies.iter().all(|u| u.health == 1));
}

#[tokio::test]
async fn overrides_with_unknown_units_leave_the_session_in_progress() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 11)).await.unwrap();
    let mut overrides = RosterOverrides::default();
    overrides.health.insert("stranger".to_string(), 10);
    let err = h.service.end_combat(&id, Some(overrides)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(h.service.session(&id).unwrap().status, SessionStatus::InProgress);

    h.service.end_combat(&id, None).await.unwrap();
}

#[tokio::test]
async fn ledger_failure_keeps_the_outcome_and_can_be_retried() {
    let h = harness();
    h.ledger.set_failing(true);
    let id = h.service.start_combat(request("u2", 8)).await.unwrap();
    let ended = h.service.end_combat(&id, None).await.unwrap();
    let result = ended.report.result;

    let outcome = ended.side_effects.wait().await;
    assert!(!outcome.is_complete());
    assert!(outcome
        .failures
        .iter()
        .all(|f| f.kind() == ErrorKind::DependencyUnavailable));
    assert_eq!(h.archive.len(), 1, "persistence still succeeded");
    assert_eq!(h.service.get_report(&id).await.unwrap().result, result);
    assert_eq!(
        h.service.side_effect_status(&id).unwrap(),
        Some(outcome.clone())
    );

    h.ledger.set_failing(false);
    let retried = h.service.retry_side_effects(&id).await.unwrap();
    assert!(retried.is_complete());
    let account = h.ledger.account("u2");
    assert_eq!(account.counters.get(COUNTER_COMBATS), Some(&1));

    let again = h.service.retry_side_effects(&id).await.unwrap();
    assert!(again.is_complete());
    assert_eq!(h.ledger.account("u2"), account, "retries are idempotent");
}

#[tokio::test]
async fn report_requires_completion() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 2)).await.unwrap();
    assert_eq!(
        h.service.get_report(&id).await.unwrap_err().kind(),
        ErrorKind::PreconditionFailed
    );
    assert_eq!(
        h.service.get_report("missing").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn archived_reports_are_served_through_the_cache() {
    let source = harness();
    let id = source.service.start_combat(request("u1", 4)).await.unwrap();
    let report = source.service.end_combat(&id, None).await.unwrap().report;

    let reader = harness();
    reader.archive.insert(report.clone());
    assert_eq!(reader.service.get_report(&id).await.unwrap(), report);
    assert_eq!(reader.service.get_report(&id).await.unwrap(), report);
    assert_eq!(reader.archive.load_count(), 1);
}

#[tokio::test]
async fn archive_outage_surfaces_as_dependency_unavailable() {
    let h = harness();
    h.archive.set_failing(true);
    assert_eq!(
        h.service.get_report("elsewhere").await.unwrap_err().kind(),
        ErrorKind::DependencyUnavailable
    );
}

#[tokio::test]
async fn history_is_newest_first_and_paged() {
    let h = harness();
    let mut ids = Vec::new();
    for seed in 0..5 {
        let id = h.service.start_combat(request("pager", seed)).await.unwrap();
        h.service.end_combat(&id, None).await.unwrap();
        ids.push(id);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let other = h.service.start_combat(request("someone_else", 1)).await.unwrap();
    h.service.end_combat(&other, None).await.unwrap();
    let unfinished = h.service.start_combat(request("pager", 99)).await.unwrap();

    let all = h.service.get_history("pager", 1, 100).unwrap();
    let listed: Vec<&str> = all.iter().map(|r| r.combat_id.as_str()).collect();
    let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
    assert_eq!(listed, expected);
    assert!(!listed.contains(&unfinished.as_str()));
    assert!(all.windows(2).all(|w| w[0].date >= w[1].date));

    let page_two = h.service.get_history("pager", 2, 2).unwrap();
    assert_eq!(page_two.len(), 2);
    assert_eq!(page_two[0].combat_id, ids[2]);
    assert!(h.service.get_history("pager", 4, 2).unwrap().is_empty());
    assert_eq!(
        h.service.get_history("pager", 0, 2).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[tokio::test]
async fn chronicle_falls_back_to_template_when_generator_fails() {
    let h = harness();
    let id = h.service.start_combat(request("u1", 6)).await.unwrap();
    h.service.end_combat(&id, None).await.unwrap();
    let chronicle = h.service.generate_chronicle(&id).await.unwrap();
    assert_eq!(chronicle.source, ChronicleSource::Template);
    assert!(chronicle.text.contains("thymus"));
}

#[tokio::test]
async fn slow_generator_is_abandoned_after_the_budget() {
    let config = EngineConfig {
        narrative_timeout_ms: 20,
        ..EngineConfig::default()
    };
    let h = harness_with(
        Arc::new(ScriptedNarrator {
            text: "too late".to_string(),
            delay: Duration::from_secs(5),
            fail: false,
        }),
        config,
    );
    let id = h.service.start_combat(request("u1", 6)).await.unwrap();
    h.service.end_combat(&id, None).await.unwrap();
    let chronicle = h.service.generate_chronicle(&id).await.unwrap();
    assert_eq!(chronicle.source, ChronicleSource::Template);
}

#[tokio::test]
async fn generated_chronicle_is_returned_when_available() {
    let h = harness_with(
        Arc::new(ScriptedNarrator {
            text: "The thymus held".to_string(),
            ..ScriptedNarrator::default()
        }),
        EngineConfig::default(),
    );
    let id = h.service.start_combat(request("u1", 6)).await.unwrap();
    h.service.end_combat(&id, None).await.unwrap();
    let chronicle = h.service.generate_chronicle(&id).await.unwrap();
    assert_eq!(chronicle.source, ChronicleSource::Generated);
    assert_eq!(chronicle.text, format!("The thymus held ({id})"));
}

#[tokio::test]
async fn advice_follows_the_report() {
    let h = harness();
    let req = StartCombatRequest {
        user_id: "u3".to_string(),
        base_id: "thymus".to_string(),
        pathogens: vec!["flu".to_string(), "mold".to_string()],
        antibodies: vec!["macrophage".to_string()],
        seed: Some(21),
    };
    let id = h.service.start_combat(req).await.unwrap();
    let mut overrides = RosterOverrides::default();
    overrides.health.insert("macrophage".to_string(), 1);
    let report = h.service.end_combat(&id, Some(overrides)).await.unwrap().report;

    let advice = h.service.get_tactical_advice(&id).await.unwrap();
    assert_eq!(
        advice.contains(&ADVICE_MATCHUP_COVERAGE.to_string()),
        report.result == CombatOutcome::Defeat
    );
    assert_eq!(
        advice.contains(&ADVICE_FASTER_ABILITIES.to_string()),
        report.rounds >= report.max_rounds
    );
    // 22 pathogen attack against 30
    assert!(!advice.contains(&ADVICE_REINFORCE_ATTACK.to_string()));
}

#[test]
fn reward_tiers_follow_the_outcome() {
    let table = EngineConfig::default().rewards;
    assert_eq!(
        RewardTier::for_outcome(CombatOutcome::Victory, &table),
        RewardTier {
            credits: 100,
            energy: 50
        }
    );
    assert_eq!(table.tier(CombatOutcome::Defeat).credits, 10);
}
