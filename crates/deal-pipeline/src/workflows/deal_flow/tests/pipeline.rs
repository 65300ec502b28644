use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use crate::workflows::deal_flow::catalog::{
    Stage, StageCatalog, StageCriteria, ARCHIVED, CONTACTED, DISCOVERY, EVALUATION, HOT_LEAD,
    NEGOTIATING, QUALIFICATION,
};
use crate::workflows::deal_flow::domain::{
    ActionKind, ActionSpec, ActionStatus, DealFlow, DealQuality, PropertyRecord, StageId, Urgency,
};
use crate::workflows::deal_flow::engine::{DealFlowEngine, PipelineError};
use crate::workflows::deal_flow::policy::AdvancementPolicy;

fn action_kinds(flow: &DealFlow, entry: usize) -> Vec<(ActionKind, ActionStatus)> {
    flow.stage_history[entry]
        .actions
        .iter()
        .map(|result| (result.action_kind, result.status))
        .collect()
}

fn assert_history_invariants(flow: &DealFlow) {
    let last = flow.stage_history.last().expect("history is never empty");
    assert_eq!(last.stage, flow.current_stage);
    assert!(last.completed_at.is_none(), "current entry stays open");

    let open = flow
        .stage_history
        .iter()
        .filter(|entry| entry.completed_at.is_none())
        .count();
    assert_eq!(open, 1, "exactly one open entry");

    for pair in flow.stage_history.windows(2) {
        assert!(pair[0].entered_at <= pair[1].entered_at);
    }
}

#[tokio::test(start_paused = true)]
async fn low_score_record_settles_in_qualification() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");

    let created = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(created.current_stage.as_str(), DISCOVERY);
    assert_eq!(
        action_kinds(&created, 0),
        vec![(ActionKind::Analyze, ActionStatus::Completed)]
    );

    elapse(AUTO_ADVANCE + Duration::from_secs(1)).await;
    let qualified = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow_stages(&qualified), vec![DISCOVERY, QUALIFICATION]);
    assert_eq!(
        action_kinds(&qualified, 1),
        vec![(ActionKind::AddToWatchlist, ActionStatus::Completed)]
    );

    elapse(Duration::from_secs(60)).await;
    let settled = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(settled.current_stage.as_str(), QUALIFICATION);
    assert_eq!(settled.stage_history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn strong_record_progresses_to_hot_lead() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let mut record = excellent_property("prop-85", 85, 350_000);
    record.flags.owner_financing = true;
    let flow_id = engine.submit_new_record(record).await.expect("flow created");

    elapse(AUTO_ADVANCE * 4).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(
        flow_stages(&flow),
        vec![DISCOVERY, QUALIFICATION, EVALUATION, HOT_LEAD]
    );
    assert_eq!(flow.priority, 91);
    assert_eq!(flow.deal_quality, Some(DealQuality::Excellent));
    assert_eq!(flow.estimated_value, Some(350_000.0));

    let hot_entry = &flow.stage_history[3];
    let notify = hot_entry
        .actions
        .iter()
        .find(|result| result.action_kind == ActionKind::Notify)
        .expect("hot lead notification recorded");
    assert_eq!(notify.status, ActionStatus::Completed);
    assert_eq!(
        notify.result.as_ref().and_then(|payload| payload.get("urgency")),
        Some(&serde_json::json!("critical"))
    );

    let sent = services.notifications();
    assert!(sent
        .iter()
        .any(|notification| notification.urgency == Urgency::Critical));
    assert_eq!(services.drafted_templates(), vec!["initial_offer".to_string()]);

    let stats = engine.pipeline_stats().expect("stats");
    assert_eq!(stats.hot_leads, 1);
    assert_eq!(stats.count_for(HOT_LEAD), 1);
}

#[tokio::test(start_paused = true)]
async fn over_priced_record_is_archived_on_qualification() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-big", 70, 2_500_000))
        .await
        .expect("flow created");

    elapse(AUTO_ADVANCE + Duration::from_secs(1)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow_stages(&flow), vec![DISCOVERY, QUALIFICATION, ARCHIVED]);
    assert!(flow.stage_history[1].actions.is_empty());
    assert_eq!(services.calls(ActionKind::AddToWatchlist), 0);
    assert_history_invariants(&flow);

    elapse(minutes(90)).await;
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 0);
    assert_eq!(engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn paused_flow_skips_delayed_action() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    elapse(AUTO_ADVANCE + Duration::from_secs(1)).await;

    let paused = engine.pause_auto_actions(&flow_id).await.expect("paused");
    assert!(!paused.auto_actions_enabled);

    elapse(minutes(61)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 0);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![(ActionKind::AddToWatchlist, ActionStatus::Completed)]
    );
}

#[tokio::test(start_paused = true)]
async fn delayed_action_runs_after_its_offset() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    elapse(AUTO_ADVANCE + minutes(59)).await;
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 0);

    elapse(minutes(2)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 1);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::AddToWatchlist, ActionStatus::Completed),
            (ActionKind::ScheduleAlert, ActionStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn delayed_offset_counts_from_entry_despite_slow_immediate_action() {
    let services = FakeServices::default();
    services.set_latency(ActionKind::AddToWatchlist, minutes(20));
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");

    // Qualification is entered when the first check fires.
    elapse(AUTO_ADVANCE + minutes(59)).await;
    assert_eq!(services.calls(ActionKind::AddToWatchlist), 1);
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 0);

    elapse(minutes(2)).await;
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 1);
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.current_stage.as_str(), QUALIFICATION);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::AddToWatchlist, ActionStatus::Completed),
            (ActionKind::ScheduleAlert, ActionStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn delayed_result_lands_on_entry_it_was_scheduled_for() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    elapse(minutes(10)).await;
    engine
        .advance_to_stage(&flow_id, &stage(CONTACTED))
        .await
        .expect("manual advance");

    elapse(minutes(60)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow_stages(&flow), vec![DISCOVERY, QUALIFICATION, CONTACTED]);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::AddToWatchlist, ActionStatus::Completed),
            (ActionKind::ScheduleAlert, ActionStatus::Completed),
        ]
    );
    assert!(flow.stage_history[2].actions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn in_flight_result_is_recorded_after_flow_is_archived() {
    let services = FakeServices::default();
    services.set_latency(ActionKind::ScheduleAlert, minutes(10));
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    elapse(minutes(63)).await;
    assert_eq!(services.calls(ActionKind::ScheduleAlert), 1);

    engine
        .advance_to_stage(&flow_id, &stage(ARCHIVED))
        .await
        .expect("archived");

    elapse(minutes(15)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.current_stage.as_str(), ARCHIVED);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::AddToWatchlist, ActionStatus::Completed),
            (ActionKind::ScheduleAlert, ActionStatus::Completed),
        ]
    );
    assert!(flow.stage_history[2].actions.is_empty());
}

fn delayed_analysis_catalog() -> StageCatalog {
    let stage = |id: &str, actions: Vec<ActionSpec>| Stage {
        id: StageId::from(id),
        name: id.to_string(),
        description: String::new(),
        criteria: StageCriteria::default(),
        actions,
    };

    StageCatalog::new(
        vec![
            stage("intake", vec![ActionSpec::delayed(ActionKind::Analyze, 10)]),
            stage("dropped", Vec::new()),
        ],
        StageId::from("intake"),
        StageId::from("dropped"),
        StageId::from("intake"),
        [StageId::from("dropped")].into_iter().collect(),
    )
    .expect("valid catalog")
}

#[tokio::test(start_paused = true)]
async fn late_analysis_does_not_rewrite_a_closed_flow() {
    let services = FakeServices::default();
    services.set_analysis(512_000.0, DealQuality::Excellent);
    let engine = DealFlowEngine::builder(services.collaborators())
        .catalog(delayed_analysis_catalog())
        .auto_advance_delay(AUTO_ADVANCE)
        .build();

    let flow_id = engine
        .submit_new_record(property("prop-70", 70, 500_000))
        .await
        .expect("flow created");
    elapse(minutes(1)).await;
    engine
        .advance_to_stage(&flow_id, &stage("dropped"))
        .await
        .expect("closed");

    elapse(minutes(10)).await;
    assert_eq!(services.calls(ActionKind::Analyze), 1);
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(
        action_kinds(&flow, 0),
        vec![(ActionKind::Analyze, ActionStatus::Completed)]
    );
    assert_eq!(flow.estimated_value, None);
    assert_eq!(flow.deal_quality, None);
}

#[tokio::test(start_paused = true)]
async fn scheduled_actions_are_dispatched_off_the_transition_path() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    let advanced = engine
        .advance_to_stage(&flow_id, &stage(NEGOTIATING))
        .await
        .expect("manual advance");
    assert_eq!(
        action_kinds(&advanced, 1),
        vec![(ActionKind::Notify, ActionStatus::Completed)]
    );

    elapse(Duration::from_secs(1)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::Notify, ActionStatus::Completed),
            (ActionKind::ScheduleAlert, ActionStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_action_does_not_block_siblings() {
    let services = FakeServices::default();
    services.fail(ActionKind::Analyze);
    services.fail(ActionKind::Notify);
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(excellent_property("prop-90", 90, 250_000))
        .await
        .expect("analysis failure does not abort creation");
    let created = engine.get_flow(&flow_id).expect("flow stored");
    let analysis = &created.stage_history[0].actions[0];
    assert_eq!(analysis.status, ActionStatus::Failed);
    assert!(analysis
        .error
        .as_deref()
        .expect("error captured")
        .contains("analysis unavailable"));
    assert_eq!(created.estimated_value, None);

    let flow = engine
        .advance_to_stage(&flow_id, &stage(HOT_LEAD))
        .await
        .expect("failing notification does not abort the transition");
    assert_eq!(flow.current_stage.as_str(), HOT_LEAD);
    assert_eq!(
        action_kinds(&flow, 1),
        vec![
            (ActionKind::Notify, ActionStatus::Failed),
            (ActionKind::DraftOutreach, ActionStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_criteria_on_manual_advance_archives_without_actions() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    let flow = engine
        .advance_to_stage(&flow_id, &stage(HOT_LEAD))
        .await
        .expect("redirect is not an error");

    assert_eq!(flow_stages(&flow), vec![DISCOVERY, HOT_LEAD, ARCHIVED]);
    assert!(flow.stage_history[1].actions.is_empty());
    assert!(services.notifications().is_empty());
    assert_eq!(services.calls(ActionKind::DraftOutreach), 0);
    assert_history_invariants(&flow);
}

#[tokio::test(start_paused = true)]
async fn terminal_flows_reject_further_changes() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    engine
        .advance_to_stage(&flow_id, &stage(ARCHIVED))
        .await
        .expect("archived");

    match engine.advance_to_stage(&flow_id, &stage(QUALIFICATION)).await {
        Err(PipelineError::TerminalFlow { flow, stage }) => {
            assert_eq!(flow, flow_id);
            assert_eq!(stage.as_str(), ARCHIVED);
        }
        other => panic!("expected terminal flow error, got {other:?}"),
    }
    assert!(matches!(
        engine.pause_auto_actions(&flow_id).await,
        Err(PipelineError::TerminalFlow { .. })
    ));
    assert!(matches!(
        engine.resume_auto_actions(&flow_id).await,
        Err(PipelineError::TerminalFlow { .. })
    ));

    let flow = engine.get_flow(&flow_id).expect("still queryable");
    assert_eq!(flow.stage_history.len(), 2);
    assert!(engine.list_active_flows().expect("active").is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_flow_and_stage_are_surfaced() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    assert!(matches!(
        engine.advance_to_stage(&missing_flow(), &stage(QUALIFICATION)).await,
        Err(PipelineError::UnknownFlow(_))
    ));
    assert!(matches!(
        engine.pause_auto_actions(&missing_flow()).await,
        Err(PipelineError::UnknownFlow(_))
    ));
    assert!(matches!(
        engine.get_flow(&missing_flow()),
        Err(PipelineError::UnknownFlow(_))
    ));

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    match engine.advance_to_stage(&flow_id, &stage("escrow")).await {
        Err(PipelineError::UnknownStage(id)) => assert_eq!(id.as_str(), "escrow"),
        other => panic!("expected unknown stage, got {other:?}"),
    }
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.stage_history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_flow_for_same_subject_is_rejected() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let first = engine
        .submit_new_record(property("prop-1", 50, 200_000))
        .await
        .expect("flow created");
    match engine
        .submit_new_record(property("prop-1", 95, 200_000))
        .await
    {
        Err(PipelineError::DuplicateSubject { subject, existing }) => {
            assert_eq!(subject.0, "prop-1");
            assert_eq!(existing, first);
        }
        other => panic!("expected duplicate subject, got {other:?}"),
    }
    assert_eq!(services.calls(ActionKind::Analyze), 1);
}

#[tokio::test(start_paused = true)]
async fn flow_ids_are_sequential_per_engine() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let first = engine
        .submit_new_record(property("prop-1", 50, 200_000))
        .await
        .expect("flow created");
    let second = engine
        .submit_new_record(property("prop-2", 50, 200_000))
        .await
        .expect("flow created");
    assert_eq!(first.0, "flow-000001");
    assert_eq!(second.0, "flow-000002");

    let other = build_engine(&FakeServices::default());
    let fresh = other
        .submit_new_record(property("prop-1", 50, 200_000))
        .await
        .expect("flow created");
    assert_eq!(fresh.0, "flow-000001");
}

#[tokio::test(start_paused = true)]
async fn history_invariants_hold_while_progressing() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(excellent_property("prop-88", 88, 400_000))
        .await
        .expect("flow created");

    for _ in 0..4 {
        assert_history_invariants(&engine.get_flow(&flow_id).expect("flow stored"));
        elapse(AUTO_ADVANCE + Duration::from_millis(100)).await;
    }
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.current_stage.as_str(), HOT_LEAD);
    assert_history_invariants(&flow);
}

#[tokio::test(start_paused = true)]
async fn paused_flow_waits_for_resume() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    engine.pause_auto_actions(&flow_id).await.expect("paused");
    engine
        .pause_auto_actions(&flow_id)
        .await
        .expect("pausing twice is harmless");

    elapse(Duration::from_secs(60)).await;
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        DISCOVERY
    );

    let resumed = engine.resume_auto_actions(&flow_id).await.expect("resumed");
    assert!(resumed.auto_actions_enabled);
    elapse(AUTO_ADVANCE + Duration::from_secs(1)).await;
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        QUALIFICATION
    );
}

#[tokio::test(start_paused = true)]
async fn analysis_quality_overrides_record_quality() {
    let services = FakeServices::default();
    services.set_analysis(420_000.0, DealQuality::Excellent);
    let engine = build_engine(&services);

    let record = PropertyRecord {
        deal_quality: Some(DealQuality::Good),
        ..property("prop-82", 82, 380_000)
    };
    let flow_id = engine.submit_new_record(record).await.expect("flow created");

    elapse(AUTO_ADVANCE * 4).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.current_stage.as_str(), HOT_LEAD);
    assert_eq!(flow.estimated_value, Some(420_000.0));
}

#[tokio::test(start_paused = true)]
async fn poor_analysis_holds_flow_in_evaluation() {
    let services = FakeServices::default();
    services.set_analysis(150_000.0, DealQuality::Poor);
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(excellent_property("prop-92", 92, 300_000))
        .await
        .expect("flow created");

    elapse(AUTO_ADVANCE * 6).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow.current_stage.as_str(), EVALUATION);
    assert_eq!(flow.deal_quality, Some(DealQuality::Poor));
}

#[tokio::test(start_paused = true)]
async fn refreshed_record_is_seen_by_next_check() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-55", 55, 300_000))
        .await
        .expect("flow created");
    elapse(AUTO_ADVANCE * 3).await;
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        QUALIFICATION
    );

    engine
        .refresh_record(property("prop-55", 72, 300_000))
        .expect("record refreshed");
    engine.resume_auto_actions(&flow_id).await.expect("re-check");
    elapse(AUTO_ADVANCE + Duration::from_secs(1)).await;
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        EVALUATION
    );
}

#[tokio::test(start_paused = true)]
async fn stale_check_is_ignored_after_manual_move() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-65", 65, 300_000))
        .await
        .expect("flow created");
    elapse(Duration::from_secs(3)).await;
    engine
        .advance_to_stage(&flow_id, &stage(QUALIFICATION))
        .await
        .expect("manual advance");

    elapse(Duration::from_secs(3)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow_stages(&flow), vec![DISCOVERY, QUALIFICATION]);

    elapse(Duration::from_secs(3)).await;
    let flow = engine.get_flow(&flow_id).expect("flow stored");
    assert_eq!(flow_stages(&flow), vec![DISCOVERY, QUALIFICATION, EVALUATION]);
}

struct HoldPolicy;

impl AdvancementPolicy for HoldPolicy {
    fn choose_next_stage(&self, _flow: &DealFlow, _record: &PropertyRecord) -> Option<StageId> {
        None
    }
}

#[tokio::test(start_paused = true)]
async fn advancement_policy_is_swappable() {
    let services = FakeServices::default();
    let engine = DealFlowEngine::builder(services.collaborators())
        .policy(Arc::new(HoldPolicy))
        .auto_advance_delay(AUTO_ADVANCE)
        .build();

    let flow_id = engine
        .submit_new_record(excellent_property("prop-99", 99, 100_000))
        .await
        .expect("flow created");
    elapse(Duration::from_secs(60)).await;
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        DISCOVERY
    );
}

#[tokio::test(start_paused = true)]
async fn flows_progress_independently() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let (low, high) = tokio::join!(
        engine.submit_new_record(property("prop-low", 45, 100_000)),
        engine.submit_new_record(excellent_property("prop-high", 95, 100_000)),
    );
    let low = low.expect("low flow");
    let high = high.expect("high flow");
    assert_ne!(low, high);

    elapse(AUTO_ADVANCE * 4).await;
    let active = engine.list_active_flows().expect("active flows");
    let order: Vec<_> = active.iter().map(|flow| flow.id.clone()).collect();
    assert_eq!(order, vec![high.clone(), low.clone()]);

    let qualification = engine
        .list_flows_by_stage(&stage(QUALIFICATION))
        .expect("stage query");
    assert_eq!(qualification.len(), 1);
    assert_eq!(qualification[0].id, low);
    assert_eq!(
        engine.get_flow(&high).expect("flow").current_stage.as_str(),
        HOT_LEAD
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_outstanding_timers() {
    let services = FakeServices::default();
    let engine = build_engine(&services);

    let flow_id = engine
        .submit_new_record(property("prop-45", 45, 300_000))
        .await
        .expect("flow created");
    assert_eq!(engine.pending_timers(), 1);

    engine.shutdown();
    elapse(Duration::from_secs(60)).await;
    assert_eq!(engine.pending_timers(), 0);
    assert_eq!(
        engine.get_flow(&flow_id).expect("flow").current_stage.as_str(),
        DISCOVERY
    );
}
