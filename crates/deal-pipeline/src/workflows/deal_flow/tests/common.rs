use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::deal_flow::collaborators::{
    Acknowledgement, AlertService, AnalysisReport, AnalysisService, CollaboratorError,
    Collaborators, Notification, NotificationService, OutreachDraft, OutreachService,
    WatchlistService,
};
use crate::workflows::deal_flow::domain::{
    ActionConfig, ActionKind, DealFlow, DealQuality, FlowId, PropertyRecord, StageId, SubjectId,
};
use crate::workflows::deal_flow::engine::DealFlowEngine;

pub(super) const AUTO_ADVANCE: Duration = Duration::from_secs(5);

pub(crate) fn property(id: &str, score: u8, list_price: u64) -> PropertyRecord {
    PropertyRecord {
        address: format!("{id} Main St"),
        list_price: Some(list_price),
        score: Some(score),
        ..PropertyRecord::new(id)
    }
}

pub(super) fn excellent_property(id: &str, score: u8, list_price: u64) -> PropertyRecord {
    PropertyRecord {
        deal_quality: Some(DealQuality::Excellent),
        ..property(id, score, list_price)
    }
}

pub(super) fn build_engine(services: &FakeServices) -> DealFlowEngine {
    DealFlowEngine::builder(services.collaborators())
        .auto_advance_delay(AUTO_ADVANCE)
        .build()
}

/// Lets paused tokio time run forward so armed timers fire.
pub(super) async fn elapse(duration: Duration) {
    tokio::time::sleep(duration).await;
}

pub(super) fn minutes(value: u64) -> Duration {
    Duration::from_secs(value * 60)
}

pub(super) fn stage(id: &str) -> StageId {
    StageId::from(id)
}

pub(super) fn flow_stages(flow: &DealFlow) -> Vec<&str> {
    flow.stage_history
        .iter()
        .map(|entry| entry.stage.as_str())
        .collect()
}

pub(super) fn missing_flow() -> FlowId {
    FlowId("flow-999999".to_string())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
struct FakeState {
    analysis: Option<AnalysisReport>,
    failing: HashSet<ActionKind>,
    latency: HashMap<ActionKind, Duration>,
    calls: Vec<ActionKind>,
    notifications: Vec<Notification>,
    drafted_templates: Vec<String>,
}

/// In-memory stand-in for every collaborator, recording each call.
///
/// Analysis echoes the record's own quality and price unless a fixed report
/// has been set.
#[derive(Default, Clone)]
pub(crate) struct FakeServices {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServices {
    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            analysis: Arc::new(self.clone()),
            notifications: Arc::new(self.clone()),
            outreach: Arc::new(self.clone()),
            watchlist: Arc::new(self.clone()),
            alerts: Arc::new(self.clone()),
        }
    }

    pub(crate) fn set_analysis(&self, estimated_value: f64, deal_quality: DealQuality) {
        self.state.lock().expect("fake mutex poisoned").analysis = Some(AnalysisReport {
            estimated_value,
            deal_quality,
        });
    }

    pub(crate) fn fail(&self, kind: ActionKind) {
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .failing
            .insert(kind);
    }

    pub(crate) fn set_latency(&self, kind: ActionKind, latency: Duration) {
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .latency
            .insert(kind, latency);
    }

    pub(crate) fn calls(&self, kind: ActionKind) -> usize {
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .calls
            .iter()
            .filter(|call| **call == kind)
            .count()
    }

    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .notifications
            .clone()
    }

    pub(crate) fn drafted_templates(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .drafted_templates
            .clone()
    }

    /// Records the call, waits out any configured latency, then reports
    /// whether the kind is set to fail.
    async fn call(&self, kind: ActionKind, service: &'static str) -> Result<(), CollaboratorError> {
        let (latency, failing) = {
            let mut state = self.state.lock().expect("fake mutex poisoned");
            state.calls.push(kind);
            (state.latency.get(&kind).copied(), state.failing.contains(&kind))
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failing {
            return Err(CollaboratorError::unavailable(service, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisService for FakeServices {
    async fn analyze(&self, record: &PropertyRecord) -> Result<AnalysisReport, CollaboratorError> {
        self.call(ActionKind::Analyze, "analysis").await?;
        let fixed = self.state.lock().expect("fake mutex poisoned").analysis.clone();
        Ok(fixed.unwrap_or_else(|| AnalysisReport {
            estimated_value: record.list_price.unwrap_or(0) as f64,
            deal_quality: record.deal_quality.unwrap_or(DealQuality::Fair),
        }))
    }
}

#[async_trait]
impl NotificationService for FakeServices {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        self.call(ActionKind::Notify, "notifications").await?;
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .notifications
            .push(notification);
        Ok(())
    }
}

#[async_trait]
impl OutreachService for FakeServices {
    async fn draft(
        &self,
        template_id: &str,
        record: &PropertyRecord,
    ) -> Result<OutreachDraft, CollaboratorError> {
        self.call(ActionKind::DraftOutreach, "outreach").await?;
        self.state
            .lock()
            .expect("fake mutex poisoned")
            .drafted_templates
            .push(template_id.to_string());
        Ok(OutreachDraft {
            handle: format!("draft-{}-{template_id}", record.id),
        })
    }
}

#[async_trait]
impl WatchlistService for FakeServices {
    async fn add(
        &self,
        subject: &SubjectId,
        _config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError> {
        self.call(ActionKind::AddToWatchlist, "watchlist").await?;
        Ok(Acknowledgement {
            reference: format!("watch-{subject}"),
        })
    }
}

#[async_trait]
impl AlertService for FakeServices {
    async fn schedule_alert(
        &self,
        subject: &SubjectId,
        _config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError> {
        self.call(ActionKind::ScheduleAlert, "alerts").await?;
        Ok(Acknowledgement {
            reference: format!("alert-{subject}"),
        })
    }
}
