use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::collaborators::{AnalysisReport, CollaboratorError, Collaborators, Notification};
use super::domain::{
    ActionKind, ActionResult, ActionSpec, ActionStatus, FlowId, PropertyRecord, Urgency,
};

const DEFAULT_NOTIFICATION_TITLE: &str = "Deal flow update";
const DEFAULT_OUTREACH_TEMPLATE: &str = "standard_outreach";

/// Runs one action against its collaborator and records the outcome.
///
/// Collaborator failures become `Failed` results; nothing here returns an
/// error to the caller.
#[derive(Clone)]
pub struct ActionDispatcher {
    collaborators: Collaborators,
}

impl ActionDispatcher {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Collaborators report failure as `Err`, which is recorded as `Failed`.
    /// A panicking collaborator is a defect and is not caught here.
    pub async fn execute(
        &self,
        flow_id: &FlowId,
        record: &PropertyRecord,
        spec: &ActionSpec,
    ) -> ActionResult {
        let mut result = ActionResult::pending(spec.kind);
        result.executed_at = Some(Utc::now());

        let outcome = match spec.kind {
            ActionKind::Analyze => self.analyze(record).await,
            ActionKind::Notify => self.notify(record, spec).await,
            ActionKind::DraftOutreach => self.draft_outreach(record, spec).await,
            ActionKind::AddToWatchlist => self
                .collaborators
                .watchlist
                .add(&record.id, &spec.config)
                .await
                .map(|ack| to_payload(&ack)),
            ActionKind::ScheduleAlert => self
                .collaborators
                .alerts
                .schedule_alert(&record.id, &spec.config)
                .await
                .map(|ack| to_payload(&ack)),
        };

        match outcome {
            Ok(payload) => {
                debug!(flow_id = %flow_id, action = spec.kind.label(), "action completed");
                result.status = ActionStatus::Completed;
                result.result = payload;
            }
            Err(error) => {
                warn!(flow_id = %flow_id, action = spec.kind.label(), %error, "action failed");
                result.status = ActionStatus::Failed;
                result.error = Some(error.to_string());
            }
        }

        result
    }

    async fn analyze(
        &self,
        record: &PropertyRecord,
    ) -> Result<Option<serde_json::Value>, CollaboratorError> {
        let report = self.collaborators.analysis.analyze(record).await?;
        Ok(to_payload(&report))
    }

    async fn notify(
        &self,
        record: &PropertyRecord,
        spec: &ActionSpec,
    ) -> Result<Option<serde_json::Value>, CollaboratorError> {
        let title = spec
            .config_str("title")
            .unwrap_or(DEFAULT_NOTIFICATION_TITLE)
            .to_string();
        let urgency = urgency_from_config(spec);

        self.collaborators
            .notifications
            .notify(Notification {
                title: title.clone(),
                urgency,
                subject: record.summary(),
            })
            .await?;

        Ok(Some(json!({ "title": title, "urgency": urgency.label() })))
    }

    async fn draft_outreach(
        &self,
        record: &PropertyRecord,
        spec: &ActionSpec,
    ) -> Result<Option<serde_json::Value>, CollaboratorError> {
        let template = spec
            .config_str("template")
            .unwrap_or(DEFAULT_OUTREACH_TEMPLATE);
        let draft = self.collaborators.outreach.draft(template, record).await?;
        Ok(to_payload(&draft))
    }
}

fn urgency_from_config(spec: &ActionSpec) -> Urgency {
    match spec.config.get("urgency") {
        None => Urgency::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|_| {
            warn!(urgency = %value, "unrecognized urgency, using default");
            Urgency::default()
        }),
    }
}

fn to_payload<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

/// Reads the analysis payload back out of a completed `Analyze` result.
pub(crate) fn analysis_report(result: &ActionResult) -> Option<AnalysisReport> {
    if result.action_kind != ActionKind::Analyze || result.status != ActionStatus::Completed {
        return None;
    }

    result
        .result
        .as_ref()
        .and_then(|payload| serde_json::from_value(payload.clone()).ok())
}
