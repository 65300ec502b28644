//! Narrow interfaces to the external services each action kind calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{ActionConfig, DealQuality, PropertyRecord, SubjectId, SubjectSummary, Urgency};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub estimated_value: f64,
    pub deal_quality: DealQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub urgency: Urgency,
    pub subject: SubjectSummary,
}

/// Handle to content drafted by the outreach service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachDraft {
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub reference: String,
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, record: &PropertyRecord) -> Result<AnalysisReport, CollaboratorError>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait OutreachService: Send + Sync {
    async fn draft(
        &self,
        template_id: &str,
        record: &PropertyRecord,
    ) -> Result<OutreachDraft, CollaboratorError>;
}

#[async_trait]
pub trait WatchlistService: Send + Sync {
    async fn add(
        &self,
        subject: &SubjectId,
        config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError>;
}

#[async_trait]
pub trait AlertService: Send + Sync {
    async fn schedule_alert(
        &self,
        subject: &SubjectId,
        config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError>;
}

/// The set of services the dispatcher calls, one per action kind.
#[derive(Clone)]
pub struct Collaborators {
    pub analysis: Arc<dyn AnalysisService>,
    pub notifications: Arc<dyn NotificationService>,
    pub outreach: Arc<dyn OutreachService>,
    pub watchlist: Arc<dyn WatchlistService>,
    pub alerts: Arc<dyn AlertService>,
}
