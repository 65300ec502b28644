use async_trait::async_trait;
use deal_pipeline::config::AppConfig;
use deal_pipeline::error::AppError;
use deal_pipeline::workflows::deal_flow::{
    Acknowledgement, ActionConfig, AlertService, AnalysisReport, AnalysisService,
    CollaboratorError, Collaborators, DealFlowEngine, DealQuality, Notification,
    NotificationService, OutreachDraft, OutreachService, PropertyRecord, StageCatalog, SubjectId,
    WatchlistService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Deterministic stand-in for the valuation service: quality follows the
/// discovery score, value scales the list price by quality.
#[derive(Default)]
pub(crate) struct ScoreBasedAnalysis;

impl ScoreBasedAnalysis {
    fn quality_for(score: Option<u8>) -> DealQuality {
        match score.unwrap_or(0) {
            85..=u8::MAX => DealQuality::Excellent,
            70..=84 => DealQuality::Good,
            50..=69 => DealQuality::Fair,
            _ => DealQuality::Poor,
        }
    }

    fn value_multiplier(quality: DealQuality) -> f64 {
        match quality {
            DealQuality::Excellent => 1.12,
            DealQuality::Good => 1.05,
            DealQuality::Fair => 1.0,
            DealQuality::Poor => 0.92,
        }
    }
}

#[async_trait]
impl AnalysisService for ScoreBasedAnalysis {
    async fn analyze(&self, record: &PropertyRecord) -> Result<AnalysisReport, CollaboratorError> {
        let Some(list_price) = record.list_price else {
            return Err(CollaboratorError::rejected(
                "analysis",
                format!("{} has no list price", record.id),
            ));
        };

        let deal_quality = Self::quality_for(record.score);
        Ok(AnalysisReport {
            estimated_value: (list_price as f64 * Self::value_multiplier(deal_quality)).round(),
            deal_quality,
        })
    }
}

/// Logs notifications and keeps them for the demo summary.
#[derive(Default)]
pub(crate) struct LoggingNotifications {
    sent: Mutex<Vec<Notification>>,
}

impl LoggingNotifications {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationService for LoggingNotifications {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        info!(
            subject = %notification.subject.subject_id,
            urgency = notification.urgency.label(),
            title = %notification.title,
            "notification sent"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TemplateOutreach {
    drafted: AtomicU64,
}

#[async_trait]
impl OutreachService for TemplateOutreach {
    async fn draft(
        &self,
        template_id: &str,
        record: &PropertyRecord,
    ) -> Result<OutreachDraft, CollaboratorError> {
        let sequence = self.drafted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(subject = %record.id, template = template_id, "outreach drafted");
        Ok(OutreachDraft {
            handle: format!("draft-{sequence:04}-{template_id}"),
        })
    }
}

#[derive(Default)]
pub(crate) struct InMemoryWatchlist {
    subjects: Mutex<BTreeSet<SubjectId>>,
}

impl InMemoryWatchlist {
    pub(crate) fn len(&self) -> usize {
        self.subjects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl WatchlistService for InMemoryWatchlist {
    async fn add(
        &self,
        subject: &SubjectId,
        config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError> {
        let list = config
            .get("list")
            .and_then(|value| value.as_str())
            .unwrap_or("default");
        self.subjects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.clone());
        Ok(Acknowledgement {
            reference: format!("{list}/{subject}"),
        })
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAlerts {
    scheduled: Mutex<Vec<(SubjectId, String)>>,
}

impl InMemoryAlerts {
    pub(crate) fn len(&self) -> usize {
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl AlertService for InMemoryAlerts {
    async fn schedule_alert(
        &self,
        subject: &SubjectId,
        config: &ActionConfig,
    ) -> Result<Acknowledgement, CollaboratorError> {
        let alert = config
            .get("alert")
            .and_then(|value| value.as_str())
            .unwrap_or("generic")
            .to_string();
        let mut scheduled = self.scheduled.lock().unwrap_or_else(PoisonError::into_inner);
        scheduled.push((subject.clone(), alert.clone()));
        Ok(Acknowledgement {
            reference: format!("alert-{:04}-{alert}", scheduled.len()),
        })
    }
}

/// Process-local collaborator adapters wired into the engine.
#[derive(Clone, Default)]
pub(crate) struct LocalServices {
    pub(crate) analysis: Arc<ScoreBasedAnalysis>,
    pub(crate) notifications: Arc<LoggingNotifications>,
    pub(crate) outreach: Arc<TemplateOutreach>,
    pub(crate) watchlist: Arc<InMemoryWatchlist>,
    pub(crate) alerts: Arc<InMemoryAlerts>,
}

impl LocalServices {
    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            analysis: self.analysis.clone(),
            notifications: self.notifications.clone(),
            outreach: self.outreach.clone(),
            watchlist: self.watchlist.clone(),
            alerts: self.alerts.clone(),
        }
    }
}

pub(crate) fn load_catalog(config: &AppConfig) -> Result<StageCatalog, AppError> {
    match &config.pipeline.catalog_path {
        Some(path) => {
            let catalog = StageCatalog::from_path(path)?;
            info!(path = %path.display(), stages = catalog.stages().len(), "stage catalog loaded");
            Ok(catalog)
        }
        None => Ok(StageCatalog::standard()),
    }
}

pub(crate) fn build_engine(
    config: &AppConfig,
    services: &LocalServices,
) -> Result<DealFlowEngine, AppError> {
    Ok(DealFlowEngine::builder(services.collaborators())
        .catalog(load_catalog(config)?)
        .config(&config.pipeline)
        .build())
}
