use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::catalog::{Stage, StageCatalog};
use super::collaborators::Collaborators;
use super::criteria;
use super::dispatcher::{analysis_report, ActionDispatcher};
use super::domain::{
    ActionResult, ActionSpec, ActionTrigger, DealFlow, FlowId, PropertyRecord, StageId, SubjectId,
};
use super::policy::{AdvancementPolicy, DefaultAdvancementPolicy};
use super::priority::priority_score;
use super::registry::{
    FlowRegistry, FlowRepository, InMemoryFlowRepository, InMemoryPropertyDirectory,
    PropertyDirectory, RepositoryError,
};
use super::scheduler::{Scheduler, TimerKind};
use super::stats::PipelineStats;
use crate::config::PipelineConfig;

/// Error raised by the engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown deal flow '{0}'")]
    UnknownFlow(FlowId),
    #[error("unknown stage '{0}'")]
    UnknownStage(StageId),
    #[error("no property record for subject '{0}'")]
    UnknownSubject(SubjectId),
    #[error("subject '{subject}' already has deal flow '{existing}'")]
    DuplicateSubject { subject: SubjectId, existing: FlowId },
    #[error("deal flow '{flow}' is closed in terminal stage '{stage}'")]
    TerminalFlow { flow: FlowId, stage: StageId },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One async mutex per flow id; serializes every mutation of that flow.
#[derive(Default)]
struct FlowLocks {
    locks: Mutex<HashMap<FlowId, Arc<AsyncMutex<()>>>>,
}

impl FlowLocks {
    fn for_flow(&self, id: &FlowId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.clone()).or_default().clone()
    }
}

/// Assembles an engine from its collaborators and optional overrides.
pub struct DealFlowEngineBuilder {
    collaborators: Collaborators,
    catalog: StageCatalog,
    repository: Arc<dyn FlowRepository>,
    directory: Arc<dyn PropertyDirectory>,
    policy: Arc<dyn AdvancementPolicy>,
    auto_advance_delay: Duration,
}

impl DealFlowEngineBuilder {
    pub fn catalog(mut self, catalog: StageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn repository(mut self, repository: Arc<dyn FlowRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn PropertyDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn policy(mut self, policy: Arc<dyn AdvancementPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn auto_advance_delay(mut self, delay: Duration) -> Self {
        self.auto_advance_delay = delay;
        self
    }

    pub fn config(self, config: &PipelineConfig) -> Self {
        self.auto_advance_delay(config.auto_advance_delay)
    }

    pub fn build(self) -> DealFlowEngine {
        let catalog = Arc::new(self.catalog);
        let registry = FlowRegistry::new(self.repository.clone(), catalog.clone());

        DealFlowEngine {
            inner: Arc::new(EngineInner {
                catalog,
                repository: self.repository,
                directory: self.directory,
                dispatcher: ActionDispatcher::new(self.collaborators),
                policy: self.policy,
                scheduler: Scheduler::new(),
                registry,
                locks: FlowLocks::default(),
                sequence: AtomicU64::new(1),
                auto_advance_delay: self.auto_advance_delay,
            }),
        }
    }
}

/// Owns deal flows and drives them through the stage catalog.
///
/// Cloning is cheap; clones share flows, locks and timers. Must be used from
/// within a tokio runtime because stage entry arms timers.
#[derive(Clone)]
pub struct DealFlowEngine {
    inner: Arc<EngineInner>,
}

impl DealFlowEngine {
    pub fn builder(collaborators: Collaborators) -> DealFlowEngineBuilder {
        DealFlowEngineBuilder {
            collaborators,
            catalog: StageCatalog::standard(),
            repository: Arc::new(InMemoryFlowRepository::default()),
            directory: Arc::new(InMemoryPropertyDirectory::default()),
            policy: Arc::new(DefaultAdvancementPolicy),
            auto_advance_delay: PipelineConfig::default().auto_advance_delay,
        }
    }

    /// Creates a flow for a newly discovered property and runs the entry stage.
    pub async fn submit_new_record(&self, record: PropertyRecord) -> Result<FlowId, PipelineError> {
        self.inner.submit_new_record(record).await
    }

    /// Moves a flow to `target`, or to the archived stage if it fails `target`'s criteria.
    pub async fn advance_to_stage(
        &self,
        flow_id: &FlowId,
        target: &StageId,
    ) -> Result<DealFlow, PipelineError> {
        self.inner.advance_to_stage(flow_id, target).await
    }

    pub async fn pause_auto_actions(&self, flow_id: &FlowId) -> Result<DealFlow, PipelineError> {
        self.inner.set_auto_actions(flow_id, false).await
    }

    /// Re-enables auto actions and arms a fresh auto-advancement check.
    pub async fn resume_auto_actions(&self, flow_id: &FlowId) -> Result<DealFlow, PipelineError> {
        self.inner.set_auto_actions(flow_id, true).await
    }

    /// Replaces the stored property record; later checks observe the new values.
    pub fn refresh_record(&self, record: PropertyRecord) -> Result<(), PipelineError> {
        self.inner.directory.upsert(record)?;
        Ok(())
    }

    pub fn get_flow(&self, flow_id: &FlowId) -> Result<DealFlow, PipelineError> {
        self.inner.registry.get_flow(flow_id)
    }

    pub fn list_active_flows(&self) -> Result<Vec<DealFlow>, PipelineError> {
        self.inner.registry.list_active_flows()
    }

    pub fn list_flows_by_stage(&self, stage: &StageId) -> Result<Vec<DealFlow>, PipelineError> {
        self.inner.registry.list_flows_by_stage(stage)
    }

    pub fn pipeline_stats(&self) -> Result<PipelineStats, PipelineError> {
        self.inner.registry.pipeline_stats()
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.inner.registry
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.inner.catalog
    }

    /// Timers armed but not yet finished.
    pub fn pending_timers(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Aborts outstanding timers; call once at process teardown.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }
}

struct EngineInner {
    catalog: Arc<StageCatalog>,
    repository: Arc<dyn FlowRepository>,
    directory: Arc<dyn PropertyDirectory>,
    dispatcher: ActionDispatcher,
    policy: Arc<dyn AdvancementPolicy>,
    scheduler: Scheduler,
    registry: FlowRegistry,
    locks: FlowLocks,
    sequence: AtomicU64,
    auto_advance_delay: Duration,
}

impl EngineInner {
    fn next_flow_id(&self) -> FlowId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        FlowId(format!("flow-{id:06}"))
    }

    fn stage(&self, id: &StageId) -> Result<&Stage, PipelineError> {
        self.catalog
            .stage(id)
            .ok_or_else(|| PipelineError::UnknownStage(id.clone()))
    }

    fn load(&self, flow_id: &FlowId) -> Result<DealFlow, PipelineError> {
        self.repository
            .fetch(flow_id)?
            .ok_or_else(|| PipelineError::UnknownFlow(flow_id.clone()))
    }

    fn ensure_open(&self, flow: &DealFlow) -> Result<(), PipelineError> {
        if self.catalog.is_terminal(&flow.current_stage) {
            return Err(PipelineError::TerminalFlow {
                flow: flow.id.clone(),
                stage: flow.current_stage.clone(),
            });
        }
        Ok(())
    }

    /// The stored record with the flow's latest analysis applied.
    fn effective_record(&self, flow: &DealFlow) -> Result<PropertyRecord, PipelineError> {
        let mut record = self
            .directory
            .fetch(&flow.subject_id)?
            .ok_or_else(|| PipelineError::UnknownSubject(flow.subject_id.clone()))?;
        if let Some(quality) = flow.deal_quality {
            record.deal_quality = Some(quality);
        }
        Ok(record)
    }

    async fn submit_new_record(
        self: &Arc<Self>,
        record: PropertyRecord,
    ) -> Result<FlowId, PipelineError> {
        if let Some(existing) = self.repository.find_by_subject(&record.id)? {
            return Err(PipelineError::DuplicateSubject {
                subject: record.id,
                existing: existing.id,
            });
        }

        let subject = record.id.clone();
        let priority = priority_score(&record);
        self.directory.upsert(record)?;

        let flow_id = self.next_flow_id();
        let flow = DealFlow::new(
            flow_id.clone(),
            subject.clone(),
            self.catalog.entry_stage().clone(),
            priority,
            Utc::now(),
        );

        let lock = self.locks.for_flow(&flow_id);
        let _guard = lock.lock().await;

        let mut flow = match self.repository.insert(flow) {
            Ok(flow) => flow,
            Err(RepositoryError::Conflict) => {
                let existing = self
                    .repository
                    .find_by_subject(&subject)?
                    .ok_or(RepositoryError::Conflict)?;
                return Err(PipelineError::DuplicateSubject {
                    subject,
                    existing: existing.id,
                });
            }
            Err(other) => return Err(other.into()),
        };
        info!(flow_id = %flow_id, subject = %subject, priority, "deal flow created");

        self.settle_current_stage(&mut flow).await?;
        self.repository.update(flow.clone())?;
        self.schedule_auto_advance(&flow);

        Ok(flow_id)
    }

    async fn advance_to_stage(
        self: &Arc<Self>,
        flow_id: &FlowId,
        target: &StageId,
    ) -> Result<DealFlow, PipelineError> {
        self.stage(target)?;

        let lock = self.locks.for_flow(flow_id);
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id)?;
        self.ensure_open(&flow)?;
        self.transition(&mut flow, target.clone()).await?;
        Ok(flow)
    }

    async fn set_auto_actions(
        self: &Arc<Self>,
        flow_id: &FlowId,
        enabled: bool,
    ) -> Result<DealFlow, PipelineError> {
        let lock = self.locks.for_flow(flow_id);
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id)?;
        self.ensure_open(&flow)?;
        flow.auto_actions_enabled = enabled;
        flow.updated_at = Utc::now();
        self.repository.update(flow.clone())?;
        info!(flow_id = %flow_id, enabled, "auto actions toggled");

        if enabled {
            self.schedule_auto_advance(&flow);
        }
        Ok(flow)
    }

    /// Enters `target`, settles it, persists the flow and arms the next check.
    /// Caller holds the flow lock.
    async fn transition(
        self: &Arc<Self>,
        flow: &mut DealFlow,
        target: StageId,
    ) -> Result<(), PipelineError> {
        let previous = flow.current_stage.clone();
        flow.enter_stage(target, Utc::now());
        info!(
            flow_id = %flow.id,
            from = %previous,
            to = %flow.current_stage,
            "stage entered"
        );

        self.settle_current_stage(flow).await?;
        self.repository.update(flow.clone())?;
        self.schedule_auto_advance(flow);
        Ok(())
    }

    /// Checks the current stage's criteria and runs its actions, redirecting
    /// to the archived stage when the criteria fail.
    async fn settle_current_stage(
        self: &Arc<Self>,
        flow: &mut DealFlow,
    ) -> Result<(), PipelineError> {
        loop {
            let stage = self.stage(&flow.current_stage)?;
            let record = self.effective_record(flow)?;

            if criteria::evaluate(&record, &stage.criteria) {
                self.run_stage_actions(flow, &record, stage).await;
                return Ok(());
            }

            let archived = self.catalog.archived_stage().clone();
            if flow.current_stage == archived {
                warn!(flow_id = %flow.id, "archived stage criteria failed; leaving flow archived");
                return Ok(());
            }

            info!(
                flow_id = %flow.id,
                stage = %flow.current_stage,
                "stage criteria not met, archiving flow"
            );
            flow.enter_stage(archived, Utc::now());
        }
    }

    async fn run_stage_actions(
        self: &Arc<Self>,
        flow: &mut DealFlow,
        record: &PropertyRecord,
        stage: &Stage,
    ) {
        let entry_index = flow.current_entry_index();
        // Delayed offsets count from entry, not from when earlier actions return.
        let entered = Instant::now();

        for spec in &stage.actions {
            match spec.trigger {
                ActionTrigger::Immediate => {
                    let result = self.dispatcher.execute(&flow.id, record, spec).await;
                    self.apply_result(flow, entry_index, result);
                }
                ActionTrigger::Delayed { delay_minutes } => {
                    let deadline = entered + Duration::from_secs(u64::from(delay_minutes) * 60);
                    self.schedule_action(flow, entry_index, spec, TimerKind::DelayedAction, deadline);
                }
                ActionTrigger::Scheduled => {
                    self.schedule_action(
                        flow,
                        entry_index,
                        spec,
                        TimerKind::ScheduledAction,
                        Instant::now(),
                    );
                }
            }
        }
    }

    fn schedule_action(
        self: &Arc<Self>,
        flow: &DealFlow,
        entry_index: usize,
        spec: &ActionSpec,
        kind: TimerKind,
        deadline: Instant,
    ) {
        debug!(
            flow_id = %flow.id,
            action = spec.kind.label(),
            entry_index,
            delay_secs = deadline.saturating_duration_since(Instant::now()).as_secs(),
            "action scheduled"
        );

        let engine: Weak<Self> = Arc::downgrade(self);
        let flow_id = flow.id.clone();
        let spec = spec.clone();
        self.scheduler.schedule_at(kind, deadline, async move {
            let Some(engine) = engine.upgrade() else {
                return;
            };
            if let Err(error) = engine.run_timed_action(&flow_id, entry_index, &spec).await {
                warn!(flow_id = %flow_id, action = spec.kind.label(), %error, "timed action dropped");
            }
        });
    }

    fn schedule_auto_advance(self: &Arc<Self>, flow: &DealFlow) {
        if self.catalog.is_terminal(&flow.current_stage) {
            return;
        }

        let engine: Weak<Self> = Arc::downgrade(self);
        let flow_id = flow.id.clone();
        let history_len = flow.stage_history.len();
        self.scheduler
            .schedule(TimerKind::AutoAdvance, self.auto_advance_delay, async move {
                let Some(engine) = engine.upgrade() else {
                    return;
                };
                if let Err(error) = engine.run_auto_advance(&flow_id, history_len).await {
                    warn!(flow_id = %flow_id, %error, "auto-advancement check failed");
                }
            });
    }

    /// Fires a delayed or scheduled action. The collaborator call happens
    /// outside the flow lock; the result lands on the entry it was armed for.
    async fn run_timed_action(
        self: &Arc<Self>,
        flow_id: &FlowId,
        entry_index: usize,
        spec: &ActionSpec,
    ) -> Result<(), PipelineError> {
        let record = {
            let lock = self.locks.for_flow(flow_id);
            let _guard = lock.lock().await;
            let flow = self.load(flow_id)?;
            if !flow.auto_actions_enabled {
                info!(
                    flow_id = %flow_id,
                    action = spec.kind.label(),
                    "auto actions paused, skipping timed action"
                );
                return Ok(());
            }
            self.effective_record(&flow)?
        };

        let result = self.dispatcher.execute(flow_id, &record, spec).await;

        let lock = self.locks.for_flow(flow_id);
        let _guard = lock.lock().await;
        let mut flow = self.load(flow_id)?;
        self.apply_result(&mut flow, entry_index, result);
        self.repository.update(flow)?;
        Ok(())
    }

    /// Timer-driven re-check of whether a settled flow should move on.
    async fn run_auto_advance(
        self: &Arc<Self>,
        flow_id: &FlowId,
        history_len: usize,
    ) -> Result<(), PipelineError> {
        let lock = self.locks.for_flow(flow_id);
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id)?;
        if !flow.auto_actions_enabled {
            debug!(flow_id = %flow_id, "auto actions paused, skipping advancement check");
            return Ok(());
        }
        if self.catalog.is_terminal(&flow.current_stage) {
            return Ok(());
        }
        if flow.stage_history.len() != history_len {
            debug!(flow_id = %flow_id, "flow moved since check was armed, skipping");
            return Ok(());
        }

        let record = self.effective_record(&flow)?;
        let Some(next) = self.policy.choose_next_stage(&flow, &record) else {
            debug!(flow_id = %flow_id, stage = %flow.current_stage, "no automatic transition");
            return Ok(());
        };
        self.stage(&next)?;

        self.transition(&mut flow, next).await
    }

    /// Appends `result` to its entry. Analysis only updates the flow's value
    /// and quality while the flow is still open.
    fn apply_result(&self, flow: &mut DealFlow, entry_index: usize, result: ActionResult) {
        if let Some(report) = analysis_report(&result) {
            if self.catalog.is_terminal(&flow.current_stage) {
                debug!(flow_id = %flow.id, "flow closed, analysis recorded without updating the flow");
            } else {
                flow.apply_analysis(report.estimated_value, report.deal_quality);
            }
        }
        if !flow.record_action(entry_index, result, Utc::now()) {
            warn!(flow_id = %flow.id, entry_index, "stage entry missing, action result dropped");
        }
    }
}
