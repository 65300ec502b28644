use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::catalog::StageCatalog;
use super::domain::{DealFlow, FlowId, PropertyRecord, StageId, SubjectId};
use super::engine::PipelineError;
use super::stats::PipelineStats;

/// Storage abstraction for deal flows so the engine can be exercised in isolation.
pub trait FlowRepository: Send + Sync {
    fn insert(&self, flow: DealFlow) -> Result<DealFlow, RepositoryError>;
    fn update(&self, flow: DealFlow) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &FlowId) -> Result<Option<DealFlow>, RepositoryError>;
    fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<DealFlow>, RepositoryError>;
    fn list(&self) -> Result<Vec<DealFlow>, RepositoryError>;
}

/// Read/write access to the external property records flows refer to.
pub trait PropertyDirectory: Send + Sync {
    fn fetch(&self, id: &SubjectId) -> Result<Option<PropertyRecord>, RepositoryError>;
    fn upsert(&self, record: PropertyRecord) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("storage mutex poisoned".to_string()))
}

/// Process-local flow storage, ordered by flow id.
#[derive(Default, Clone)]
pub struct InMemoryFlowRepository {
    flows: Arc<Mutex<BTreeMap<FlowId, DealFlow>>>,
}

impl FlowRepository for InMemoryFlowRepository {
    fn insert(&self, flow: DealFlow) -> Result<DealFlow, RepositoryError> {
        let mut guard = lock(&self.flows)?;
        if guard.contains_key(&flow.id)
            || guard
                .values()
                .any(|existing| existing.subject_id == flow.subject_id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(flow.id.clone(), flow.clone());
        Ok(flow)
    }

    fn update(&self, flow: DealFlow) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.flows)?;
        match guard.get_mut(&flow.id) {
            Some(slot) => {
                *slot = flow;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &FlowId) -> Result<Option<DealFlow>, RepositoryError> {
        Ok(lock(&self.flows)?.get(id).cloned())
    }

    fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<DealFlow>, RepositoryError> {
        Ok(lock(&self.flows)?
            .values()
            .find(|flow| &flow.subject_id == subject)
            .cloned())
    }

    fn list(&self) -> Result<Vec<DealFlow>, RepositoryError> {
        Ok(lock(&self.flows)?.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPropertyDirectory {
    records: Arc<Mutex<HashMap<SubjectId, PropertyRecord>>>,
}

impl PropertyDirectory for InMemoryPropertyDirectory {
    fn fetch(&self, id: &SubjectId) -> Result<Option<PropertyRecord>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn upsert(&self, record: PropertyRecord) -> Result<(), RepositoryError> {
        lock(&self.records)?.insert(record.id.clone(), record);
        Ok(())
    }
}

/// Read-only views over stored flows for dashboards and the HTTP layer.
#[derive(Clone)]
pub struct FlowRegistry {
    repository: Arc<dyn FlowRepository>,
    catalog: Arc<StageCatalog>,
}

impl FlowRegistry {
    pub fn new(repository: Arc<dyn FlowRepository>, catalog: Arc<StageCatalog>) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    pub fn get_flow(&self, id: &FlowId) -> Result<DealFlow, PipelineError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| PipelineError::UnknownFlow(id.clone()))
    }

    /// Flows not yet in a terminal stage, highest priority first.
    pub fn list_active_flows(&self) -> Result<Vec<DealFlow>, PipelineError> {
        let mut flows: Vec<DealFlow> = self
            .repository
            .list()?
            .into_iter()
            .filter(|flow| !self.catalog.is_terminal(&flow.current_stage))
            .collect();
        flows.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(flows)
    }

    pub fn list_flows_by_stage(&self, stage: &StageId) -> Result<Vec<DealFlow>, PipelineError> {
        if self.catalog.stage(stage).is_none() {
            return Err(PipelineError::UnknownStage(stage.clone()));
        }

        Ok(self
            .repository
            .list()?
            .into_iter()
            .filter(|flow| &flow.current_stage == stage)
            .collect())
    }

    pub fn pipeline_stats(&self) -> Result<PipelineStats, PipelineError> {
        let flows = self.repository.list()?;
        Ok(PipelineStats::from_flows(&self.catalog, &flows))
    }
}
