//! Stage-based deal flow pipeline.
//!
//! A discovered property record becomes a [`DealFlow`] that the
//! [`DealFlowEngine`] moves through the [`StageCatalog`]: each stage gates
//! entry on its criteria, runs its actions through the dispatcher, and arms a
//! timer that later asks the [`AdvancementPolicy`] whether to move on.

pub mod catalog;
pub mod collaborators;
pub mod criteria;
pub(crate) mod dispatcher;
pub mod domain;
pub mod engine;
pub mod policy;
pub mod priority;
pub mod registry;
pub mod router;
pub(crate) mod scheduler;
pub mod stats;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, Stage, StageCatalog, StageCriteria};
pub use collaborators::{
    Acknowledgement, AlertService, AnalysisReport, AnalysisService, CollaboratorError,
    Collaborators, Notification, NotificationService, OutreachDraft, OutreachService,
    WatchlistService,
};
pub use domain::{
    ActionConfig, ActionKind, ActionResult, ActionSpec, ActionStatus, ActionTrigger, DealFlow,
    DealQuality, FeatureTag, FlowId, ListingType, PropertyFlags, PropertyRecord, StageEntry,
    StageId, SubjectId, SubjectSummary, Urgency,
};
pub use engine::{DealFlowEngine, DealFlowEngineBuilder, PipelineError};
pub use policy::{AdvancementPolicy, DefaultAdvancementPolicy};
pub use priority::priority_score;
pub use registry::{
    FlowRegistry, FlowRepository, InMemoryFlowRepository, InMemoryPropertyDirectory,
    PropertyDirectory, RepositoryError,
};
pub use router::pipeline_router;
pub use stats::{PipelineStats, StageCount, StageDwell};
