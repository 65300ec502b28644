use super::domain::{ActionKind, ActionSpec, DealQuality, FeatureTag, StageId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

pub const DISCOVERY: &str = "discovery";
pub const QUALIFICATION: &str = "qualification";
pub const EVALUATION: &str = "evaluation";
pub const HOT_LEAD: &str = "hot_lead";
pub const CONTACTED: &str = "contacted";
pub const NEGOTIATING: &str = "negotiating";
pub const UNDER_CONTRACT: &str = "under_contract";
pub const CLOSED: &str = "closed";
pub const ARCHIVED: &str = "archived";

/// Conjunction of optional entry predicates. Empty means always passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_features: BTreeSet<FeatureTag>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub deal_quality: BTreeSet<DealQuality>,
}

impl StageCriteria {
    pub fn is_empty(&self) -> bool {
        self.min_score.is_none()
            && self.max_price.is_none()
            && self.required_features.is_empty()
            && self.deal_quality.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub criteria: StageCriteria,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

/// Serialized shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    entry_stage: StageId,
    archived_stage: StageId,
    hot_stage: StageId,
    terminal_stages: Vec<StageId>,
    stages: Vec<Stage>,
}

/// Ordered, validated set of stages the engine moves flows through.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<Stage>,
    entry_stage: StageId,
    archived_stage: StageId,
    hot_stage: StageId,
    terminal_stages: BTreeSet<StageId>,
}

impl StageCatalog {
    pub fn new(
        stages: Vec<Stage>,
        entry_stage: StageId,
        archived_stage: StageId,
        hot_stage: StageId,
        terminal_stages: BTreeSet<StageId>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.id.clone()) {
                return Err(CatalogError::DuplicateStage(stage.id.clone()));
            }
        }

        for required in [&entry_stage, &archived_stage, &hot_stage]
            .into_iter()
            .chain(terminal_stages.iter())
        {
            if !seen.contains(required) {
                return Err(CatalogError::MissingStage(required.clone()));
            }
        }

        if !terminal_stages.contains(&archived_stage) {
            return Err(CatalogError::ArchivedNotTerminal(archived_stage));
        }
        if terminal_stages.contains(&entry_stage) {
            return Err(CatalogError::TerminalEntry(entry_stage));
        }

        for stage in &stages {
            if terminal_stages.contains(&stage.id) && !stage.actions.is_empty() {
                return Err(CatalogError::TerminalActions(stage.id.clone()));
            }
            if stage.id == archived_stage && !stage.criteria.is_empty() {
                return Err(CatalogError::ArchivedCriteria(stage.id.clone()));
            }
        }

        Ok(Self {
            stages,
            entry_stage,
            archived_stage,
            hot_stage,
            terminal_stages,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        Self::new(
            document.stages,
            document.entry_stage,
            document.archived_stage,
            document.hot_stage,
            document.terminal_stages.into_iter().collect(),
        )
    }

    pub fn standard() -> Self {
        Self {
            stages: standard_stages(),
            entry_stage: StageId::from(DISCOVERY),
            archived_stage: StageId::from(ARCHIVED),
            hot_stage: StageId::from(HOT_LEAD),
            terminal_stages: [StageId::from(CLOSED), StageId::from(ARCHIVED)]
                .into_iter()
                .collect(),
        }
    }

    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|stage| &stage.id == id)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn entry_stage(&self) -> &StageId {
        &self.entry_stage
    }

    pub fn archived_stage(&self) -> &StageId {
        &self.archived_stage
    }

    pub fn hot_stage(&self) -> &StageId {
        &self.hot_stage
    }

    pub fn is_terminal(&self, id: &StageId) -> bool {
        self.terminal_stages.contains(id)
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(StageId),
    #[error("stage '{0}' is referenced but not declared")]
    MissingStage(StageId),
    #[error("archived stage '{0}' must be terminal")]
    ArchivedNotTerminal(StageId),
    #[error("entry stage '{0}' cannot be terminal")]
    TerminalEntry(StageId),
    #[error("terminal stage '{0}' cannot declare actions")]
    TerminalActions(StageId),
    #[error("archived stage '{0}' must have empty criteria")]
    ArchivedCriteria(StageId),
    #[error("failed to read stage catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid stage catalog document: {0}")]
    Parse(#[from] serde_json::Error),
}

fn stage(id: &str, name: &str, description: &str) -> Stage {
    Stage {
        id: StageId::from(id),
        name: name.to_string(),
        description: description.to_string(),
        criteria: StageCriteria::default(),
        actions: Vec::new(),
    }
}

fn standard_stages() -> Vec<Stage> {
    vec![
        Stage {
            actions: vec![
                ActionSpec::immediate(ActionKind::Analyze).with_config("depth", "quick"),
            ],
            ..stage(
                DISCOVERY,
                "Discovery",
                "Newly discovered property awaiting a first automated pass.",
            )
        },
        Stage {
            criteria: StageCriteria {
                min_score: Some(40),
                max_price: Some(2_000_000),
                ..StageCriteria::default()
            },
            actions: vec![
                ActionSpec::immediate(ActionKind::AddToWatchlist).with_config("list", "qualified"),
                ActionSpec::delayed(ActionKind::ScheduleAlert, 60)
                    .with_config("alert", "price_change"),
            ],
            ..stage(
                QUALIFICATION,
                "Qualification",
                "Meets baseline score and price limits; tracked for changes.",
            )
        },
        Stage {
            criteria: StageCriteria {
                min_score: Some(60),
                ..StageCriteria::default()
            },
            actions: vec![
                ActionSpec::immediate(ActionKind::Analyze).with_config("depth", "full"),
                ActionSpec::immediate(ActionKind::Notify)
                    .with_config("title", "Property under evaluation")
                    .with_config("urgency", "medium"),
            ],
            ..stage(
                EVALUATION,
                "Evaluation",
                "Full analysis of value and deal quality.",
            )
        },
        Stage {
            criteria: StageCriteria {
                min_score: Some(80),
                deal_quality: [DealQuality::Excellent].into_iter().collect(),
                ..StageCriteria::default()
            },
            actions: vec![
                ActionSpec::immediate(ActionKind::Notify)
                    .with_config("title", "Hot lead identified")
                    .with_config("urgency", "critical"),
                ActionSpec::immediate(ActionKind::DraftOutreach)
                    .with_config("template", "initial_offer"),
                ActionSpec::delayed(ActionKind::ScheduleAlert, 24 * 60)
                    .with_config("alert", "follow_up"),
            ],
            ..stage(
                HOT_LEAD,
                "Hot Lead",
                "High-scoring, excellent-quality deal that warrants immediate outreach.",
            )
        },
        Stage {
            actions: vec![ActionSpec::delayed(ActionKind::ScheduleAlert, 3 * 24 * 60)
                .with_config("alert", "follow_up")],
            ..stage(
                CONTACTED,
                "Contacted",
                "Owner or listing agent has been contacted.",
            )
        },
        Stage {
            actions: vec![
                ActionSpec::immediate(ActionKind::Notify)
                    .with_config("title", "Negotiation opened")
                    .with_config("urgency", "high"),
                ActionSpec::scheduled(ActionKind::ScheduleAlert)
                    .with_config("alert", "negotiation_check_in")
                    .with_config("cadence", "daily"),
            ],
            ..stage(
                NEGOTIATING,
                "Negotiating",
                "Offer terms are being negotiated.",
            )
        },
        Stage {
            actions: vec![ActionSpec::immediate(ActionKind::Notify)
                .with_config("title", "Property under contract")
                .with_config("urgency", "high")],
            ..stage(
                UNDER_CONTRACT,
                "Under Contract",
                "Purchase agreement signed; awaiting close.",
            )
        },
        stage(CLOSED, "Closed", "Deal completed."),
        stage(
            ARCHIVED,
            "Archived",
            "Flow no longer pursued, including properties that failed stage criteria.",
        ),
    ]
}
