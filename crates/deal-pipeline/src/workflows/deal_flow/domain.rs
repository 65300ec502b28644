use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned to a deal flow when its property is first submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

/// Reference to the external property record a flow tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl DealQuality {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[default]
    Standard,
    Foreclosure,
    ShortSale,
    Auction,
}

impl ListingType {
    pub fn from_label(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "" | "standard" | "resale" => Some(Self::Standard),
            "foreclosure" | "reo" | "bankowned" => Some(Self::Foreclosure),
            "shortsale" => Some(Self::ShortSale),
            "auction" => Some(Self::Auction),
            _ => None,
        }
    }
}

/// Named features that stage criteria may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTag {
    OwnerFinancing,
    LeaseToOwn,
    FirstTimeBuyerEligible,
}

impl FeatureTag {
    pub const fn ordered() -> [Self; 3] {
        [
            Self::OwnerFinancing,
            Self::LeaseToOwn,
            Self::FirstTimeBuyerEligible,
        ]
    }
}

/// Financing and eligibility flags carried on a property record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFlags {
    #[serde(default)]
    pub owner_financing: bool,
    #[serde(default)]
    pub lease_to_own: bool,
    #[serde(default)]
    pub first_time_buyer_eligible: bool,
}

/// External property record as reported by the discovery feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: SubjectId,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub list_price: Option<u64>,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub deal_quality: Option<DealQuality>,
    #[serde(default)]
    pub listing_type: ListingType,
    #[serde(default)]
    pub flags: PropertyFlags,
}

impl PropertyRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: SubjectId(id.into()),
            address: String::new(),
            list_price: None,
            score: None,
            deal_quality: None,
            listing_type: ListingType::Standard,
            flags: PropertyFlags::default(),
        }
    }

    pub fn summary(&self) -> SubjectSummary {
        SubjectSummary {
            subject_id: self.id.clone(),
            address: self.address.clone(),
            list_price: self.list_price,
            score: self.score,
        }
    }
}

/// Short description of a subject handed to notification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub address: String,
    pub list_price: Option<u64>,
    pub score: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Analyze,
    Notify,
    DraftOutreach,
    AddToWatchlist,
    ScheduleAlert,
}

impl ActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Notify => "notify",
            Self::DraftOutreach => "draft_outreach",
            Self::AddToWatchlist => "add_to_watchlist",
            Self::ScheduleAlert => "schedule_alert",
        }
    }
}

/// When an action runs relative to stage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTrigger {
    /// Runs during stage entry, before the stage settles.
    Immediate,
    /// Runs `delay_minutes` after the stage was entered.
    Delayed { delay_minutes: u32 },
    /// Runs off the entry path once the stage settles; any recurrence is
    /// carried in the action config for the collaborator to honor.
    Scheduled,
}

/// Opaque settings forwarded to the collaborator behind an action.
pub type ActionConfig = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub trigger: ActionTrigger,
    #[serde(default)]
    pub config: ActionConfig,
}

impl ActionSpec {
    pub fn immediate(kind: ActionKind) -> Self {
        Self {
            kind,
            trigger: ActionTrigger::Immediate,
            config: ActionConfig::new(),
        }
    }

    pub fn delayed(kind: ActionKind, delay_minutes: u32) -> Self {
        Self {
            kind,
            trigger: ActionTrigger::Delayed { delay_minutes },
            config: ActionConfig::new(),
        }
    }

    pub fn scheduled(kind: ActionKind) -> Self {
        Self {
            kind,
            trigger: ActionTrigger::Scheduled,
            config: ActionConfig::new(),
        }
    }

    pub fn with_config(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Completed,
    Failed,
}

impl ActionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

/// Recorded outcome of one action run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_kind: ActionKind,
    pub status: ActionStatus,
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn pending(action_kind: ActionKind) -> Self {
        Self {
            action_kind,
            status: ActionStatus::Pending,
            executed_at: None,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: StageId,
    pub entered_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actions: Vec<ActionResult>,
}

impl StageEntry {
    fn open(stage: StageId, entered_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            entered_at,
            completed_at: None,
            actions: Vec::new(),
        }
    }

    /// Minutes spent in the stage, once it has been left.
    pub fn dwell_minutes(&self) -> Option<f64> {
        let completed_at = self.completed_at?;
        let elapsed = completed_at.signed_duration_since(self.entered_at);
        Some(elapsed.num_milliseconds() as f64 / 60_000.0)
    }
}

/// Per-property workflow instance. Only the engine mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealFlow {
    pub id: FlowId,
    pub subject_id: SubjectId,
    pub current_stage: StageId,
    pub stage_history: Vec<StageEntry>,
    pub priority: u8,
    pub estimated_value: Option<f64>,
    pub deal_quality: Option<DealQuality>,
    pub auto_actions_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DealFlow {
    /// Creates a flow already sitting in `entry_stage`.
    pub(crate) fn new(
        id: FlowId,
        subject_id: SubjectId,
        entry_stage: StageId,
        priority: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_id,
            current_stage: entry_stage.clone(),
            stage_history: vec![StageEntry::open(entry_stage, now)],
            priority,
            estimated_value: None,
            deal_quality: None,
            auto_actions_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_entry(&self) -> Option<&StageEntry> {
        self.stage_history.last()
    }

    /// Index of the entry for the current stage.
    pub fn current_entry_index(&self) -> usize {
        self.stage_history.len().saturating_sub(1)
    }

    /// Closes the open entry and opens one for `stage`, returning its index.
    pub(crate) fn enter_stage(&mut self, stage: StageId, now: DateTime<Utc>) -> usize {
        if let Some(last) = self.stage_history.last_mut() {
            if last.completed_at.is_none() {
                last.completed_at = Some(now);
            }
        }

        self.stage_history.push(StageEntry::open(stage.clone(), now));
        self.current_stage = stage;
        self.updated_at = now;
        self.stage_history.len() - 1
    }

    /// Appends `result` to the entry at `entry_index`, which may be historical.
    pub(crate) fn record_action(
        &mut self,
        entry_index: usize,
        result: ActionResult,
        now: DateTime<Utc>,
    ) -> bool {
        match self.stage_history.get_mut(entry_index) {
            Some(entry) => {
                entry.actions.push(result);
                self.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Applies the outcome of a successful analysis run.
    pub(crate) fn apply_analysis(&mut self, estimated_value: f64, quality: DealQuality) {
        self.estimated_value = Some(estimated_value);
        self.deal_quality = Some(quality);
    }
}
