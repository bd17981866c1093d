//! Session document: one planning/execution/verification run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Planning,
    Execution,
    Verification,
    Complete,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Cancelled | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Planning => "PLANNING",
            Phase::Execution => "EXECUTION",
            Phase::Verification => "VERIFICATION",
            Phase::Complete => "COMPLETE",
            Phase::Cancelled => "CANCELLED",
            Phase::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStage {
    NotStarted,
    Overview,
    Analyzing,
    Targeted,
    Complete,
}

impl std::fmt::Display for ExplorationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExplorationStage::NotStarted => "not_started",
            ExplorationStage::Overview => "overview",
            ExplorationStage::Analyzing => "analyzing",
            ExplorationStage::Targeted => "targeted",
            ExplorationStage::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Session-scoped knobs, a closed set of fields accepted at init time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub max_workers: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub plan_only: bool,
    #[serde(default)]
    pub auto_mode: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub use_worktree: bool,
}

fn default_max_iterations() -> u32 {
    5
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_workers: 0,
            max_iterations: default_max_iterations(),
            skip_verify: false,
            plan_only: false,
            auto_mode: false,
            force: false,
            resume: false,
            use_worktree: false,
        }
    }
}

/// One typed evidence record in a session's append-only evidence log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub detail: HashMap<String, serde_json::Value>,
}

impl EvidenceRecord {
    pub fn new(kind: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            timestamp,
            detail: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl Default for PlanInfo {
    fn default() -> Self {
        Self { approved_at: None }
    }
}

/// One invocation of the plan/execute/verify pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default = "schema_version")]
    pub version: u32,
    pub goal: String,
    pub working_dir: PathBuf,
    pub phase: Phase,
    pub exploration_stage: ExplorationStage,
    pub iteration: u32,
    pub options: SessionOptions,
    #[serde(default)]
    pub evidence_log: Vec<EvidenceRecord>,
    #[serde(default)]
    pub plan: PlanInfo,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

fn schema_version() -> u32 {
    1
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        goal: impl Into<String>,
        working_dir: PathBuf,
        options: SessionOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            version: schema_version(),
            goal: goal.into(),
            working_dir,
            phase: Phase::Planning,
            exploration_stage: ExplorationStage::NotStarted,
            iteration: 1,
            options,
            evidence_log: Vec::new(),
            plan: PlanInfo::default(),
            started_at: Some(now),
            updated_at: now,
            cancelled_at: None,
        }
    }
}
