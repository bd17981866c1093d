//! Worker document: one tmux-paned swarm participant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
    NotFound,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub role: String,
    pub pane: u32,
    #[serde(default)]
    pub worktree: Option<PathBuf>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub status: WorkerStatus,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub tasks_completed: Vec<String>,
    pub last_heartbeat: DateTime<Utc>,
    /// Reason recorded when the last external-collaborator call for this
    /// worker failed (pane host / workspace provider). Cleared on success.
    #[serde(default)]
    pub last_heartbeat_reason: Option<String>,
}

impl Worker {
    pub fn new(id: impl Into<String>, role: impl Into<String>, pane: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            pane,
            worktree: None,
            branch: None,
            session_id: None,
            status: WorkerStatus::Idle,
            current_task: None,
            tasks_completed: Vec::new(),
            last_heartbeat: now,
            last_heartbeat_reason: None,
        }
    }

    /// Numeric suffix of `w1`, `w2`, `w10`, ... used for non-lexicographic
    /// sort order.
    pub fn numeric_suffix(&self) -> u64 {
        self.id
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .chars()
            .rev()
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    }
}
