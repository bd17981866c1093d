//! Swarm plan document: the set of workers spawned for a team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    Running,
    Stopped,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmPlan {
    pub session: String,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub workers: Vec<String>,
    #[serde(default)]
    pub current_wave: u32,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub use_worktree: bool,
    pub source_dir: String,
    /// When the current pause was caused by a merge conflict, the time it
    /// was detected and which worker/files conflicted. `None` once the
    /// swarm is resumed past it.
    #[serde(default)]
    pub conflict_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conflict_worker: Option<String>,
    #[serde(default)]
    pub conflict_files: Vec<String>,
    /// Workers whose worktree merged cleanly before the conflicting one
    /// was hit, this wave.
    #[serde(default)]
    pub merged_before_conflict: Vec<String>,
    /// Workers whose merge was never attempted because the loop stopped
    /// at the conflict.
    #[serde(default)]
    pub not_merged: Vec<String>,
}
