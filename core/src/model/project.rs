//! Project document: top-level grouping for teams and tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

/// Stable, named container of tasks — distinct from the transient Session
/// concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project: String,
    pub team: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default = "default_project_phase")]
    pub phase: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: ProjectStats,
}

/// Project documents carry a free-text phase label distinct from the
/// session phase state machine; "active" is the conventional default.
fn default_project_phase() -> String {
    "active".to_string()
}

impl Project {
    pub fn new(project: impl Into<String>, team: impl Into<String>, goal: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            project: project.into(),
            team: team.into(),
            goal: goal.into(),
            phase: "active".to_string(),
            created_at: now,
            updated_at: now,
            stats: ProjectStats::default(),
        }
    }
}
