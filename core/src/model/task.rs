//! Task document: one unit of work within a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Resolved,
    Failed,
    Pending,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Resolved => "resolved",
            TaskStatus::Failed => "failed",
            TaskStatus::Pending => "pending",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Standard,
    Complex,
}

/// One unit of work within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub complexity: Complexity,
    pub status: TaskStatus,
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub wave: Option<u32>,
    pub version: u64,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by `TaskStore::create`.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub subject: String,
    pub description: String,
    pub role: Option<String>,
    pub domain: Option<String>,
    pub complexity: Option<Complexity>,
    pub blocked_by: BTreeSet<String>,
    pub criteria: Vec<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, fields: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            subject: fields.subject,
            description: fields.description,
            role: fields.role,
            domain: fields.domain,
            complexity: fields.complexity.unwrap_or(Complexity::Standard),
            status: TaskStatus::Open,
            blocked_by: fields.blocked_by,
            criteria: fields.criteria,
            evidence: Vec::new(),
            claimed_by: None,
            claimed_at: None,
            wave: None,
            version: 1,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == TaskStatus::Open && self.claimed_by.is_none()
    }
}
