//! Wave plan document: per-wave task grouping and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Planning,
    InProgress,
    Completed,
    Verified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub id: u32,
    pub status: WaveStatus,
    pub tasks: Vec<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WavePlan {
    pub total_waves: u32,
    pub current_wave: u32,
    pub waves: Vec<Wave>,
}
