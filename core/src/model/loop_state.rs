//! Loop state marker document: tracks iteration progress for a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub active: bool,
    pub project: String,
    pub team: String,
    pub role: String,
    pub started_at: DateTime<Utc>,
    pub session_id: String,
}
