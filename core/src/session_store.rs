//! C3 — Session Store.
//!
//! Domain layer over [`crate::store::AtomicStore`] for session documents:
//! phase transitions, exploration-stage progression, evidence-log append.

use crate::clock::Clock;
use crate::model::context::Context;
use crate::model::session::{EvidenceRecord, ExplorationStage, Phase, Session, SessionOptions};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already exists: {0}")]
    AlreadyExists(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("illegal phase transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Patch accepted by [`SessionStore::update`].
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub phase: Option<Phase>,
    pub exploration_stage: Option<ExplorationStage>,
    pub iteration: Option<u32>,
    pub plan_approved: bool,
}

pub struct SessionStore<'a, C: Clock> {
    store: AtomicStore,
    paths: &'a Paths,
    clock: &'a C,
}

impl<'a, C: Clock> SessionStore<'a, C> {
    pub fn new(paths: &'a Paths, clock: &'a C) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            clock,
        }
    }

    pub fn init(
        &self,
        session_id: &str,
        goal: &str,
        working_dir: PathBuf,
        options: SessionOptions,
    ) -> SessionResult<Session> {
        let path = self.paths.session_file(session_id);
        if path.exists() && !options.force {
            return Err(SessionError::AlreadyExists(session_id.to_string()));
        }
        let session = Session::new(session_id, goal, working_dir, options, self.clock.now());
        self.store.write_json(&path, &session)?;

        let context_path = self.paths.context_file(session_id);
        self.store.write_json(&context_path, &Context::default())?;

        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> SessionResult<Session> {
        let path = self.paths.session_file(session_id);
        self.store
            .read_json(&path)
            .map_err(|e| map_not_found(e, session_id))
    }

    /// Resolve a dotted field path (e.g. `"plan.approved_at"`) against the
    /// session document, returning it as a JSON value.
    pub fn get_field(&self, session_id: &str, field_path: &str) -> SessionResult<serde_json::Value> {
        let session = self.get(session_id)?;
        let value = serde_json::to_value(&session).expect("Session always serializes");
        navigate(&value, field_path).ok_or_else(|| SessionError::FieldNotFound(field_path.to_string()))
    }

    pub fn update(&self, session_id: &str, patch: SessionPatch) -> SessionResult<Session> {
        let path = self.paths.session_file(session_id);
        let now = self.clock.now();

        let result = self.store.update::<Session, _>(&path, |existing| {
            let mut session = existing.ok_or_else(|| {
                StoreError::NotFound(path.clone())
            })?;

            if session.phase.is_terminal() {
                return Err(abort(&path, session.phase, session.phase));
            }

            if let Some(new_phase) = patch.phase {
                let ok = validate_phase_transition(
                    session.phase,
                    new_phase,
                    session.iteration,
                    session.options.max_iterations,
                );
                if !ok {
                    return Err(abort(&path, session.phase, new_phase));
                }
                session.phase = new_phase;
            }
            if let Some(stage) = patch.exploration_stage {
                session.exploration_stage = stage;
            }
            if let Some(iteration) = patch.iteration {
                session.iteration = iteration;
            }
            if patch.plan_approved {
                session.plan.approved_at = Some(now);
            }
            session.updated_at = now;
            Ok(session)
        });

        result.map_err(|e| translate_update_error(e, session_id))
    }

    pub fn cancel(&self, session_id: &str) -> SessionResult<Session> {
        let path = self.paths.session_file(session_id);
        let now = self.clock.now();
        self.store
            .update::<Session, _>(&path, |existing| {
                let mut session = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                session.phase = Phase::Cancelled;
                session.cancelled_at = Some(now);
                session.updated_at = now;
                Ok(session)
            })
            .map_err(|e| map_not_found(e, session_id))
    }

    pub fn resume(&self, session_id: &str) -> SessionResult<Session> {
        let path = self.paths.session_file(session_id);
        if !path.exists() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        let now = self.clock.now();
        self.store
            .update::<Session, _>(&path, |existing| {
                let mut session = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                session.cancelled_at = None;
                session.updated_at = now;
                Ok(session)
            })
            .map_err(|e| map_not_found(e, session_id))
    }

    pub fn append_evidence(&self, session_id: &str, record: EvidenceRecord) -> SessionResult<Session> {
        if record.kind.is_empty() {
            return Err(SessionError::InvalidValue {
                field: "type".to_string(),
                value: String::new(),
            });
        }
        let path = self.paths.session_file(session_id);
        let now = self.clock.now();
        self.store
            .update::<Session, _>(&path, |existing| {
                let mut session = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                session.evidence_log.push(record);
                session.updated_at = now;
                Ok(session)
            })
            .map_err(|e| map_not_found(e, session_id))
    }
}

fn map_not_found(e: StoreError, session_id: &str) -> SessionError {
    match e {
        StoreError::NotFound(_) => SessionError::NotFound(session_id.to_string()),
        other => SessionError::Store(other),
    }
}

/// Marker prefix distinguishing an illegal-transition abort (encoded as
/// `"illegal_transition|<from>|<to>"`) from a genuine corrupt-document error
/// inside `AtomicStore::update`'s single `StoreError` channel.
const TRANSITION_MARKER: &str = "illegal_transition|";

fn abort(path: &std::path::Path, from: Phase, to: Phase) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("{TRANSITION_MARKER}{from}|{to}"),
    }
}

fn translate_update_error(e: StoreError, session_id: &str) -> SessionError {
    match &e {
        StoreError::Corrupt { reason, .. } if reason.starts_with(TRANSITION_MARKER) => {
            let rest = &reason[TRANSITION_MARKER.len()..];
            let mut parts = rest.splitn(2, '|');
            let from = parts.next().unwrap_or_default().to_string();
            let to = parts.next().unwrap_or_default().to_string();
            SessionError::IllegalTransition { from, to }
        }
        StoreError::NotFound(_) => SessionError::NotFound(session_id.to_string()),
        _ => SessionError::Store(e),
    }
}

/// The phase state machine.
fn validate_phase_transition(from: Phase, to: Phase, iteration: u32, max_iterations: u32) -> bool {
    use Phase::*;
    match (from, to) {
        (_, Cancelled) => true,
        (Planning, Execution) => true,
        (Execution, Verification) => true,
        (Verification, Complete) => true,
        (Verification, Execution) => iteration < max_iterations,
        (Verification, Failed) => iteration >= max_iterations,
        (same, to) if same == to => true,
        _ => false,
    }
}

/// Navigate a dotted field path through a `serde_json::Value`.
fn navigate(value: &serde_json::Value, field_path: &str) -> Option<serde_json::Value> {
    let mut cur = value.clone();
    for segment in field_path.split('.') {
        cur = cur.get(segment)?.clone();
    }
    Some(cur)
}
