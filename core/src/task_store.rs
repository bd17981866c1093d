//! C4 — Task Store.
//!
//! Domain layer over [`crate::store::AtomicStore`] for task documents:
//! optimistic-versioned claim/release, status transitions, evidence append.

use crate::clock::Clock;
use crate::model::project::Project;
use crate::model::task::{NewTask, Task, TaskStatus};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("task {0} is not claimable")]
    NotClaimable(String),

    #[error("task {0} is already claimed by another owner")]
    AlreadyClaimed(String),

    #[error("claimer role does not match task role for {0}")]
    RoleMismatch(String),

    #[error("task {0} is not deletable (status != open)")]
    NotDeletable(String),

    #[error("task {0} has dependents: {1:?}")]
    HasDependents(String, Vec<String>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TaskResult<T> = Result<T, TaskError>;

/// Filter accepted by [`TaskStore::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub role: Option<String>,
    /// Alias for `status = open AND claimed_by = null`.
    pub available: bool,
}

/// Patch accepted by [`TaskStore::update`].
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub wave: Option<Option<u32>>,
}

/// Outcome of [`TaskStore::delete`] when `force` orphans dependents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    pub orphaned_dependents: Vec<String>,
}

pub struct TaskStore<'a, C: Clock> {
    store: AtomicStore,
    paths: &'a Paths,
    clock: &'a C,
}

impl<'a, C: Clock> TaskStore<'a, C> {
    pub fn new(paths: &'a Paths, clock: &'a C) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            clock,
        }
    }

    pub fn create(&self, project: &str, team: &str, id: &str, fields: NewTask) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        if path.exists() {
            return Err(TaskError::AlreadyExists(id.to_string()));
        }
        self.ensure_project(project, team)?;
        let task = Task::new(id, fields, self.clock.now());
        self.store.write_json(&path, &task)?;
        Ok(task)
    }

    /// A project/team is a stable container implicitly created by its
    /// first task, rather than requiring a separate creation step.
    fn ensure_project(&self, project: &str, team: &str) -> TaskResult<()> {
        let path = self.paths.project_file(project, team);
        if path.exists() {
            return Ok(());
        }
        let doc = Project::new(project, team, "", self.clock.now());
        self.store.write_json(&path, &doc)?;
        Ok(())
    }

    pub fn get(&self, project: &str, team: &str, id: &str) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        self.store.read_json(&path).map_err(|e| map_not_found(e, id))
    }

    pub fn get_field(&self, project: &str, team: &str, id: &str, field_path: &str) -> TaskResult<serde_json::Value> {
        let task = self.get(project, team, id)?;
        let value = serde_json::to_value(&task).expect("Task always serializes");
        navigate(&value, field_path)
            .ok_or_else(|| TaskError::InvalidValue {
                field: field_path.to_string(),
                value: "<missing>".to_string(),
            })
    }

    pub fn list(&self, project: &str, team: &str, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        let dir = self.paths.tasks_dir(project, team);
        let mut tasks = Vec::new();
        if !dir.exists() {
            return Ok(tasks);
        }
        for entry in std::fs::read_dir(&dir).map_err(|e| StoreError::Io {
            path: dir.clone(),
            source: e,
        })? {
            let entry = entry.map_err(|e| StoreError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()).map(|n| n.ends_with(".lock")) == Some(true) {
                continue;
            }
            match self.store.read_json::<Task>(&path) {
                Ok(task) => tasks.push(task),
                Err(StoreError::Corrupt { .. }) => {
                    tracing::warn!(path = %path.display(), "skipping corrupt task file");
                }
                Err(e) => return Err(TaskError::Store(e)),
            }
        }

        tasks.retain(|t| {
            if filter.available && !t.is_available() {
                return false;
            }
            if let Some(status) = filter.status {
                if t.status != status {
                    return false;
                }
            }
            if let Some(ref role) = filter.role {
                if t.role.as_deref() != Some(role.as_str()) {
                    return false;
                }
            }
            true
        });
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    /// Claim a task under lock: requires `status in {open, pending}` and
    /// `claimed_by in {None, Some(owner)}` (reclaim allowed). Sets
    /// `status=in_progress`, bumps `version`.
    pub fn claim(
        &self,
        project: &str,
        team: &str,
        id: &str,
        owner: &str,
        role: Option<&str>,
        strict_role: bool,
    ) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        let now = self.clock.now();
        self.store
            .update::<Task, _>(&path, |existing| {
                let mut task = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;

                if !matches!(task.status, TaskStatus::Open | TaskStatus::Pending) {
                    return Err(domain_abort(&path, DomainAbort::NotClaimable(id.to_string())));
                }
                match &task.claimed_by {
                    None => {}
                    Some(existing_owner) if existing_owner == owner => {}
                    Some(_) => return Err(domain_abort(&path, DomainAbort::AlreadyClaimed(id.to_string()))),
                }
                if strict_role {
                    if let (Some(want), Some(have)) = (role, task.role.as_deref()) {
                        if want != have {
                            return Err(domain_abort(&path, DomainAbort::RoleMismatch(id.to_string())));
                        }
                    }
                }

                task.claimed_by = Some(owner.to_string());
                task.claimed_at = Some(now);
                task.status = TaskStatus::InProgress;
                task.version += 1;
                task.updated_at = now;
                Ok(task)
            })
            .map_err(|e| translate(e, id))
    }

    pub fn update(&self, project: &str, team: &str, id: &str, patch: TaskPatch) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        let now = self.clock.now();
        self.store
            .update::<Task, _>(&path, |existing| {
                let mut task = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;

                if let Some(new_status) = patch.status {
                    if !valid_status_transition(task.status, new_status) {
                        return Err(domain_abort(
                            &path,
                            DomainAbort::InvalidValue("status".into(), new_status.to_string()),
                        ));
                    }
                    task.status = new_status;
                }
                if let Some(title) = patch.title {
                    task.subject = title;
                }
                if let Some(description) = patch.description {
                    task.description = description;
                }
                if let Some(wave) = patch.wave {
                    task.wave = wave;
                }
                task.version += 1;
                task.updated_at = now;
                Ok(task)
            })
            .map_err(|e| translate(e, id))
    }

    /// Clears `claimed_by`/`claimed_at`; keeps `status=in_progress` so the
    /// task remains claimable again (the documented existing
    /// convention — see DESIGN.md for why this was kept rather than
    /// changed to `open`).
    pub fn release(&self, project: &str, team: &str, id: &str) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        let now = self.clock.now();
        self.store
            .update::<Task, _>(&path, |existing| {
                let mut task = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                task.claimed_by = None;
                task.claimed_at = None;
                task.version += 1;
                task.updated_at = now;
                Ok(task)
            })
            .map_err(|e| map_not_found(e, id))
    }

    pub fn append_evidence(&self, project: &str, team: &str, id: &str, text: &str) -> TaskResult<Task> {
        let path = self.paths.task_file(project, team, id);
        let now = self.clock.now();
        self.store
            .update::<Task, _>(&path, |existing| {
                let mut task = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                task.evidence.push(text.to_string());
                task.version += 1;
                task.updated_at = now;
                Ok(task)
            })
            .map_err(|e| map_not_found(e, id))
    }

    /// Delete an `open` task. Refuses if other tasks depend on it unless
    /// `force`, in which case the dependents are reported (their
    /// `blocked_by` entries are left dangling — the wave calculator treats
    /// references to nonexistent tasks as already-satisfied when the
    /// wave plan is recomputed.
    pub fn delete(&self, project: &str, team: &str, id: &str, force: bool) -> TaskResult<DeleteReport> {
        let task = self.get(project, team, id)?;
        if task.status != TaskStatus::Open {
            return Err(TaskError::NotDeletable(id.to_string()));
        }

        let dependents: Vec<String> = self
            .list(project, team, &TaskFilter::default())?
            .into_iter()
            .filter(|t| t.blocked_by.contains(id))
            .map(|t| t.id)
            .collect();

        if !dependents.is_empty() && !force {
            return Err(TaskError::HasDependents(id.to_string(), dependents));
        }

        let path = self.paths.task_file(project, team, id);
        std::fs::remove_file(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        Ok(DeleteReport {
            orphaned_dependents: dependents,
        })
    }
}

fn valid_status_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Open, InProgress)
            | (InProgress, Resolved)
            | (InProgress, Failed)
            | (InProgress, Open)
            | (Failed, Pending)
            | (Pending, InProgress)
            | (Resolved, Resolved)
    ) || from == to
}

fn map_not_found(e: StoreError, id: &str) -> TaskError {
    match e {
        StoreError::NotFound(_) => TaskError::NotFound(id.to_string()),
        other => TaskError::Store(other),
    }
}

enum DomainAbort {
    NotClaimable(String),
    AlreadyClaimed(String),
    RoleMismatch(String),
    InvalidValue(String, String),
}

const DOMAIN_MARKER: &str = "domain_abort|";

fn domain_abort(path: &Path, abort: DomainAbort) -> StoreError {
    let reason = match abort {
        DomainAbort::NotClaimable(id) => format!("{DOMAIN_MARKER}not_claimable|{id}"),
        DomainAbort::AlreadyClaimed(id) => format!("{DOMAIN_MARKER}already_claimed|{id}"),
        DomainAbort::RoleMismatch(id) => format!("{DOMAIN_MARKER}role_mismatch|{id}"),
        DomainAbort::InvalidValue(field, value) => format!("{DOMAIN_MARKER}invalid_value|{field}|{value}"),
    };
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}

fn translate(e: StoreError, id: &str) -> TaskError {
    if let StoreError::Corrupt { reason, .. } = &e {
        if let Some(rest) = reason.strip_prefix(DOMAIN_MARKER) {
            let mut parts = rest.splitn(3, '|');
            return match parts.next() {
                Some("not_claimable") => TaskError::NotClaimable(id.to_string()),
                Some("already_claimed") => TaskError::AlreadyClaimed(id.to_string()),
                Some("role_mismatch") => TaskError::RoleMismatch(id.to_string()),
                Some("invalid_value") => TaskError::InvalidValue {
                    field: parts.next().unwrap_or_default().to_string(),
                    value: parts.next().unwrap_or_default().to_string(),
                },
                _ => TaskError::Store(e),
            };
        }
    }
    map_not_found(e, id)
}

fn navigate(value: &serde_json::Value, field_path: &str) -> Option<serde_json::Value> {
    let mut cur = value.clone();
    for segment in field_path.split('.') {
        cur = cur.get(segment)?.clone();
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn setup() -> (tempfile::TempDir, Paths, SystemClock) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        (dir, paths, SystemClock)
    }

    #[test]
    fn create_then_get_round_trips() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store
            .create(
                "proj",
                "team",
                "t1",
                NewTask {
                    subject: "Do the thing".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let task = store.get("proj", "team", "t1").unwrap();
        assert_eq!(task.subject, "Do the thing");
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.version, 1);
    }

    #[test]
    fn create_implicitly_creates_the_project_document() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        assert!(!paths.project_file("proj", "team").exists());

        store.create("proj", "team", "t1", NewTask::default()).unwrap();
        assert!(paths.project_file("proj", "team").exists());

        // A second task in the same project/team does not clobber it.
        let project: Project = crate::store::AtomicStore::new()
            .read_json(&paths.project_file("proj", "team"))
            .unwrap();
        store.create("proj", "team", "t2", NewTask::default()).unwrap();
        let project_again: Project = crate::store::AtomicStore::new()
            .read_json(&paths.project_file("proj", "team"))
            .unwrap();
        assert_eq!(project.created_at, project_again.created_at);
    }

    #[test]
    fn concurrent_claim_only_one_winner() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store.create("proj", "team", "t1", NewTask::default()).unwrap();

        let claimed = store.claim("proj", "team", "t1", "w1", None, false).unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.claimed_by.as_deref(), Some("w1"));

        let err = store.claim("proj", "team", "t1", "w2", None, false).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyClaimed(_)));
    }

    #[test]
    fn reclaim_by_same_owner_succeeds() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store.create("proj", "team", "t1", NewTask::default()).unwrap();
        store.claim("proj", "team", "t1", "w1", None, false).unwrap();
        let reclaimed = store.claim("proj", "team", "t1", "w1", None, false).unwrap();
        assert_eq!(reclaimed.version, 3);
    }

    #[test]
    fn release_keeps_in_progress() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store.create("proj", "team", "t1", NewTask::default()).unwrap();
        store.claim("proj", "team", "t1", "w1", None, false).unwrap();
        let released = store.release("proj", "team", "t1").unwrap();
        assert_eq!(released.status, TaskStatus::InProgress);
        assert!(released.claimed_by.is_none());
    }

    #[test]
    fn delete_refuses_non_open() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store.create("proj", "team", "t1", NewTask::default()).unwrap();
        store.claim("proj", "team", "t1", "w1", None, false).unwrap();
        let err = store.delete("proj", "team", "t1", false).unwrap_err();
        assert!(matches!(err, TaskError::NotDeletable(_)));
    }

    #[test]
    fn delete_refuses_with_dependents_unless_forced() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store.create("proj", "team", "t1", NewTask::default()).unwrap();
        let mut blocked = std::collections::BTreeSet::new();
        blocked.insert("t1".to_string());
        store
            .create(
                "proj",
                "team",
                "t2",
                NewTask {
                    blocked_by: blocked,
                    ..Default::default()
                },
            )
            .unwrap();

        let err = store.delete("proj", "team", "t1", false).unwrap_err();
        assert!(matches!(err, TaskError::HasDependents(_, _)));

        let report = store.delete("proj", "team", "t1", true).unwrap();
        assert_eq!(report.orphaned_dependents, vec!["t2".to_string()]);
    }

    #[test]
    fn strict_role_mismatch_rejected() {
        let (_dir, paths, clock) = setup();
        let store = TaskStore::new(&paths, &clock);
        store
            .create(
                "proj",
                "team",
                "t1",
                NewTask {
                    role: Some("reviewer".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let err = store
            .claim("proj", "team", "t1", "w1", Some("coder"), true)
            .unwrap_err();
        assert!(matches!(err, TaskError::RoleMismatch(_)));
    }
}
