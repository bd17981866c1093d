//! C7 — Project View.
//!
//! Read-only aggregation over a project/team's task set: stats, blocked
//! tasks, and a dotted-field extractor for scripting. Tolerant of
//! individual corrupt task files — a single bad document is skipped and
//! tallied rather than failing the whole view.

use crate::model::project::{Project, ProjectStats};
use crate::model::task::{Task, TaskStatus};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ProjectViewError {
    #[error("project not found: {0}/{1}")]
    NotFound(String, String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ProjectViewResult<T> = Result<T, ProjectViewError>;

/// One task that is blocked, and by what.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedTask {
    pub id: String,
    pub subject: String,
    pub blocked_by: Vec<String>,
}

/// Full status view of a project/team.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub project: String,
    pub team: String,
    pub phase: String,
    pub stats: ProjectStats,
    pub blocked_tasks: Vec<BlockedTask>,
    /// Task files present on disk that failed to parse and were skipped.
    pub skipped_corrupt: usize,
    /// Present only when `verbose` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

pub struct ProjectView<'a> {
    store: AtomicStore,
    paths: &'a Paths,
}

impl<'a> ProjectView<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
        }
    }

    pub fn status(&self, project: &str, team: &str, verbose: bool) -> ProjectViewResult<ProjectStatus> {
        let project_doc = self.load_project(project, team)?;
        let (tasks, skipped) = self.load_tasks_tolerant(project, team);

        let open_ids: std::collections::BTreeSet<&str> =
            tasks.iter().map(|t| t.id.as_str()).collect();

        let mut stats = ProjectStats {
            total: tasks.len(),
            ..Default::default()
        };
        let mut blocked_tasks = Vec::new();
        for t in &tasks {
            match t.status {
                TaskStatus::Open | TaskStatus::Pending => stats.open += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Resolved => stats.resolved += 1,
                TaskStatus::Failed => {}
            }
            let outstanding: Vec<String> = t
                .blocked_by
                .iter()
                .filter(|dep| {
                    open_ids.contains(dep.as_str())
                        && tasks
                            .iter()
                            .find(|o| &o.id == *dep)
                            .map(|o| o.status != TaskStatus::Resolved)
                            .unwrap_or(false)
                })
                .cloned()
                .collect();
            if !outstanding.is_empty() {
                blocked_tasks.push(BlockedTask {
                    id: t.id.clone(),
                    subject: t.subject.clone(),
                    blocked_by: outstanding,
                });
            }
        }

        Ok(ProjectStatus {
            project: project.to_string(),
            team: team.to_string(),
            phase: project_doc.phase,
            stats,
            blocked_tasks,
            skipped_corrupt: skipped,
            tasks: if verbose { Some(tasks) } else { None },
        })
    }

    /// Resolve a dotted field path against the project document.
    pub fn get_field(&self, project: &str, team: &str, field_path: &str) -> ProjectViewResult<serde_json::Value> {
        let project_doc = self.load_project(project, team)?;
        let value = serde_json::to_value(&project_doc).expect("Project always serializes");
        navigate(&value, field_path).ok_or_else(|| ProjectViewError::FieldNotFound(field_path.to_string()))
    }

    fn load_project(&self, project: &str, team: &str) -> ProjectViewResult<Project> {
        let path = self.paths.project_file(project, team);
        self.store.read_json(&path).map_err(|e| match e {
            StoreError::NotFound(_) => ProjectViewError::NotFound(project.to_string(), team.to_string()),
            other => ProjectViewError::Store(other),
        })
    }

    fn load_tasks_tolerant(&self, project: &str, team: &str) -> (Vec<Task>, usize) {
        let dir = self.paths.tasks_dir(project, team);
        let mut tasks = Vec::new();
        let mut skipped = 0;
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return (tasks, skipped);
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.store.read_json::<Task>(&path) {
                Ok(task) => tasks.push(task),
                Err(_) => {
                    tracing::warn!(path = %path.display(), "skipping corrupt task file in status view");
                    skipped += 1;
                }
            }
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        (tasks, skipped)
    }
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
    use crate::model::task::NewTask;
    use std::collections::BTreeSet;

    fn setup() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let store = AtomicStore::new();
        store
            .write_json(&paths.project_file("proj", "team"), &Project::new("proj", "team", "goal", chrono::Utc::now()))
            .unwrap();
        (dir, paths)
    }

    #[test]
    fn status_tallies_by_status() {
        let (_dir, paths) = setup();
        let store = AtomicStore::new();
        let now = chrono::Utc::now();
        let mut t1 = Task::new("a", NewTask::default(), now);
        t1.status = TaskStatus::Resolved;
        store.write_json(&paths.task_file("proj", "team", "a"), &t1).unwrap();
        let t2 = Task::new("b", NewTask::default(), now);
        store.write_json(&paths.task_file("proj", "team", "b"), &t2).unwrap();

        let view = ProjectView::new(&paths);
        let status = view.status("proj", "team", false).unwrap();
        assert_eq!(status.stats.total, 2);
        assert_eq!(status.stats.resolved, 1);
        assert_eq!(status.stats.open, 1);
        assert!(status.tasks.is_none());
    }

    #[test]
    fn corrupt_task_file_is_skipped_not_fatal() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tasks_dir("proj", "team")).unwrap();
        std::fs::write(paths.task_file("proj", "team", "bad"), b"{not json").unwrap();

        let view = ProjectView::new(&paths);
        let status = view.status("proj", "team", false).unwrap();
        assert_eq!(status.stats.total, 0);
        assert_eq!(status.skipped_corrupt, 1);
    }

    #[test]
    fn blocked_tasks_reports_unsatisfied_dependencies() {
        let (_dir, paths) = setup();
        let store = AtomicStore::new();
        let now = chrono::Utc::now();
        let a = Task::new("a", NewTask::default(), now);
        store.write_json(&paths.task_file("proj", "team", "a"), &a).unwrap();

        let mut deps = BTreeSet::new();
        deps.insert("a".to_string());
        let b = Task::new(
            "b",
            NewTask {
                blocked_by: deps,
                ..Default::default()
            },
            now,
        );
        store.write_json(&paths.task_file("proj", "team", "b"), &b).unwrap();

        let view = ProjectView::new(&paths);
        let status = view.status("proj", "team", true).unwrap();
        assert_eq!(status.blocked_tasks.len(), 1);
        assert_eq!(status.blocked_tasks[0].id, "b");
        assert!(status.tasks.is_some());
    }
}
