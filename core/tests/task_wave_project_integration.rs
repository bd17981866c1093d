//! Cross-component integration: creating tasks, planning waves from them,
//! and reading the result back through the project status view.

use orc_core::clock::SystemClock;
use orc_core::model::project::Project;
use orc_core::model::task::{Complexity, NewTask, TaskStatus};
use orc_core::model::wave::WaveStatus;
use orc_core::paths::Paths;
use orc_core::project_view::ProjectView;
use orc_core::store::AtomicStore;
use orc_core::task_store::{TaskFilter, TaskPatch, TaskStore};
use orc_core::wave::WaveStore;
use std::collections::BTreeSet;

fn setup() -> (tempfile::TempDir, Paths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let store = AtomicStore::new();
    store
        .write_json(
            &paths.project_file("acme", "core"),
            &Project::new("acme", "core", "ship the thing", chrono::Utc::now()),
        )
        .unwrap();
    (dir, paths)
}

#[test]
fn wave_plan_respects_dependency_order_and_claims_flow_into_project_status() {
    let (_dir, paths) = setup();
    let clock = SystemClock;
    let tasks = TaskStore::new(&paths, &clock);
    let waves = WaveStore::new(&paths, &clock);
    let view = ProjectView::new(&paths);

    tasks
        .create(
            "acme",
            "core",
            "t1",
            NewTask {
                subject: "lay foundation".into(),
                complexity: Some(Complexity::Simple),
                ..Default::default()
            },
        )
        .unwrap();

    let mut blocked_by = BTreeSet::new();
    blocked_by.insert("t1".to_string());
    tasks
        .create(
            "acme",
            "core",
            "t2",
            NewTask {
                subject: "build on top".into(),
                blocked_by,
                ..Default::default()
            },
        )
        .unwrap();

    let all_tasks = tasks.list("acme", "core", &TaskFilter::default()).unwrap();
    let plan = waves.plan("acme", "core", &all_tasks).unwrap();
    assert_eq!(plan.waves.len(), 2);
    assert_eq!(plan.waves[0].tasks, vec!["t1".to_string()]);
    assert_eq!(plan.waves[1].tasks, vec!["t2".to_string()]);
    assert_eq!(plan.waves[0].status, WaveStatus::Planning);

    // t2 is not claimable yet per the project status view: it's blocked on t1.
    let status = view.status("acme", "core", false).unwrap();
    assert_eq!(status.stats.total, 2);
    assert_eq!(status.blocked_tasks.len(), 1);
    assert_eq!(status.blocked_tasks[0].id, "t2");

    // Claiming and resolving t1 clears it from the blocked-task list.
    tasks.claim("acme", "core", "t1", "worker-a", None, false).unwrap();
    tasks
        .update(
            "acme",
            "core",
            "t1",
            TaskPatch {
                status: Some(TaskStatus::Resolved),
                ..Default::default()
            },
        )
        .unwrap();

    let status = view.status("acme", "core", false).unwrap();
    assert!(status.blocked_tasks.is_empty());
    assert_eq!(status.stats.resolved, 1);

    waves.set_status("acme", "core", 1, WaveStatus::InProgress).unwrap();
    waves.set_status("acme", "core", 1, WaveStatus::Completed).unwrap();
    let plan = waves.get("acme", "core").unwrap();
    assert_eq!(plan.waves[0].status, WaveStatus::Completed);
}

#[test]
fn deleting_a_task_with_unforced_dependents_is_rejected_then_force_orphans_them() {
    let (_dir, paths) = setup();
    let clock = SystemClock;
    let tasks = TaskStore::new(&paths, &clock);

    tasks.create("acme", "core", "base", NewTask::default()).unwrap();
    let mut blocked_by = BTreeSet::new();
    blocked_by.insert("base".to_string());
    tasks
        .create(
            "acme",
            "core",
            "dependent",
            NewTask {
                blocked_by,
                ..Default::default()
            },
        )
        .unwrap();

    assert!(tasks.delete("acme", "core", "base", false).is_err());

    let report = tasks.delete("acme", "core", "base", true).unwrap();
    assert_eq!(report.orphaned_dependents, vec!["dependent".to_string()]);
    assert!(tasks.get("acme", "core", "base").is_err());
}
