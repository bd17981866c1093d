//! C10 — Swarm Controller.
//!
//! Supervises the pane host, spawns/stops workers, maintains per-worker
//! state files, detects wave completion, and drives the merge protocol.
//! The only writer of the swarm plan and worker files; workers write
//! only their own `tasks_completed`/`last_heartbeat`.

use orc_core::clock::Clock;
use orc_core::mailbox::{Mailbox, MailboxError};
use orc_core::model::mailbox::MessageType;
use orc_core::model::swarm::{SwarmPlan, SwarmStatus};
use orc_core::model::task::TaskStatus;
use orc_core::model::wave::WaveStatus;
use orc_core::model::worker::Worker;
use orc_core::paths::Paths;
use orc_core::store::{AtomicStore, StoreError};
use orc_core::task_store::{TaskFilter, TaskStore};
use orc_core::wave::{WaveError, WaveStore};
use orc_core::workspace::{WorkspaceOrchestrator, WorkspaceProvider};
use std::path::Path;

use crate::pane_host::{PaneHost, PaneHostError};

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("swarm plan not found for {0}/{1}")]
    NotFound(String, String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("tmux session not found: {0}")]
    TmuxSessionNotFound(String),

    #[error("swarm is paused awaiting conflict resolution")]
    Paused,

    #[error("pane host error: {0}")]
    PaneHost(#[from] PaneHostError),

    #[error(transparent)]
    Wave(#[from] WaveError),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SwarmResult<T> = Result<T, SwarmError>;

/// One worker role request (`role`, `count`) for `spawn`.
#[derive(Debug, Clone)]
pub struct RoleRequest {
    pub role: String,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub enum StopTarget {
    Worker(String),
    All,
}

/// A worker decorated with a pane-host-derived liveness bit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerStatusView {
    #[serde(flatten)]
    pub worker: Worker,
    pub alive: bool,
}

pub struct SwarmController<'a, C: Clock, P: PaneHost, W: WorkspaceProvider> {
    store: AtomicStore,
    paths: &'a Paths,
    clock: &'a C,
    pane_host: &'a P,
    workspace: &'a WorkspaceOrchestrator<W>,
}

impl<'a, C: Clock, P: PaneHost, W: WorkspaceProvider> SwarmController<'a, C, P, W> {
    pub fn new(paths: &'a Paths, clock: &'a C, pane_host: &'a P, workspace: &'a WorkspaceOrchestrator<W>) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            clock,
            pane_host,
            workspace,
        }
    }

    pub async fn spawn(
        &self,
        project: &str,
        team: &str,
        session_name: &str,
        source_dir: &Path,
        roles: &[RoleRequest],
        use_worktree: bool,
    ) -> SwarmResult<SwarmPlan> {
        if !self.pane_host.session_exists(session_name)? {
            self.pane_host.create_session(session_name, source_dir)?;
        }

        let mut worker_ids = Vec::new();
        for req in roles {
            for n in 1..=req.count {
                let worker_id = format!("{}-{}", req.role, n);
                let pane = self.pane_host.add_pane(session_name, source_dir)?;

                let mut worker = Worker::new(&worker_id, &req.role, pane, self.clock.now());
                worker.session_id = Some(session_name.to_string());
                if use_worktree {
                    let target = self.paths.worktree_dir(project, team, &worker_id);
                    match self.workspace.ensure_isolated(source_dir, &worker_id, &target).await {
                        Ok(path) => {
                            worker.worktree = Some(path);
                            worker.branch = Some(format!("worker-{worker_id}"));
                        }
                        Err(e) => {
                            worker.last_heartbeat_reason = Some(e.to_string());
                        }
                    }
                }

                let worker_path = self.paths.worker_file(project, team, &worker_id);
                self.store.write_json(&worker_path, &worker)?;
                worker_ids.push(worker_id);
            }
        }

        let plan_path = self.paths.swarm_file(project, team);
        let plan = SwarmPlan {
            session: session_name.to_string(),
            status: SwarmStatus::Running,
            created_at: self.clock.now(),
            workers: worker_ids,
            current_wave: 1,
            paused: false,
            use_worktree,
            source_dir: source_dir.display().to_string(),
            conflict_at: None,
            conflict_worker: None,
            conflict_files: Vec::new(),
            merged_before_conflict: Vec::new(),
            not_merged: Vec::new(),
        };
        self.store.write_json(&plan_path, &plan)?;
        Ok(plan)
    }

    /// Enumerate worker files — the authoritative source — decorated with
    /// pane-host liveness, sorted by numeric suffix of the worker id
    /// (`w1, w2, w10`, not lexicographic).
    pub fn status(&self, project: &str, team: &str) -> SwarmResult<Vec<WorkerStatusView>> {
        let plan = self.get_plan(project, team)?;
        let dir = self.paths.workers_dir(project, team);
        let mut workers = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(worker) = self.store.read_json::<Worker>(&path) {
                    workers.push(worker);
                }
            }
        }
        workers.sort_by_key(|w| w.numeric_suffix());

        let alive = self.pane_host.session_exists(&plan.session)?;
        Ok(workers
            .into_iter()
            .map(|worker| WorkerStatusView { worker, alive })
            .collect())
    }

    pub fn stop(&self, project: &str, team: &str, target: StopTarget) -> SwarmResult<()> {
        let plan_path = self.paths.swarm_file(project, team);
        let plan: SwarmPlan = self.store.read_json(&plan_path)?;

        if !self.pane_host.session_exists(&plan.session)? {
            return Err(SwarmError::TmuxSessionNotFound(plan.session));
        }

        match target {
            StopTarget::All => {
                self.pane_host.kill_session(&plan.session)?;
                self.store.update::<SwarmPlan, _>(&plan_path, |existing| {
                    let mut plan = existing.ok_or_else(|| StoreError::NotFound(plan_path.clone()))?;
                    plan.status = SwarmStatus::Stopped;
                    Ok(plan)
                })?;
            }
            StopTarget::Worker(worker_id) => {
                let worker_path = self.paths.worker_file(project, team, &worker_id);
                let worker: Worker = self
                    .store
                    .read_json(&worker_path)
                    .map_err(|_| SwarmError::WorkerNotFound(worker_id.clone()))?;
                self.pane_host.send_keys(&plan.session, worker.pane, "exit")?;
            }
        }
        Ok(())
    }

    fn get_plan(&self, project: &str, team: &str) -> SwarmResult<SwarmPlan> {
        let path = self.paths.swarm_file(project, team);
        self.store.read_json(&path).map_err(|e| match e {
            StoreError::NotFound(_) => SwarmError::NotFound(project.to_string(), team.to_string()),
            other => SwarmError::Store(other),
        })
    }

    /// Check whether every task in the current wave is resolved; if so,
    /// merge each active worker's workspace, advance the wave counter,
    /// sync surviving workers, and notify them of the next wave's tasks.
    /// On conflict, pauses the swarm instead of advancing the wave.
    pub async fn check_wave_completion(
        &self,
        project: &str,
        team: &str,
        task_store: &TaskStore<'_, C>,
        wave_store: &WaveStore<'_, C>,
        mailbox: &Mailbox<'_, C>,
    ) -> SwarmResult<bool> {
        let mut plan = self.get_plan(project, team)?;
        if plan.paused {
            return Err(SwarmError::Paused);
        }

        let wave_plan = wave_store.get(project, team)?;
        let Some(current) = wave_plan.waves.iter().find(|w| w.id == plan.current_wave) else {
            return Ok(false);
        };

        let tasks = task_store
            .list(project, team, &TaskFilter::default())
            .map_err(|e| SwarmError::Store(store_error_from_task(e)))?;
        let all_resolved = current.tasks.iter().all(|id| {
            tasks
                .iter()
                .find(|t| &t.id == id)
                .map(|t| t.status == TaskStatus::Resolved)
                .unwrap_or(true)
        });
        if !all_resolved {
            return Ok(false);
        }

        wave_store.set_status(project, team, current.id, WaveStatus::Completed)?;

        let source_dir = Path::new(&plan.source_dir);
        let candidates: Vec<String> = plan
            .workers
            .iter()
            .filter(|worker_id| {
                let worker_path = self.paths.worker_file(project, team, worker_id);
                self.store
                    .read_json::<Worker>(&worker_path)
                    .map(|w| w.worktree.is_some())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let mut merged_before_conflict = Vec::new();
        let mut conflict: Option<orc_core::workspace::ConflictRecord> = None;
        for (idx, worker_id) in candidates.iter().enumerate() {
            let worker_path = self.paths.worker_file(project, team, worker_id);
            let Ok(worker) = self.store.read_json::<Worker>(&worker_path) else {
                continue;
            };
            let Some(worktree) = worker.worktree.clone() else {
                continue;
            };

            match self.workspace.merge(source_dir, &worktree, worker_id).await {
                Ok(Some(record)) => {
                    conflict = Some(record);
                    let not_merged = candidates[idx + 1..].to_vec();
                    let plan_path = self.paths.swarm_file(project, team);
                    self.store.update::<SwarmPlan, _>(&plan_path, |existing| {
                        let mut p = existing.ok_or_else(|| StoreError::NotFound(plan_path.clone()))?;
                        let c = conflict.as_ref().expect("set above");
                        p.paused = true;
                        p.conflict_at = Some(self.clock.now());
                        p.conflict_worker = Some(c.worker.clone());
                        p.conflict_files = c.files.clone();
                        p.merged_before_conflict = merged_before_conflict.clone();
                        p.not_merged = not_merged.clone();
                        Ok(p)
                    })?;
                    return Err(SwarmError::Paused);
                }
                Ok(None) => {
                    merged_before_conflict.push(worker_id.clone());
                }
                Err(e) => {
                    let worker_path = worker_path.clone();
                    let _ = self.store.update::<Worker, _>(&worker_path, |existing| {
                        let mut w = existing.ok_or_else(|| StoreError::NotFound(worker_path.clone()))?;
                        w.last_heartbeat_reason = Some(e.to_string());
                        Ok(w)
                    });
                }
            }
        }

        let plan_path = self.paths.swarm_file(project, team);

        wave_store.set_status(project, team, current.id, WaveStatus::Verified)?;
        plan.current_wave += 1;
        plan.conflict_at = None;
        plan.conflict_worker = None;
        plan.conflict_files.clear();
        plan.merged_before_conflict.clear();
        plan.not_merged.clear();
        self.store.write_json(&plan_path, &plan)?;

        if let Some(next) = wave_plan.waves.iter().find(|w| w.id == plan.current_wave) {
            for worker_id in &plan.workers {
                let worker_path = self.paths.worker_file(project, team, worker_id);
                let Ok(worker) = self.store.read_json::<Worker>(&worker_path) else {
                    continue;
                };
                if let Some(worktree) = &worker.worktree {
                    let _ = self.workspace.sync(source_dir, worktree).await;
                }
                for task_id in &next.tasks {
                    mailbox.send(
                        project,
                        team,
                        "swarm-controller",
                        worker_id,
                        MessageType::TaskAssignment,
                        serde_json::json!({ "task_id": task_id }),
                    )?;
                }
            }
        }

        Ok(true)
    }
}

fn store_error_from_task(e: orc_core::task_store::TaskError) -> StoreError {
    match e {
        orc_core::task_store::TaskError::Store(s) => s,
        other => StoreError::Corrupt {
            path: std::path::PathBuf::new(),
            reason: other.to_string(),
        },
    }
}
