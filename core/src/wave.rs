//! C6 — Wave Calculator.
//!
//! Partitions a task set into waves via a topological sort over
//! `blocked_by` edges (Kahn's algorithm), with a deterministic
//! ascending-id tie-break so the same task set always produces the same
//! wave assignment.

use crate::clock::Clock;
use crate::model::task::Task;
use crate::model::wave::{Wave, WavePlan, WaveStatus};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error("wave plan not found for {0}/{1}")]
    NotFound(String, String),

    #[error("dependency cycle detected among tasks: {0:?}")]
    CycleDetected(Vec<String>),

    #[error("no wave plan computed yet")]
    NotPlanned,

    #[error("illegal wave status transition from {from:?} to {to:?}")]
    IllegalTransition { from: WaveStatus, to: WaveStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type WaveResult<T> = Result<T, WaveError>;

/// Topologically sort `tasks` by `blocked_by` into waves. References to
/// task ids absent from `tasks` are treated as already satisfied (a task
/// deleted out from under a dependent should not deadlock planning).
pub fn calculate_waves(tasks: &[Task]) -> WaveResult<Vec<Vec<String>>> {
    let known: BTreeSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for t in tasks {
        let deps: Vec<&str> = t
            .blocked_by
            .iter()
            .map(|s| s.as_str())
            .filter(|id| known.contains(id))
            .collect();
        indegree.insert(t.id.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(t.id.as_str());
        }
    }

    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut remaining: BTreeSet<&str> = known.clone();
    let mut frontier: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    // BTreeMap iteration is already ascending-id order.

    while !frontier.is_empty() {
        let mut wave: Vec<&str> = frontier.drain(..).collect();
        wave.sort_unstable();
        for id in &wave {
            remaining.remove(id);
        }

        let mut next: BTreeSet<&str> = BTreeSet::new();
        for id in &wave {
            for &dep_on_id in dependents.get(id).map(|v| v.as_slice()).unwrap_or_default() {
                let deg = indegree.get_mut(dep_on_id).expect("known task");
                *deg -= 1;
                if *deg == 0 {
                    next.insert(dep_on_id);
                }
            }
        }
        frontier.extend(next);
        waves.push(wave.into_iter().map(String::from).collect());
    }

    if !remaining.is_empty() {
        let mut cycle: Vec<String> = remaining.into_iter().map(String::from).collect();
        cycle.sort();
        return Err(WaveError::CycleDetected(cycle));
    }

    Ok(waves)
}

pub struct WaveStore<'a, C: Clock> {
    store: AtomicStore,
    paths: &'a Paths,
    clock: &'a C,
}

impl<'a, C: Clock> WaveStore<'a, C> {
    pub fn new(paths: &'a Paths, clock: &'a C) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            clock,
        }
    }

    pub fn get(&self, project: &str, team: &str) -> WaveResult<WavePlan> {
        let path = self.paths.waves_file(project, team);
        self.store
            .read_json(&path)
            .map_err(|e| map_not_found(e, project, team))
    }

    /// Recompute the wave plan from the current task set and persist it.
    /// Existing per-wave status/timestamps are preserved where the wave's
    /// task membership is unchanged; new or reshuffled waves start in
    /// `Planning`.
    pub fn plan(&self, project: &str, team: &str, tasks: &[Task]) -> WaveResult<WavePlan> {
        let assignment = calculate_waves(tasks)?;
        let path = self.paths.waves_file(project, team);

        self.store
            .update::<WavePlan, _>(&path, |existing| {
                let prior = existing.unwrap_or_default();
                let mut waves = Vec::with_capacity(assignment.len());
                for (idx, task_ids) in assignment.into_iter().enumerate() {
                    let id = idx as u32 + 1;
                    if let Some(prev) = prior.waves.iter().find(|w| w.id == id && w.tasks == task_ids) {
                        waves.push(prev.clone());
                    } else {
                        waves.push(Wave {
                            id,
                            status: WaveStatus::Planning,
                            tasks: task_ids,
                            started_at: None,
                            completed_at: None,
                            verified_at: None,
                        });
                    }
                }
                let current_wave = waves
                    .iter()
                    .find(|w| !matches!(w.status, WaveStatus::Completed | WaveStatus::Verified))
                    .map(|w| w.id)
                    .unwrap_or_else(|| waves.len() as u32);
                Ok(WavePlan {
                    total_waves: waves.len() as u32,
                    current_wave,
                    waves,
                })
            })
            .map_err(WaveError::Store)
    }

    /// Advance (or deliberately regress) the status of
    /// a single wave. Backward transitions are permitted — a wave can be
    /// reopened if verification fails.
    pub fn set_status(&self, project: &str, team: &str, wave_id: u32, status: WaveStatus) -> WaveResult<WavePlan> {
        let path = self.paths.waves_file(project, team);
        let now = self.clock.now();

        self.store
            .update::<WavePlan, _>(&path, |existing| {
                let mut plan = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
                let wave = plan
                    .waves
                    .iter_mut()
                    .find(|w| w.id == wave_id)
                    .ok_or_else(|| StoreError::Corrupt {
                        path: path.clone(),
                        reason: format!("wave_not_found|{wave_id}"),
                    })?;

                match (wave.status, status) {
                    (WaveStatus::Planning, WaveStatus::InProgress) => wave.started_at = Some(now),
                    (WaveStatus::InProgress, WaveStatus::Completed) => wave.completed_at = Some(now),
                    (WaveStatus::Completed, WaveStatus::Verified) => wave.verified_at = Some(now),
                    (WaveStatus::Completed, WaveStatus::InProgress) => {
                        wave.completed_at = None;
                    }
                    (WaveStatus::Verified, WaveStatus::InProgress) => {
                        wave.completed_at = None;
                        wave.verified_at = None;
                    }
                    (from, to) if from == to => {}
                    _ => {
                        return Err(StoreError::Corrupt {
                            path: path.clone(),
                            reason: format!("illegal_wave_transition|{:?}|{:?}", wave.status, status),
                        })
                    }
                }
                wave.status = status;

                plan.current_wave = plan
                    .waves
                    .iter()
                    .find(|w| !matches!(w.status, WaveStatus::Completed | WaveStatus::Verified))
                    .map(|w| w.id)
                    .unwrap_or(plan.total_waves);

                Ok(plan)
            })
            .map_err(|e| translate(e, project, team, wave_id, status))
    }
}

fn map_not_found(e: StoreError, project: &str, team: &str) -> WaveError {
    match e {
        StoreError::NotFound(_) => WaveError::NotFound(project.to_string(), team.to_string()),
        other => WaveError::Store(other),
    }
}

fn translate(e: StoreError, project: &str, team: &str, _wave_id: u32, to: WaveStatus) -> WaveError {
    if let StoreError::Corrupt { reason, .. } = &e {
        if let Some(rest) = reason.strip_prefix("illegal_wave_transition|") {
            let from_str = rest.split('|').next().unwrap_or_default();
            let from = parse_status(from_str).unwrap_or(to);
            return WaveError::IllegalTransition { from, to };
        }
        if reason.starts_with("wave_not_found|") {
            return WaveError::NotFound(project.to_string(), team.to_string());
        }
    }
    map_not_found(e, project, team)
}

fn parse_status(s: &str) -> Option<WaveStatus> {
    match s {
        "Planning" => Some(WaveStatus::Planning),
        "InProgress" => Some(WaveStatus::InProgress),
        "Completed" => Some(WaveStatus::Completed),
        "Verified" => Some(WaveStatus::Verified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::model::task::NewTask;
    use std::collections::BTreeSet;

    fn task(id: &str, blocked_by: &[&str]) -> Task {
        let mut deps = BTreeSet::new();
        for d in blocked_by {
            deps.insert(d.to_string());
        }
        Task::new(
            id,
            NewTask {
                subject: id.to_string(),
                blocked_by: deps,
                ..Default::default()
            },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn linear_chain_produces_one_task_per_wave() {
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])];
        let waves = calculate_waves(&tasks).unwrap();
        assert_eq!(waves, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn independent_tasks_share_a_wave() {
        let tasks = vec![task("a", &[]), task("b", &[]), task("c", &[])];
        let waves = calculate_waves(&tasks).unwrap();
        assert_eq!(waves, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn cycle_is_detected() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let err = calculate_waves(&tasks).unwrap_err();
        match err {
            WaveError::CycleDetected(mut ids) => {
                ids.sort();
                assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn dangling_dependency_reference_is_satisfied() {
        let tasks = vec![task("a", &["ghost"])];
        let waves = calculate_waves(&tasks).unwrap();
        assert_eq!(waves, vec![vec!["a"]]);
    }

    #[test]
    fn plan_persists_and_status_advances() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let clock = SystemClock;
        let store = WaveStore::new(&paths, &clock);

        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let plan = store.plan("proj", "team", &tasks).unwrap();
        assert_eq!(plan.total_waves, 2);
        assert_eq!(plan.current_wave, 1);

        store.set_status("proj", "team", 1, WaveStatus::InProgress).unwrap();
        let plan = store.set_status("proj", "team", 1, WaveStatus::Completed).unwrap();
        assert_eq!(plan.current_wave, 2);
    }
}
