//! C1 — Path Resolver.
//!
//! Maps logical entities (project, team, session, task, worker) to
//! filesystem paths under a single configurable root, and gates every
//! destructive operation behind a safety predicate.

use std::env;
use std::path::{Path, PathBuf};

/// Well-known environment variable overriding the store root.
pub const ROOT_ENV_VAR: &str = "ORC_STORE_ROOT";

/// Well-known environment variable naming the caller's current session id.
pub const SESSION_ENV_VAR: &str = "ORC_SESSION_ID";

/// Resolved runtime configuration: store root plus whether that root was
/// explicitly overridden away from the user's home directory (which relaxes
/// the safety predicate).
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    /// True when `ORC_STORE_ROOT` was set to a path outside the caller's
    /// home directory. Such roots are assumed to be disposable test/sandbox
    /// roots, so destructive operations are allowed freely within them.
    pub relaxed_safety: bool,
}

impl Config {
    /// Resolve configuration from the environment. `product` names the
    /// subdirectory used under the default `<home>/.claude/<product>` root.
    pub fn from_env(product: &str) -> Self {
        match env::var_os(ROOT_ENV_VAR) {
            Some(root) => {
                let root = PathBuf::from(root);
                let relaxed_safety = match dirs_home() {
                    Some(home) => !root.starts_with(&home),
                    None => true,
                };
                Config {
                    root,
                    relaxed_safety,
                }
            }
            None => {
                let home = dirs_home().unwrap_or_else(|| PathBuf::from("."));
                Config {
                    root: home.join(".claude").join(product),
                    relaxed_safety: false,
                }
            }
        }
    }

    /// Build a `Config` pointed at an explicit root (mainly for tests).
    pub fn at_root(root: impl Into<PathBuf>, relaxed_safety: bool) -> Self {
        Config {
            root: root.into(),
            relaxed_safety,
        }
    }

    pub fn paths(&self) -> Paths {
        Paths {
            root: self.root.clone(),
        }
    }

    /// Current session id binder, if the caller set one.
    pub fn current_session_id() -> Option<String> {
        env::var(SESSION_ENV_VAR).ok()
    }
}

fn dirs_home() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

/// Derives canonical filesystem paths for every entity under a store root,
/// per the on-disk layout.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- sessions -----------------------------------------------------

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("sessions").join(session_id)
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("session.json")
    }

    pub fn context_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("context.json")
    }

    pub fn exploration_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("exploration")
    }

    pub fn session_task_file(&self, session_id: &str, task_id: &str) -> PathBuf {
        self.session_dir(session_id)
            .join("tasks")
            .join(format!("{task_id}.json"))
    }

    pub fn session_tasks_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("tasks")
    }

    pub fn sessions_root(&self) -> PathBuf {
        self.root.join("sessions")
    }

    // -- project/team ---------------------------------------------------

    pub fn team_dir(&self, project: &str, team: &str) -> PathBuf {
        self.root.join(project).join(team)
    }

    pub fn project_file(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("project.json")
    }

    pub fn task_file(&self, project: &str, team: &str, task_id: &str) -> PathBuf {
        self.team_dir(project, team)
            .join("tasks")
            .join(format!("{task_id}.json"))
    }

    pub fn tasks_dir(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("tasks")
    }

    pub fn waves_file(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("waves.json")
    }

    pub fn inbox_file(&self, project: &str, team: &str, recipient: &str) -> PathBuf {
        self.team_dir(project, team)
            .join("inboxes")
            .join(format!("{recipient}.json"))
    }

    pub fn inboxes_dir(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("inboxes")
    }

    pub fn swarm_file(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("swarm").join("swarm.json")
    }

    pub fn worker_file(&self, project: &str, team: &str, worker_id: &str) -> PathBuf {
        self.team_dir(project, team)
            .join("swarm")
            .join("workers")
            .join(format!("{worker_id}.json"))
    }

    pub fn workers_dir(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("swarm").join("workers")
    }

    pub fn worktree_dir(&self, project: &str, team: &str, worker_id: &str) -> PathBuf {
        self.team_dir(project, team).join("worktrees").join(worker_id)
    }

    pub fn worktrees_root(&self, project: &str, team: &str) -> PathBuf {
        self.team_dir(project, team).join("worktrees")
    }

    pub fn loop_state_file(&self, project: &str, team: &str, session_id: &str) -> PathBuf {
        self.team_dir(project, team)
            .join(".loop-state")
            .join(format!("{session_id}.json"))
    }

    // -- safety predicate -------------------------------------------------

    /// True iff `target` may be destroyed: it must be a proper descendant of
    /// the root, and remain so after canonicalization (defeating traversal
    /// via `..`). Removing the root itself is never permitted.
    pub fn is_descendant(&self, target: &Path) -> bool {
        is_proper_descendant(&self.root, target)
    }
}

fn is_proper_descendant(root: &Path, target: &Path) -> bool {
    if target == root {
        return false;
    }
    if !target.starts_with(root) {
        return false;
    }
    // Re-check post-canonicalization when possible to defeat `..` traversal.
    // Nonexistent paths (common for "about to delete" checks on files that
    // may already be gone) fall back to the lexical check above.
    match (root.canonicalize(), target.canonicalize()) {
        (Ok(root_c), Ok(target_c)) => target_c != root_c && target_c.starts_with(&root_c),
        _ => true,
    }
}

/// The safety predicate: gates every destructive
/// filesystem operation. When the store root has been relaxed (pointed
/// somewhere outside the home directory, e.g. for test isolation),
/// destructive operations are allowed anywhere under the root. Otherwise
/// they are restricted to at-or-below a project/team leaf (never the
/// session/project root directories themselves, and never the store root).
pub struct SafetyPredicate {
    pub paths: Paths,
    pub relaxed: bool,
}

impl SafetyPredicate {
    pub fn new(config: &Config) -> Self {
        Self {
            paths: config.paths(),
            relaxed: config.relaxed_safety,
        }
    }

    /// Check whether `target` may be destroyed.
    pub fn allows(&self, target: &Path) -> bool {
        if !self.paths.is_descendant(target) {
            return false;
        }
        if self.relaxed {
            return true;
        }
        // Unrelaxed: refuse to delete the session/project root itself —
        // only leaves (task files, worker files, inbox files, worktrees,
        // individual session directories) are fair game. A session
        // directory one level below `sessions/` counts as a leaf.
        let depth = target
            .strip_prefix(self.paths.root())
            .map(|p| p.components().count())
            .unwrap_or(0);
        depth >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendant_check_rejects_root_itself() {
        let paths = Paths::new("/tmp/orc-root");
        assert!(!paths.is_descendant(Path::new("/tmp/orc-root")));
    }

    #[test]
    fn descendant_check_rejects_sibling() {
        let paths = Paths::new("/tmp/orc-root");
        assert!(!paths.is_descendant(Path::new("/tmp/other-root/x")));
    }

    #[test]
    fn descendant_check_accepts_child() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let child = dir.path().join("sessions").join("s1");
        std::fs::create_dir_all(&child).unwrap();
        assert!(paths.is_descendant(&child));
    }

    #[test]
    fn safety_predicate_restricts_unrelaxed_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_root(dir.path(), false);
        let predicate = SafetyPredicate::new(&config);

        let project_leaf = dir.path().join("proj").join("team");
        assert!(predicate.allows(&project_leaf));

        let top_level = dir.path().join("proj");
        assert!(!predicate.allows(&top_level));
    }

    #[test]
    fn safety_predicate_relaxed_allows_any_descendant() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);

        let top_level = dir.path().join("proj");
        assert!(predicate.allows(&top_level));
    }
}
