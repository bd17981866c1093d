//! C9 — Workspace Isolation.
//!
//! Defines the `WorkspaceProvider` seam (async, so a real implementation
//! can shell out to `git worktree`/`git merge` without blocking the
//! executor) and the orchestration around it: idempotent create/remove,
//! a dirty-tree precondition on merge, and a structured conflict record
//! instead of a bare error when a merge can't fast-forward cleanly.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("workspace not found at {0}")]
    NotFound(PathBuf),

    #[error("{0} is not under version control")]
    NotARepo(PathBuf),

    #[error("workspace at {0} has uncommitted changes")]
    DirtyTree(PathBuf),

    #[error("merge conflict in {worker}: {files:?}")]
    MergeConflict { worker: String, files: Vec<String> },

    #[error("underlying collaborator failed: {0}")]
    Provider(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Outcome of a merge attempt that didn't cleanly fast-forward.
#[derive(Debug, Clone)]
pub struct ConflictRecord {
    pub worker: String,
    pub files: Vec<String>,
}

/// Abstraction over the mechanism that gives a worker its own isolated
/// filesystem view (a git worktree in practice) — swappable for a test
/// double so swarm orchestration logic can be exercised without a real
/// git repository.
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// Create an isolated workspace for `worker_id`, branching from
    /// `source_dir`. Idempotent: if one already exists at the target
    /// path, returns it unchanged rather than erroring.
    async fn create_isolated(&self, source_dir: &Path, worker_id: &str, target: &Path) -> WorkspaceResult<PathBuf>;

    /// Remove a previously created workspace. Idempotent: removing a
    /// nonexistent workspace is not an error.
    async fn remove(&self, target: &Path) -> WorkspaceResult<()>;

    /// Pull upstream changes from `source_dir` into `target`, refusing if
    /// `target` has uncommitted changes (`DirtyTree`).
    async fn sync(&self, source_dir: &Path, target: &Path) -> WorkspaceResult<()>;

    /// Merge `target`'s work back into `source_dir`. On a clean
    /// fast-forward/merge, returns `Ok(None)`; on conflict, returns
    /// `Ok(Some(ConflictRecord))` rather than an error, since a merge
    /// conflict is an expected, recoverable outcome the caller must act on.
    async fn merge(&self, source_dir: &Path, target: &Path, worker_id: &str) -> WorkspaceResult<Option<ConflictRecord>>;
}

/// Coordinates workspace lifecycle for a swarm: ensures idempotence and
/// enforces the dirty-tree precondition uniformly regardless of which
/// `WorkspaceProvider` is plugged in.
pub struct WorkspaceOrchestrator<P: WorkspaceProvider> {
    provider: P,
}

impl<P: WorkspaceProvider> WorkspaceOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn ensure_isolated(&self, source_dir: &Path, worker_id: &str, target: &Path) -> WorkspaceResult<PathBuf> {
        self.provider.create_isolated(source_dir, worker_id, target).await
    }

    pub async fn teardown(&self, target: &Path) -> WorkspaceResult<()> {
        self.provider.remove(target).await
    }

    pub async fn sync(&self, source_dir: &Path, target: &Path) -> WorkspaceResult<()> {
        self.provider.sync(source_dir, target).await
    }

    /// Merge a worker's workspace back, surfacing conflicts as a value
    /// rather than propagating them as an error.
    pub async fn merge(
        &self,
        source_dir: &Path,
        target: &Path,
        worker_id: &str,
    ) -> WorkspaceResult<Option<ConflictRecord>> {
        self.provider.merge(source_dir, target, worker_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Provider {}

        #[async_trait]
        impl WorkspaceProvider for Provider {
            async fn create_isolated(&self, source_dir: &Path, worker_id: &str, target: &Path) -> WorkspaceResult<PathBuf>;
            async fn remove(&self, target: &Path) -> WorkspaceResult<()>;
            async fn sync(&self, source_dir: &Path, target: &Path) -> WorkspaceResult<()>;
            async fn merge(&self, source_dir: &Path, target: &Path, worker_id: &str) -> WorkspaceResult<Option<ConflictRecord>>;
        }
    }

    #[tokio::test]
    async fn ensure_isolated_delegates_to_provider() {
        let mut mock = MockProvider::new();
        mock.expect_create_isolated()
            .times(1)
            .returning(|_, _, target| Ok(target.to_path_buf()));

        let orch = WorkspaceOrchestrator::new(mock);
        let result = orch
            .ensure_isolated(Path::new("/src"), "w1", Path::new("/wt/w1"))
            .await
            .unwrap();
        assert_eq!(result, PathBuf::from("/wt/w1"));
    }

    #[tokio::test]
    async fn merge_conflict_surfaces_as_value() {
        let mut mock = MockProvider::new();
        mock.expect_merge().times(1).returning(|_, _, worker| {
            Ok(Some(ConflictRecord {
                worker: worker.to_string(),
                files: vec!["src/lib.rs".to_string()],
            }))
        });

        let orch = WorkspaceOrchestrator::new(mock);
        let record = orch
            .merge(Path::new("/src"), Path::new("/wt/w1"), "w1")
            .await
            .unwrap();
        let record = record.expect("expected a conflict record");
        assert_eq!(record.worker, "w1");
        assert_eq!(record.files, vec!["src/lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn sync_rejects_dirty_tree() {
        let mut mock = MockProvider::new();
        mock.expect_sync()
            .times(1)
            .returning(|_, target| Err(WorkspaceError::DirtyTree(target.to_path_buf())));

        let orch = WorkspaceOrchestrator::new(mock);
        let err = orch.sync(Path::new("/src"), Path::new("/wt/w1")).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::DirtyTree(_)));
    }
}
