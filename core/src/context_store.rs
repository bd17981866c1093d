//! C5 — Context Store.
//!
//! Tracks the exploration index for a session: which explorers were
//! expected, which have reported in, and the accumulated key files /
//! patterns / constraints they surfaced.

use crate::model::context::{Context, Explorer};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ContextResult<T> = Result<T, ContextError>;

pub struct ContextStore<'a> {
    store: AtomicStore,
    paths: &'a Paths,
}

impl<'a> ContextStore<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
        }
    }

    pub fn get(&self, session_id: &str) -> ContextResult<Context> {
        let path = self.paths.context_file(session_id);
        self.store.read_json(&path).map_err(|e| map_not_found(e, session_id))
    }

    /// Seed the expected-explorer set. Merges with any explorers already
    /// recorded rather than discarding them, so `init_context` may be
    /// called again (e.g. after a resumed exploration) without losing
    /// prior reports.
    pub fn init_context(&self, session_id: &str, expected_explorers: Vec<String>) -> ContextResult<Context> {
        let path = self.paths.context_file(session_id);
        self.store
            .update::<Context, _>(&path, |existing| {
                let mut ctx = existing.unwrap_or_default();
                ctx.expected_explorers = expected_explorers;
                ctx.recompute_complete();
                Ok(ctx)
            })
            .map_err(|e| map_not_found(e, session_id))
    }

    /// Record one explorer's findings. A duplicate id (the same explorer
    /// reporting twice) is a warning, not an error: the existing entry is
    /// preserved rather than overwritten, since the first report already
    /// satisfied that explorer's slot.
    pub fn add_explorer(
        &self,
        session_id: &str,
        explorer: Explorer,
        key_files: Vec<String>,
        patterns: Vec<String>,
        constraints: Vec<String>,
    ) -> ContextResult<Context> {
        let path = self.paths.context_file(session_id);
        self.store
            .update::<Context, _>(&path, |existing| {
                let mut ctx = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;

                if ctx.explorers.iter().any(|e| e.id == explorer.id) {
                    return Ok(ctx);
                }
                ctx.explorers.push(explorer);
                ctx.key_files.extend(key_files);
                ctx.patterns.extend(patterns);
                ctx.constraints.extend(constraints);
                ctx.recompute_complete();
                Ok(ctx)
            })
            .map_err(|e| map_not_found(e, session_id))
    }
}

fn map_not_found(e: StoreError, session_id: &str) -> ContextError {
    match e {
        StoreError::NotFound(_) => ContextError::NotFound(session_id.to_string()),
        other => ContextError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let store = AtomicStore::new();
        store.write_json(&paths.context_file("s1"), &Context::default()).unwrap();
        (dir, paths)
    }

    #[test]
    fn init_context_seeds_expected_explorers() {
        let (_dir, paths) = setup();
        let store = ContextStore::new(&paths);
        let ctx = store
            .init_context("s1", vec!["backend".into(), "frontend".into()])
            .unwrap();
        assert_eq!(ctx.expected_explorers.len(), 2);
        assert!(!ctx.exploration_complete);
    }

    #[test]
    fn exploration_complete_flips_once_all_report() {
        let (_dir, paths) = setup();
        let store = ContextStore::new(&paths);
        store
            .init_context("s1", vec!["backend".into(), "frontend".into()])
            .unwrap();

        let ctx = store
            .add_explorer(
                "s1",
                Explorer {
                    id: "backend".into(),
                    hint: None,
                    file: None,
                    summary: "done".into(),
                },
                vec!["src/main.rs".into()],
                vec![],
                vec![],
            )
            .unwrap();
        assert!(!ctx.exploration_complete);

        let ctx = store
            .add_explorer(
                "s1",
                Explorer {
                    id: "frontend".into(),
                    hint: None,
                    file: None,
                    summary: "done".into(),
                },
                vec![],
                vec![],
                vec![],
            )
            .unwrap();
        assert!(ctx.exploration_complete);
    }

    #[test]
    fn duplicate_explorer_report_preserves_existing_entry() {
        let (_dir, paths) = setup();
        let store = ContextStore::new(&paths);
        store.init_context("s1", vec!["backend".into()]).unwrap();

        store
            .add_explorer(
                "s1",
                Explorer {
                    id: "backend".into(),
                    hint: None,
                    file: None,
                    summary: "first".into(),
                },
                vec!["src/first.rs".into()],
                vec![],
                vec![],
            )
            .unwrap();
        let ctx = store
            .add_explorer(
                "s1",
                Explorer {
                    id: "backend".into(),
                    hint: None,
                    file: None,
                    summary: "second".into(),
                },
                vec!["src/second.rs".into()],
                vec![],
                vec![],
            )
            .unwrap();

        assert_eq!(ctx.explorers.len(), 1);
        assert_eq!(ctx.explorers[0].summary, "first");
        assert_eq!(ctx.key_files, vec!["src/first.rs".to_string()]);
    }
}
