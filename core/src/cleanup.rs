//! C11 — Session Cleanup.
//!
//! Deletes session directories under one of three modes
//! (`--older-than`, `--completed`, `--all`), gated through the safety
//! predicate so cleanup can never walk outside the configured store
//! root even given a hostile session id.

use crate::clock::Clock;
use crate::model::session::Session;
use crate::paths::{Paths, SafetyPredicate};
use crate::store::AtomicStore;
use chrono::Duration as ChronoDuration;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("refused to delete {0}: outside the safety boundary")]
    SafetyViolation(std::path::PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CleanupResult<T> = Result<T, CleanupError>;

#[derive(Debug, Clone, Copy)]
pub enum CleanupMode {
    /// Sessions whose `updated_at` is older than `age`.
    OlderThan(ChronoDuration),
    /// Sessions in a terminal phase (`Complete`, `Cancelled`, `Failed`).
    Completed,
    /// Every session under the store root.
    All,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub deleted_sessions: Vec<String>,
    pub preserved_count: usize,
}

pub struct Cleanup<'a, C: Clock> {
    store: AtomicStore,
    paths: &'a Paths,
    predicate: SafetyPredicate,
    clock: &'a C,
}

impl<'a, C: Clock> Cleanup<'a, C> {
    pub fn new(paths: &'a Paths, predicate: SafetyPredicate, clock: &'a C) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            predicate,
            clock,
        }
    }

    /// Evaluate `mode` against every session under the store root and
    /// delete the ones that match. A session directory whose
    /// `session.json` fails to parse is conservatively preserved rather
    /// than deleted, since we cannot determine whether it matches.
    pub fn run(&self, mode: CleanupMode, dry_run: bool) -> CleanupResult<CleanupReport> {
        let root = self.paths.sessions_root();
        let mut report = CleanupReport::default();

        let Ok(entries) = std::fs::read_dir(&root) else {
            return Ok(report);
        };

        for entry in entries {
            let entry = entry?;
            let session_dir = entry.path();
            if !session_dir.is_dir() {
                continue;
            }
            let Some(session_id) = session_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let session_path = self.paths.session_file(session_id);
            let matches = match self.store.read_json::<Session>(&session_path) {
                Ok(session) => self.matches(&session, mode),
                Err(_) => false,
            };

            if !matches {
                report.preserved_count += 1;
                continue;
            }

            if !self.predicate.allows(&session_dir) {
                return Err(CleanupError::SafetyViolation(session_dir));
            }

            if !dry_run {
                std::fs::remove_dir_all(&session_dir)?;
            }
            report.deleted_count += 1;
            report.deleted_sessions.push(session_id.to_string());
        }

        Ok(report)
    }

    fn matches(&self, session: &Session, mode: CleanupMode) -> bool {
        match mode {
            CleanupMode::All => true,
            CleanupMode::Completed => session.phase.is_terminal(),
            CleanupMode::OlderThan(age) => {
                let now = self.clock.now();
                session.phase.is_terminal() && now.signed_duration_since(session.updated_at) >= age
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::model::session::SessionOptions;
    use crate::paths::Config;
    use crate::session_store::SessionStore;

    fn setup() -> (tempfile::TempDir, Paths, FixedClock) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let clock = FixedClock::new(chrono::Utc::now());
        (dir, paths, clock)
    }

    #[test]
    fn all_mode_deletes_every_session() {
        let (dir, paths, clock) = setup();
        let sessions = SessionStore::new(&paths, &clock);
        sessions
            .init("s1", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();
        sessions
            .init("s2", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();

        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);
        let cleanup = Cleanup::new(&paths, predicate, &clock);

        let report = cleanup.run(CleanupMode::All, false).unwrap();
        assert_eq!(report.deleted_count, 2);
        assert!(!dir.path().join("sessions").join("s1").exists());
    }

    #[test]
    fn older_than_preserves_recent_sessions() {
        let (dir, paths, clock) = setup();
        let sessions = SessionStore::new(&paths, &clock);
        sessions
            .init("s1", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();
        sessions.cancel("s1").unwrap();

        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);
        let cleanup = Cleanup::new(&paths, predicate, &clock);

        let report = cleanup
            .run(CleanupMode::OlderThan(ChronoDuration::days(7)), false)
            .unwrap();
        assert_eq!(report.deleted_count, 0);
        assert_eq!(report.preserved_count, 1);

        clock.advance(8 * 24 * 60 * 60 * 1000);
        let report = cleanup
            .run(CleanupMode::OlderThan(ChronoDuration::days(7)), false)
            .unwrap();
        assert_eq!(report.deleted_count, 1);
    }

    #[test]
    fn older_than_never_deletes_a_non_terminal_session_no_matter_its_age() {
        let (dir, paths, clock) = setup();
        let sessions = SessionStore::new(&paths, &clock);
        sessions
            .init("s1", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();
        // s1 stays in Planning: never cancelled, completed, or failed.

        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);
        let cleanup = Cleanup::new(&paths, predicate, &clock);

        clock.advance(30 * 24 * 60 * 60 * 1000);
        let report = cleanup
            .run(CleanupMode::OlderThan(ChronoDuration::days(7)), false)
            .unwrap();
        assert_eq!(report.deleted_count, 0);
        assert_eq!(report.preserved_count, 1);
        assert!(dir.path().join("sessions").join("s1").exists());
    }

    #[test]
    fn completed_mode_skips_active_sessions() {
        let (dir, paths, clock) = setup();
        let sessions = SessionStore::new(&paths, &clock);
        sessions
            .init("s1", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();
        sessions.cancel("s1").unwrap();
        sessions
            .init("s2", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();

        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);
        let cleanup = Cleanup::new(&paths, predicate, &clock);

        let report = cleanup.run(CleanupMode::Completed, false).unwrap();
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_sessions, vec!["s1".to_string()]);
    }

    #[test]
    fn dry_run_reports_without_deleting() {
        let (dir, paths, clock) = setup();
        let sessions = SessionStore::new(&paths, &clock);
        sessions
            .init("s1", "goal", dir.path().to_path_buf(), SessionOptions::default())
            .unwrap();

        let config = Config::at_root(dir.path(), true);
        let predicate = SafetyPredicate::new(&config);
        let cleanup = Cleanup::new(&paths, predicate, &clock);

        let report = cleanup.run(CleanupMode::All, true).unwrap();
        assert_eq!(report.deleted_count, 1);
        assert!(dir.path().join("sessions").join("s1").exists());
    }
}
