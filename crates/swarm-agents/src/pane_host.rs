//! Pane Host — tmux session/pane management for swarm workers.
//!
//! Each worker gets its own tmux pane so a human can attach and watch it
//! work. Kept behind a trait (mirroring [`orc_core::workspace::WorkspaceProvider`])
//! so the swarm controller is testable without a real tmux binary.

use std::path::Path;
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum PaneHostError {
    #[error("tmux session not found: {0}")]
    SessionNotFound(String),

    #[error("tmux command failed: {0}")]
    CommandFailed(String),

    #[error("failed to spawn tmux: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type PaneHostResult<T> = Result<T, PaneHostError>;

/// Abstraction over tmux session/pane lifecycle, so swarm orchestration
/// logic can be exercised against a mock without shelling out for real.
pub trait PaneHost: Send + Sync {
    fn session_exists(&self, session: &str) -> PaneHostResult<bool>;
    fn create_session(&self, session: &str, cwd: &Path) -> PaneHostResult<()>;
    fn add_pane(&self, session: &str, cwd: &Path) -> PaneHostResult<u32>;
    fn send_keys(&self, session: &str, pane: u32, keys: &str) -> PaneHostResult<()>;
    fn kill_session(&self, session: &str) -> PaneHostResult<()>;
}

pub struct TmuxPaneHost;

impl TmuxPaneHost {
    pub fn new() -> Self {
        Self
    }

    fn tmux(args: &[&str]) -> PaneHostResult<std::process::Output> {
        Command::new("tmux").args(args).output().map_err(PaneHostError::Spawn)
    }
}

impl Default for TmuxPaneHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PaneHost for TmuxPaneHost {
    fn session_exists(&self, session: &str) -> PaneHostResult<bool> {
        let output = Self::tmux(&["has-session", "-t", session])?;
        Ok(output.status.success())
    }

    fn create_session(&self, session: &str, cwd: &Path) -> PaneHostResult<()> {
        let output = Self::tmux(&[
            "new-session",
            "-d",
            "-s",
            session,
            "-c",
            &cwd.display().to_string(),
        ])?;
        if !output.status.success() {
            return Err(PaneHostError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    fn add_pane(&self, session: &str, cwd: &Path) -> PaneHostResult<u32> {
        let output = Self::tmux(&[
            "split-window",
            "-t",
            session,
            "-c",
            &cwd.display().to_string(),
            "-P",
            "-F",
            "#{pane_index}",
        ])?;
        if !output.status.success() {
            return Err(PaneHostError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .map_err(|_| PaneHostError::CommandFailed("could not parse pane index".to_string()))
    }

    fn send_keys(&self, session: &str, pane: u32, keys: &str) -> PaneHostResult<()> {
        let target = format!("{session}.{pane}");
        let output = Self::tmux(&["send-keys", "-t", &target, keys, "Enter"])?;
        if !output.status.success() {
            return Err(PaneHostError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    fn kill_session(&self, session: &str) -> PaneHostResult<()> {
        if !self.session_exists(session)? {
            return Err(PaneHostError::SessionNotFound(session.to_string()));
        }
        let output = Self::tmux(&["kill-session", "-t", session])?;
        if !output.status.success() {
            return Err(PaneHostError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakePaneHost {
        sessions: Mutex<std::collections::BTreeMap<String, u32>>,
    }

    impl PaneHost for FakePaneHost {
        fn session_exists(&self, session: &str) -> PaneHostResult<bool> {
            Ok(self.sessions.lock().unwrap().contains_key(session))
        }
        fn create_session(&self, session: &str, _cwd: &Path) -> PaneHostResult<()> {
            self.sessions.lock().unwrap().insert(session.to_string(), 0);
            Ok(())
        }
        fn add_pane(&self, session: &str, _cwd: &Path) -> PaneHostResult<u32> {
            let mut sessions = self.sessions.lock().unwrap();
            let entry = sessions
                .get_mut(session)
                .ok_or_else(|| PaneHostError::SessionNotFound(session.to_string()))?;
            *entry += 1;
            Ok(*entry)
        }
        fn send_keys(&self, _session: &str, _pane: u32, _keys: &str) -> PaneHostResult<()> {
            Ok(())
        }
        fn kill_session(&self, session: &str) -> PaneHostResult<()> {
            self.sessions
                .lock()
                .unwrap()
                .remove(session)
                .map(|_| ())
                .ok_or_else(|| PaneHostError::SessionNotFound(session.to_string()))
        }
    }

    #[test]
    fn fake_host_tracks_pane_indices() {
        let host = FakePaneHost::default();
        host.create_session("swarm-1", &PathBuf::from("/tmp")).unwrap();
        assert_eq!(host.add_pane("swarm-1", &PathBuf::from("/tmp")).unwrap(), 1);
        assert_eq!(host.add_pane("swarm-1", &PathBuf::from("/tmp")).unwrap(), 2);
    }

    #[test]
    fn kill_nonexistent_session_errors() {
        let host = FakePaneHost::default();
        let err = host.kill_session("ghost").unwrap_err();
        assert!(matches!(err, PaneHostError::SessionNotFound(_)));
    }
}
