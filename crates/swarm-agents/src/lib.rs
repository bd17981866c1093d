//! CLI-facing crate: the pane host and git-worktree collaborators, the
//! swarm controller that composes them with the core stores, and the
//! command surface that exposes all of it to an end user.

pub mod cli;
pub mod output;
pub mod pane_host;
pub mod swarm_controller;
pub mod worktree_bridge;
