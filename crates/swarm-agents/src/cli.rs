//! Command surface: one subcommand noun per component, wired onto the
//! core stores and this crate's swarm controller / collaborators.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use orc_core::cleanup::{Cleanup, CleanupMode};
use orc_core::clock::{Clock, SystemClock};
use orc_core::context_store::ContextStore;
use orc_core::mailbox::Mailbox;
use orc_core::model::context::Explorer;
use orc_core::model::mailbox::MessageType;
use orc_core::model::session::{EvidenceRecord, ExplorationStage, Phase, SessionOptions};
use orc_core::model::task::{Complexity, NewTask, TaskStatus};
use orc_core::model::wave::WaveStatus;
use orc_core::paths::{Config, Paths, SafetyPredicate};
use orc_core::project_view::ProjectView;
use orc_core::session_store::{SessionPatch, SessionStore};
use orc_core::task_store::{TaskFilter, TaskPatch, TaskStore};
use orc_core::wave::WaveStore;
use orc_core::workspace::WorkspaceOrchestrator;

use crate::output::OutputFormat;
use crate::pane_host::TmuxPaneHost;
use crate::swarm_controller::{RoleRequest, StopTarget, SwarmController};
use crate::worktree_bridge::GitWorktreeProvider;

/// The subdirectory name under `<home>/.claude/` used as the default
/// store root when `ORC_STORE_ROOT` is unset.
const PRODUCT: &str = "swarm-orchestrator";

#[derive(Parser)]
#[command(name = "orc", version, about = "File-backed session/task orchestration core")]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Single-track planning/execution/verification sessions.
    Session(SessionArgs),
    /// Task graph within a project/team.
    Task(TaskArgs),
    /// Exploration index for a session.
    Context(ContextArgs),
    /// Wave computation and status over a task graph.
    Wave(WaveArgs),
    /// Read-only project/team status view.
    Project(ProjectArgs),
    /// Per-recipient inbox messaging.
    Mailbox(MailboxArgs),
    /// Isolated-workspace lifecycle (git worktrees).
    Workspace(WorkspaceArgs),
    /// Team-work swarm of tmux-paned workers.
    Swarm(SwarmArgs),
    /// Session directory garbage collection.
    Cleanup(CleanupArgs),
}

pub async fn dispatch(cli: Cli) -> Result<(String, Value)> {
    let config = Config::from_env(PRODUCT);
    let paths = config.paths();
    let clock = SystemClock;

    match cli.command {
        Command::Session(args) => run_session(&paths, &clock, args.cmd),
        Command::Task(args) => run_task(&paths, &clock, args.cmd),
        Command::Context(args) => run_context(&paths, args.cmd),
        Command::Wave(args) => run_wave(&paths, &clock, args.cmd),
        Command::Project(args) => run_project(&paths, args.cmd),
        Command::Mailbox(args) => run_mailbox(&paths, &clock, args.cmd).await,
        Command::Workspace(args) => run_workspace(args.cmd).await,
        Command::Swarm(args) => run_swarm(&paths, &clock, args.cmd).await,
        Command::Cleanup(args) => {
            let predicate = SafetyPredicate::new(&config);
            run_cleanup(&paths, &clock, predicate, args.cmd)
        }
    }
}

// ---------------------------------------------------------------- session

#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub cmd: SessionCmd,
}

#[derive(Subcommand)]
pub enum SessionCmd {
    Init {
        session_id: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        working_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        max_workers: u32,
        #[arg(long, default_value_t = 5)]
        max_iterations: u32,
        #[arg(long)]
        skip_verify: bool,
        #[arg(long)]
        plan_only: bool,
        #[arg(long)]
        auto_mode: bool,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        resume: bool,
        #[arg(long)]
        use_worktree: bool,
    },
    Get {
        session_id: String,
        #[arg(long)]
        field: Option<String>,
    },
    Update {
        session_id: String,
        #[arg(long, value_parser = parse_phase)]
        phase: Option<Phase>,
        #[arg(long, value_parser = parse_exploration_stage)]
        exploration_stage: Option<ExplorationStage>,
        #[arg(long)]
        iteration: Option<u32>,
        #[arg(long)]
        plan_approved: bool,
    },
    Cancel {
        session_id: String,
    },
    Resume {
        session_id: String,
    },
    Evidence {
        session_id: String,
        #[arg(long = "type")]
        kind: String,
        /// A JSON object merged into the evidence record's detail map.
        #[arg(long)]
        detail: Option<String>,
    },
}

fn run_session(paths: &Paths, clock: &SystemClock, cmd: SessionCmd) -> Result<(String, Value)> {
    let store = SessionStore::new(paths, clock);
    match cmd {
        SessionCmd::Init {
            session_id,
            goal,
            working_dir,
            max_workers,
            max_iterations,
            skip_verify,
            plan_only,
            auto_mode,
            force,
            resume,
            use_worktree,
        } => {
            let options = SessionOptions {
                max_workers,
                max_iterations,
                skip_verify,
                plan_only,
                auto_mode,
                force,
                resume,
                use_worktree,
            };
            let session = store.init(&session_id, &goal, working_dir, options)?;
            Ok(("session initialized".into(), serde_json::to_value(session)?))
        }
        SessionCmd::Get { session_id, field } => match field {
            Some(field) => {
                let value = store.get_field(&session_id, &field)?;
                Ok((format!("{session_id}.{field}"), value))
            }
            None => {
                let session = store.get(&session_id)?;
                Ok(("session".into(), serde_json::to_value(session)?))
            }
        },
        SessionCmd::Update {
            session_id,
            phase,
            exploration_stage,
            iteration,
            plan_approved,
        } => {
            let patch = SessionPatch {
                phase,
                exploration_stage,
                iteration,
                plan_approved,
            };
            let session = store.update(&session_id, patch)?;
            Ok(("session updated".into(), serde_json::to_value(session)?))
        }
        SessionCmd::Cancel { session_id } => {
            let session = store.cancel(&session_id)?;
            Ok(("session cancelled".into(), serde_json::to_value(session)?))
        }
        SessionCmd::Resume { session_id } => {
            let session = store.resume(&session_id)?;
            Ok(("session resumed".into(), serde_json::to_value(session)?))
        }
        SessionCmd::Evidence { session_id, kind, detail } => {
            let mut record = EvidenceRecord::new(kind, clock.now());
            if let Some(detail) = detail {
                let parsed: Value = serde_json::from_str(&detail).context("--detail must be a JSON object")?;
                if let Value::Object(map) = parsed {
                    for (k, v) in map {
                        record = record.with_detail(k, v);
                    }
                } else {
                    return Err(anyhow!("--detail must be a JSON object"));
                }
            }
            let session = store.append_evidence(&session_id, record)?;
            Ok(("evidence appended".into(), serde_json::to_value(session)?))
        }
    }
}

// ------------------------------------------------------------------- task

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub cmd: TaskCmd,
}

#[derive(Subcommand)]
pub enum TaskCmd {
    Create {
        project: String,
        team: String,
        id: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long, value_parser = parse_complexity)]
        complexity: Option<Complexity>,
        #[arg(long = "blocked-by", value_delimiter = ',')]
        blocked_by: Vec<String>,
        #[arg(long = "criteria", value_delimiter = ',')]
        criteria: Vec<String>,
    },
    Get {
        project: String,
        team: String,
        id: String,
        #[arg(long)]
        field: Option<String>,
    },
    List {
        project: String,
        team: String,
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        available: bool,
    },
    Claim {
        project: String,
        team: String,
        id: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long = "strict-role")]
        strict_role: bool,
    },
    Update {
        project: String,
        team: String,
        id: String,
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        wave: Option<u32>,
        #[arg(long = "clear-wave")]
        clear_wave: bool,
    },
    Release {
        project: String,
        team: String,
        id: String,
    },
    Evidence {
        project: String,
        team: String,
        id: String,
        text: String,
    },
    Delete {
        project: String,
        team: String,
        id: String,
        #[arg(long)]
        force: bool,
    },
}

fn run_task(paths: &Paths, clock: &SystemClock, cmd: TaskCmd) -> Result<(String, Value)> {
    let store = TaskStore::new(paths, clock);
    match cmd {
        TaskCmd::Create {
            project,
            team,
            id,
            subject,
            description,
            role,
            domain,
            complexity,
            blocked_by,
            criteria,
        } => {
            let fields = NewTask {
                subject,
                description,
                role,
                domain,
                complexity,
                blocked_by: blocked_by.into_iter().filter(|s| !s.is_empty()).collect(),
                criteria: criteria.into_iter().filter(|s| !s.is_empty()).collect(),
            };
            let task = store.create(&project, &team, &id, fields)?;
            Ok(("task created".into(), serde_json::to_value(task)?))
        }
        TaskCmd::Get { project, team, id, field } => match field {
            Some(field) => {
                let value = store.get_field(&project, &team, &id, &field)?;
                Ok((format!("{id}.{field}"), value))
            }
            None => {
                let task = store.get(&project, &team, &id)?;
                Ok(("task".into(), serde_json::to_value(task)?))
            }
        },
        TaskCmd::List {
            project,
            team,
            status,
            role,
            available,
        } => {
            let filter = TaskFilter { status, role, available };
            let tasks = store.list(&project, &team, &filter)?;
            let count = tasks.len();
            Ok((format!("{count} task(s)"), serde_json::to_value(tasks)?))
        }
        TaskCmd::Claim {
            project,
            team,
            id,
            owner,
            role,
            strict_role,
        } => {
            let task = store.claim(&project, &team, &id, &owner, role.as_deref(), strict_role)?;
            Ok(("task claimed".into(), serde_json::to_value(task)?))
        }
        TaskCmd::Update {
            project,
            team,
            id,
            status,
            title,
            description,
            wave,
            clear_wave,
        } => {
            let patch = TaskPatch {
                status,
                title,
                description,
                wave: if clear_wave { Some(None) } else { wave.map(Some) },
            };
            let task = store.update(&project, &team, &id, patch)?;
            Ok(("task updated".into(), serde_json::to_value(task)?))
        }
        TaskCmd::Release { project, team, id } => {
            let task = store.release(&project, &team, &id)?;
            Ok(("task released".into(), serde_json::to_value(task)?))
        }
        TaskCmd::Evidence { project, team, id, text } => {
            let task = store.append_evidence(&project, &team, &id, &text)?;
            Ok(("evidence appended".into(), serde_json::to_value(task)?))
        }
        TaskCmd::Delete { project, team, id, force } => {
            let report = store.delete(&project, &team, &id, force)?;
            Ok(("task deleted".into(), serde_json::to_value(report)?))
        }
    }
}

// ---------------------------------------------------------------- context

#[derive(Args)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub cmd: ContextCmd,
}

#[derive(Subcommand)]
pub enum ContextCmd {
    Get {
        session_id: String,
    },
    Init {
        session_id: String,
        #[arg(long = "expected", value_delimiter = ',')]
        expected_explorers: Vec<String>,
    },
    AddExplorer {
        session_id: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        hint: Option<String>,
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long = "key-files", value_delimiter = ',')]
        key_files: Vec<String>,
        #[arg(long = "patterns", value_delimiter = ',')]
        patterns: Vec<String>,
        #[arg(long = "constraints", value_delimiter = ',')]
        constraints: Vec<String>,
    },
}

fn run_context(paths: &Paths, cmd: ContextCmd) -> Result<(String, Value)> {
    let store = ContextStore::new(paths);
    match cmd {
        ContextCmd::Get { session_id } => {
            let ctx = store.get(&session_id)?;
            Ok(("context".into(), serde_json::to_value(ctx)?))
        }
        ContextCmd::Init {
            session_id,
            expected_explorers,
        } => {
            let ctx = store.init_context(&session_id, expected_explorers)?;
            Ok(("context initialized".into(), serde_json::to_value(ctx)?))
        }
        ContextCmd::AddExplorer {
            session_id,
            id,
            hint,
            file,
            summary,
            key_files,
            patterns,
            constraints,
        } => {
            let explorer = Explorer { id, hint, file, summary };
            let ctx = store.add_explorer(&session_id, explorer, key_files, patterns, constraints)?;
            Ok(("explorer recorded".into(), serde_json::to_value(ctx)?))
        }
    }
}

// ------------------------------------------------------------------- wave

#[derive(Args)]
pub struct WaveArgs {
    #[command(subcommand)]
    pub cmd: WaveCmd,
}

#[derive(Subcommand)]
pub enum WaveCmd {
    Get {
        project: String,
        team: String,
    },
    Plan {
        project: String,
        team: String,
    },
    SetStatus {
        project: String,
        team: String,
        #[arg(long)]
        wave: u32,
        #[arg(long, value_parser = parse_wave_status)]
        status: WaveStatus,
    },
}

fn run_wave(paths: &Paths, clock: &SystemClock, cmd: WaveCmd) -> Result<(String, Value)> {
    let waves = WaveStore::new(paths, clock);
    match cmd {
        WaveCmd::Get { project, team } => {
            let plan = waves.get(&project, &team)?;
            Ok(("wave plan".into(), serde_json::to_value(plan)?))
        }
        WaveCmd::Plan { project, team } => {
            let tasks = TaskStore::new(paths, clock).list(&project, &team, &TaskFilter::default())?;
            let plan = waves.plan(&project, &team, &tasks)?;
            Ok(("wave plan computed".into(), serde_json::to_value(plan)?))
        }
        WaveCmd::SetStatus {
            project,
            team,
            wave,
            status,
        } => {
            let plan = waves.set_status(&project, &team, wave, status)?;
            Ok(("wave status updated".into(), serde_json::to_value(plan)?))
        }
    }
}

// ---------------------------------------------------------------- project

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub cmd: ProjectCmd,
}

#[derive(Subcommand)]
pub enum ProjectCmd {
    Status {
        project: String,
        team: String,
        #[arg(long)]
        verbose: bool,
    },
    Get {
        project: String,
        team: String,
        #[arg(long)]
        field: String,
    },
}

fn run_project(paths: &Paths, cmd: ProjectCmd) -> Result<(String, Value)> {
    let view = ProjectView::new(paths);
    match cmd {
        ProjectCmd::Status { project, team, verbose } => {
            let status = view.status(&project, &team, verbose)?;
            Ok(("project status".into(), serde_json::to_value(status)?))
        }
        ProjectCmd::Get { project, team, field } => {
            let value = view.get_field(&project, &team, &field)?;
            Ok((format!("{project}/{team}.{field}"), value))
        }
    }
}

// --------------------------------------------------------------- mailbox

#[derive(Args)]
pub struct MailboxArgs {
    #[command(subcommand)]
    pub cmd: MailboxCmd,
}

#[derive(Subcommand)]
pub enum MailboxCmd {
    Send {
        project: String,
        team: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long = "type", value_parser = parse_message_type)]
        kind: MessageType,
        /// Raw JSON payload; defaults to `null`.
        #[arg(long, default_value = "null")]
        payload: String,
    },
    Peek {
        project: String,
        team: String,
        recipient: String,
        #[arg(long = "type", value_parser = parse_message_type)]
        kind: Option<MessageType>,
    },
    MarkRead {
        project: String,
        team: String,
        recipient: String,
        message_id: String,
    },
    Poll {
        project: String,
        team: String,
        recipient: String,
        #[arg(long = "type", value_parser = parse_message_type)]
        kind: Option<MessageType>,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

async fn run_mailbox(paths: &Paths, clock: &SystemClock, cmd: MailboxCmd) -> Result<(String, Value)> {
    let mailbox = Mailbox::new(paths, clock);
    match cmd {
        MailboxCmd::Send {
            project,
            team,
            from,
            to,
            kind,
            payload,
        } => {
            let payload: Value = serde_json::from_str(&payload).context("--payload must be valid JSON")?;
            let message = mailbox.send(&project, &team, &from, &to, kind, payload)?;
            Ok(("message sent".into(), serde_json::to_value(message)?))
        }
        MailboxCmd::Peek {
            project,
            team,
            recipient,
            kind,
        } => {
            let messages = mailbox.peek(&project, &team, &recipient, kind)?;
            let count = messages.len();
            Ok((format!("{count} unread"), serde_json::to_value(messages)?))
        }
        MailboxCmd::MarkRead {
            project,
            team,
            recipient,
            message_id,
        } => {
            mailbox.mark_read(&project, &team, &recipient, &message_id)?;
            Ok(("message marked read".into(), Value::Null))
        }
        MailboxCmd::Poll {
            project,
            team,
            recipient,
            kind,
            timeout_ms,
        } => {
            let messages = mailbox
                .poll(&project, &team, &recipient, kind, Duration::from_millis(timeout_ms))
                .await?;
            let count = messages.len();
            Ok((format!("{count} message(s)"), serde_json::to_value(messages)?))
        }
    }
}

// ------------------------------------------------------------- workspace

#[derive(Args)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub cmd: WorkspaceCmd,
}

#[derive(Subcommand)]
pub enum WorkspaceCmd {
    EnsureIsolated {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        worker: String,
        #[arg(long)]
        target: PathBuf,
    },
    Teardown {
        #[arg(long)]
        target: PathBuf,
    },
    Sync {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
    },
    Merge {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        worker: String,
    },
}

async fn run_workspace(cmd: WorkspaceCmd) -> Result<(String, Value)> {
    let orchestrator = WorkspaceOrchestrator::new(GitWorktreeProvider::new());
    match cmd {
        WorkspaceCmd::EnsureIsolated { source, worker, target } => {
            let path = orchestrator.ensure_isolated(&source, &worker, &target).await?;
            Ok(("workspace isolated".into(), serde_json::json!({ "path": path })))
        }
        WorkspaceCmd::Teardown { target } => {
            orchestrator.teardown(&target).await?;
            Ok(("workspace removed".into(), Value::Null))
        }
        WorkspaceCmd::Sync { source, target } => {
            orchestrator.sync(&source, &target).await?;
            Ok(("workspace synced".into(), Value::Null))
        }
        WorkspaceCmd::Merge { source, target, worker } => {
            let conflict = orchestrator.merge(&source, &target, &worker).await?;
            match conflict {
                None => Ok(("merged cleanly".into(), serde_json::json!({ "status": "merged" }))),
                Some(record) => Ok((
                    "merge conflict".into(),
                    serde_json::json!({
                        "status": "conflict",
                        "conflict_worker": record.worker,
                        "conflict_files": record.files,
                    }),
                )),
            }
        }
    }
}

// ----------------------------------------------------------------- swarm

#[derive(Args)]
pub struct SwarmArgs {
    #[command(subcommand)]
    pub cmd: SwarmCmd,
}

/// `role:count` pair, e.g. `coder:2`.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub role: String,
    pub count: u32,
}

fn parse_role_spec(s: &str) -> std::result::Result<RoleSpec, String> {
    let (role, count) = s
        .split_once(':')
        .ok_or_else(|| format!("expected role:count, got {s}"))?;
    let count: u32 = count.parse().map_err(|_| format!("invalid count in {s}"))?;
    Ok(RoleSpec { role: role.to_string(), count })
}

#[derive(Subcommand)]
pub enum SwarmCmd {
    Spawn {
        project: String,
        team: String,
        #[arg(long = "session")]
        session_name: String,
        #[arg(long = "source-dir")]
        source_dir: PathBuf,
        #[arg(long = "role", value_parser = parse_role_spec, required = true)]
        roles: Vec<RoleSpec>,
        #[arg(long = "use-worktree")]
        use_worktree: bool,
    },
    Status {
        project: String,
        team: String,
    },
    Stop {
        project: String,
        team: String,
        #[arg(long, conflicts_with = "all")]
        worker: Option<String>,
        #[arg(long)]
        all: bool,
    },
    CheckWave {
        project: String,
        team: String,
    },
}

async fn run_swarm(paths: &Paths, clock: &SystemClock, cmd: SwarmCmd) -> Result<(String, Value)> {
    let pane_host = TmuxPaneHost::new();
    let workspace = WorkspaceOrchestrator::new(GitWorktreeProvider::new());
    let controller = SwarmController::new(paths, clock, &pane_host, &workspace);

    match cmd {
        SwarmCmd::Spawn {
            project,
            team,
            session_name,
            source_dir,
            roles,
            use_worktree,
        } => {
            let roles: Vec<RoleRequest> = roles
                .into_iter()
                .map(|r| RoleRequest { role: r.role, count: r.count })
                .collect();
            let plan = controller
                .spawn(&project, &team, &session_name, &source_dir, &roles, use_worktree)
                .await?;
            Ok(("swarm spawned".into(), serde_json::to_value(plan)?))
        }
        SwarmCmd::Status { project, team } => {
            let workers = controller.status(&project, &team)?;
            let count = workers.len();
            Ok((format!("{count} worker(s)"), serde_json::to_value(workers)?))
        }
        SwarmCmd::Stop { project, team, worker, all } => {
            let target = match (worker, all) {
                (Some(w), _) => StopTarget::Worker(w),
                (None, true) => StopTarget::All,
                (None, false) => return Err(anyhow!("specify --worker <id> or --all")),
            };
            controller.stop(&project, &team, target)?;
            Ok(("swarm stop signalled".into(), Value::Null))
        }
        SwarmCmd::CheckWave { project, team } => {
            let task_store = TaskStore::new(paths, clock);
            let wave_store = WaveStore::new(paths, clock);
            let mailbox = Mailbox::new(paths, clock);
            let advanced = controller
                .check_wave_completion(&project, &team, &task_store, &wave_store, &mailbox)
                .await?;
            Ok((
                if advanced { "wave advanced".into() } else { "wave not yet complete".into() },
                serde_json::json!({ "advanced": advanced }),
            ))
        }
    }
}

// --------------------------------------------------------------- cleanup

#[derive(Args)]
pub struct CleanupArgs {
    #[command(subcommand)]
    pub cmd: CleanupCmd,
}

#[derive(Subcommand)]
pub enum CleanupCmd {
    Run {
        #[arg(long = "older-than", conflicts_with_all = ["completed", "all"])]
        older_than_days: Option<i64>,
        #[arg(long, conflicts_with = "all")]
        completed: bool,
        #[arg(long)]
        all: bool,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}

fn run_cleanup(paths: &Paths, clock: &SystemClock, predicate: SafetyPredicate, cmd: CleanupCmd) -> Result<(String, Value)> {
    let CleanupCmd::Run {
        older_than_days,
        completed,
        all,
        dry_run,
    } = cmd;

    let mode = match (older_than_days, completed, all) {
        (Some(days), false, false) => CleanupMode::OlderThan(chrono::Duration::days(days)),
        (None, true, false) => CleanupMode::Completed,
        (None, false, true) => CleanupMode::All,
        _ => return Err(anyhow!("specify exactly one of --older-than, --completed, --all")),
    };

    let cleanup = Cleanup::new(paths, predicate, clock);
    let report = cleanup.run(mode, dry_run)?;
    Ok(("cleanup complete".into(), serde_json::to_value(report)?))
}

// ------------------------------------------------------------ value_parsers

fn parse_phase(s: &str) -> std::result::Result<Phase, String> {
    match s.to_ascii_lowercase().as_str() {
        "planning" => Ok(Phase::Planning),
        "execution" => Ok(Phase::Execution),
        "verification" => Ok(Phase::Verification),
        "complete" => Ok(Phase::Complete),
        "cancelled" | "canceled" => Ok(Phase::Cancelled),
        "failed" => Ok(Phase::Failed),
        other => Err(format!("unknown phase: {other}")),
    }
}

fn parse_exploration_stage(s: &str) -> std::result::Result<ExplorationStage, String> {
    match s.to_ascii_lowercase().as_str() {
        "not_started" => Ok(ExplorationStage::NotStarted),
        "overview" => Ok(ExplorationStage::Overview),
        "analyzing" => Ok(ExplorationStage::Analyzing),
        "targeted" => Ok(ExplorationStage::Targeted),
        "complete" => Ok(ExplorationStage::Complete),
        other => Err(format!("unknown exploration stage: {other}")),
    }
}

fn parse_task_status(s: &str) -> std::result::Result<TaskStatus, String> {
    match s.to_ascii_lowercase().as_str() {
        "open" => Ok(TaskStatus::Open),
        "in_progress" => Ok(TaskStatus::InProgress),
        "resolved" => Ok(TaskStatus::Resolved),
        "failed" => Ok(TaskStatus::Failed),
        "pending" => Ok(TaskStatus::Pending),
        other => Err(format!("unknown task status: {other}")),
    }
}

fn parse_complexity(s: &str) -> std::result::Result<Complexity, String> {
    match s.to_ascii_lowercase().as_str() {
        "simple" => Ok(Complexity::Simple),
        "standard" => Ok(Complexity::Standard),
        "complex" => Ok(Complexity::Complex),
        other => Err(format!("unknown complexity: {other}")),
    }
}

fn parse_wave_status(s: &str) -> std::result::Result<WaveStatus, String> {
    match s.to_ascii_lowercase().as_str() {
        "planning" => Ok(WaveStatus::Planning),
        "in_progress" => Ok(WaveStatus::InProgress),
        "completed" => Ok(WaveStatus::Completed),
        "verified" => Ok(WaveStatus::Verified),
        other => Err(format!("unknown wave status: {other}")),
    }
}

fn parse_message_type(s: &str) -> std::result::Result<MessageType, String> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Ok(MessageType::Text),
        "idle_notification" => Ok(MessageType::IdleNotification),
        "shutdown_request" => Ok(MessageType::ShutdownRequest),
        "task_assignment" => Ok(MessageType::TaskAssignment),
        "status_query" => Ok(MessageType::StatusQuery),
        "status_reply" => Ok(MessageType::StatusReply),
        other => Err(format!("unknown message type: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_phase_accepts_known_values_case_insensitively() {
        assert!(matches!(parse_phase("Planning"), Ok(Phase::Planning)));
        assert!(matches!(parse_phase("CANCELLED"), Ok(Phase::Cancelled)));
        assert!(parse_phase("bogus").is_err());
    }

    #[test]
    fn parse_task_status_rejects_unknown() {
        assert!(matches!(parse_task_status("open"), Ok(TaskStatus::Open)));
        assert!(parse_task_status("nope").is_err());
    }

    #[test]
    fn parse_role_spec_splits_on_colon() {
        let spec = parse_role_spec("coder:3").unwrap();
        assert_eq!(spec.role, "coder");
        assert_eq!(spec.count, 3);

        assert!(parse_role_spec("coder").is_err());
        assert!(parse_role_spec("coder:x").is_err());
    }

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::parse_from([
            "orc",
            "--format",
            "json",
            "task",
            "claim",
            "proj",
            "team",
            "t1",
            "--owner",
            "w1",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Task(args) => match args.cmd {
                TaskCmd::Claim { id, owner, .. } => {
                    assert_eq!(id, "t1");
                    assert_eq!(owner, "w1");
                }
                _ => panic!("expected Claim"),
            },
            _ => panic!("expected Task"),
        }
    }
}
