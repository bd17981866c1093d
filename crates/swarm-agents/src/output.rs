//! Stable-prefix / `--format json` diagnostic output shared by every
//! subcommand: `OK:` lines on success, `Error:` on failure, exit code 0/1/2.

use orc_core::cleanup::CleanupError;
use orc_core::context_store::ContextError;
use orc_core::mailbox::MailboxError;
use orc_core::project_view::ProjectViewError;
use orc_core::session_store::SessionError;
use orc_core::store::StoreError;
use orc_core::task_store::TaskError;
use orc_core::wave::WaveError;
use orc_core::workspace::WorkspaceError;

use crate::pane_host::PaneHostError;
use crate::swarm_controller::SwarmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a success result and return the process exit code (always 0).
pub fn emit_ok(message: &str, value: serde_json::Value, format: OutputFormat) -> i32 {
    match format {
        OutputFormat::Text => println!("OK: {message}"),
        OutputFormat::Json => {
            let envelope = serde_json::json!({ "ok": true, "message": message, "data": value });
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
    }
    0
}

/// Print a failure diagnostic to stderr and return the process exit code.
pub fn emit_err(err: &anyhow::Error, format: OutputFormat) -> i32 {
    let code = exit_code(err);
    match format {
        OutputFormat::Text => eprintln!("Error: {err}"),
        OutputFormat::Json => {
            let envelope = serde_json::json!({ "ok": false, "error": err.to_string() });
            eprintln!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
    }
    code
}

/// Map a component error into the exit-code taxonomy: 1 for every
/// validation/domain error, >=2 for corrupt documents and external
/// (pane host / workspace provider) collaborator failures.
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<StoreError>() {
        return match e {
            StoreError::Corrupt { .. } => 2,
            _ => 1,
        };
    }
    if err.downcast_ref::<SessionError>().is_some()
        || err.downcast_ref::<TaskError>().is_some()
        || err.downcast_ref::<ContextError>().is_some()
        || err.downcast_ref::<ProjectViewError>().is_some()
        || err.downcast_ref::<MailboxError>().is_some()
        || err.downcast_ref::<CleanupError>().is_some()
    {
        return 1;
    }
    if let Some(e) = err.downcast_ref::<WaveError>() {
        return match e {
            WaveError::CycleDetected(_) => 1,
            _ => 1,
        };
    }
    if err.downcast_ref::<WorkspaceError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<PaneHostError>().is_some() {
        return 2;
    }
    if let Some(e) = err.downcast_ref::<SwarmError>() {
        return match e {
            SwarmError::PaneHost(_) => 2,
            _ => 1,
        };
    }
    2
}
