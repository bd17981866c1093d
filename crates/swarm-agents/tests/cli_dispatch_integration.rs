//! End-to-end exercise of the CLI command surface: parse argv, dispatch
//! into the real stores, and read the results back. Single test function
//! per `ORC_STORE_ROOT` mutation to avoid racing other tests over the
//! process environment.

use clap::Parser;
use swarm_agents::cli::{dispatch, Cli};
use swarm_agents::output::{emit_err, emit_ok, OutputFormat};

#[tokio::test]
async fn session_and_task_lifecycle_round_trips_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(orc_core::paths::ROOT_ENV_VAR, dir.path());

    let working_dir = dir.path().join("work");
    std::fs::create_dir_all(&working_dir).unwrap();

    let init = Cli::parse_from([
        "orc",
        "session",
        "init",
        "sess-1",
        "--goal",
        "ship the feature",
        "--working-dir",
        working_dir.to_str().unwrap(),
    ]);
    let (message, _) = dispatch(init).await.expect("session init should succeed");
    assert_eq!(message, "session initialized");

    let create = Cli::parse_from([
        "orc", "task", "create", "proj", "team", "t1", "--subject", "do the thing",
    ]);
    let (message, data) = dispatch(create).await.expect("task create should succeed");
    assert_eq!(message, "task created");
    assert_eq!(data["status"], "open");

    let claim = Cli::parse_from([
        "orc", "task", "claim", "proj", "team", "t1", "--owner", "worker-a",
    ]);
    let (_, data) = dispatch(claim).await.expect("task claim should succeed");
    assert_eq!(data["claimed_by"], "worker-a");
    assert_eq!(data["status"], "in_progress");

    // Claiming again with a different owner is a domain error, not a panic,
    // and maps to exit code 1 through the shared output path.
    let claim_again = Cli::parse_from([
        "orc", "task", "claim", "proj", "team", "t1", "--owner", "worker-b",
    ]);
    let err = dispatch(claim_again).await.unwrap_err();
    let code = emit_err(&err, OutputFormat::Json);
    assert_eq!(code, 1);

    let status = Cli::parse_from(["orc", "project", "status", "proj", "team"]);
    let (_, data) = dispatch(status).await.expect("project status should succeed");
    assert_eq!(data["stats"]["total"], 1);
    assert_eq!(data["stats"]["in_progress"], 1);

    std::env::remove_var(orc_core::paths::ROOT_ENV_VAR);
}

#[test]
fn emit_ok_text_mode_does_not_panic_on_null_data() {
    let code = emit_ok("no-op", serde_json::Value::Null, OutputFormat::Text);
    assert_eq!(code, 0);
}
