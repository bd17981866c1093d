use std::process::ExitCode;

use clap::Parser;
use swarm_agents::cli::{dispatch, Cli};
use swarm_agents::output::{emit_err, emit_ok};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let code = match dispatch(cli).await {
        Ok((message, data)) => emit_ok(&message, data, format),
        Err(err) => emit_err(&err, format),
    };

    ExitCode::from(code as u8)
}
