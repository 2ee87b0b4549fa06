mod calc;
mod config;
mod db;
mod filter;
mod ipc;
mod ledger;
mod model;
mod roster;
mod seed;
mod session;
mod store;
mod timetable;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "attendanced")]
#[command(version)]
#[command(about = "Attendance tracking sidecar speaking JSON lines over stdin/stdout")]
struct Args {
    /// Open this workspace directory on startup
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to attendanced.toml inside the workspace)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the seed used to generate attendance history
    #[arg(long)]
    seed: Option<u64>,
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("attendanced=info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> DaemonConfig {
    let path = args
        .config
        .clone()
        .or_else(|| args.workspace.as_deref().map(DaemonConfig::workspace_file));
    let mut config = path.map(|p| DaemonConfig::load(&p)).unwrap_or_default();
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let config = load_config(&args);
    tracing::info!(seed = config.seed, "starting attendanced");

    let mut state = ipc::AppState::new(config);
    if let Some(ws) = &args.workspace {
        state.open_workspace(ws)?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparsable request line");
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
