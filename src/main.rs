use anyhow::{Context, Result};
use envswitch::config::{self, Config};
use envswitch::router::{Intent, Reply, Router};
use envswitch::swap::SwapOutcome;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "commands: projects | project:<id> | env:<id>:<file> | \
start:<id> | stop:<id> | restart:<id> | print:<id> | status:<id> | quit";

fn init_logging(debug: bool) -> Result<()> {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        let path = config::log_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log dir for {}", path.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("error"))
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;
    init_logging(cfg.debug)?;
    info!(
        project_root = %cfg.project_root.display(),
        env_root = %cfg.env_root.display(),
        docker_bin = %cfg.docker_bin,
        "envswitch starting"
    );

    let router = Router::new(&cfg);

    // One intent per line on stdin; structured replies rendered to stdout.
    // Any interactive front end (chat bot, ssh session, test harness) can
    // sit on the other side of this pipe.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        match Intent::parse(line) {
            Some(intent) => println!("{}", render(&router.dispatch(intent).await)),
            None => println!("{USAGE}"),
        }
    }
    Ok(())
}

fn render(reply: &Reply) -> String {
    match reply {
        Reply::Projects(ids) => {
            if ids.is_empty() {
                "No projects dir found.".to_string()
            } else {
                ids.join("\n")
            }
        }
        Reply::Candidates { project, names } => {
            if names.is_empty() {
                format!("No env files found for {project}.")
            } else {
                names.join("\n")
            }
        }
        Reply::EnvText { project, text } => {
            format!("Actual env file for {project}:\n\n{text}")
        }
        Reply::Status { project, services } => {
            if services.is_empty() {
                format!("No running services for {project}.")
            } else {
                services
                    .iter()
                    .map(|s| format!("{}\t{}\t{}", s.name, s.state, s.status))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Reply::Verdict { action, result } => {
            if result.success {
                let state = match *action {
                    "start" => "up",
                    "stop" => "down",
                    _ => "restarted",
                };
                format!("Operation successful. Docker container is {state}.")
            } else {
                format!("Failed to {action} Docker container.\n{}", result.output)
            }
        }
        Reply::SwapReport { outcome, .. } => match outcome {
            SwapOutcome::Completed { .. } => {
                "Operation successful. Docker container is up.".to_string()
            }
            SwapOutcome::StopFailed(res) => {
                format!("Failed to stop Docker container.\n{}", res.output)
            }
            SwapOutcome::StartFailed { start, .. } => {
                format!("Failed to start Docker container.\n{}", start.output)
            }
        },
        Reply::Failure(message) => format!("Operation failed: {message}"),
    }
}
