use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub env_root: PathBuf,
    pub docker_bin: String,
    pub debug: bool,
}

pub fn resolve_docker_binary() -> String {
    std::env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string())
}

fn parse_debug(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true") | Some("True") | Some("1"))
}

impl Config {
    /// Read configuration from the process environment. Callers are expected
    /// to have loaded `.env` (dotenvy) beforehand.
    pub fn from_env() -> Result<Self> {
        let project_root = std::env::var("PROJECT_DIR")
            .context("PROJECT_DIR is not set (directory containing one subdirectory per project)")?;
        let env_root = std::env::var("ENV_DIR")
            .context("ENV_DIR is not set (directory containing per-project env candidates)")?;
        let debug = parse_debug(std::env::var("DEBUG").ok().as_deref());

        Ok(Config {
            project_root: PathBuf::from(project_root),
            env_root: PathBuf::from(env_root),
            docker_bin: resolve_docker_binary(),
            debug,
        })
    }
}

/// Log file for non-debug runs, named after the launch time so restarts
/// never clobber an earlier log.
pub fn log_file_path() -> PathBuf {
    let stamp = Local::now().format("%d-%m-%Y_%H%M");
    PathBuf::from("data").join(format!("envswitch_{stamp}.log"))
}
