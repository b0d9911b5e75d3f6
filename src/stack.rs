use crate::error::{Error, Result};
use crate::registry::Project;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Outcome of a single compose invocation. Ephemeral; relayed to the
/// operator, never persisted.
#[derive(Debug, Clone)]
pub struct StackOpResult {
    pub success: bool,
    pub output: String,
}

/// One service row from `docker compose ps --format json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// Issues lifecycle commands against a project's compose file by shelling
/// out to the docker CLI. Exit code 0 is success; anything else is a
/// failure carrying the captured stderr. A missing compose file is not
/// distinguished from any other command failure.
#[derive(Debug, Clone)]
pub struct StackController {
    docker_bin: String,
}

impl StackController {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        StackController {
            docker_bin: docker_bin.into(),
        }
    }

    /// `up -d`. On success, stack logs are captured best-effort (never
    /// affecting the verdict).
    pub async fn up(&self, project: &Project) -> StackOpResult {
        let res = self.compose(project, &["up", "-d"]).await;
        if res.success {
            self.capture_logs(project).await;
        }
        res
    }

    /// `down`.
    pub async fn down(&self, project: &Project) -> StackOpResult {
        self.compose(project, &["down"]).await
    }

    /// `restart` in place; same best-effort log capture as `up`.
    pub async fn restart(&self, project: &Project) -> StackOpResult {
        let res = self.compose(project, &["restart"]).await;
        if res.success {
            self.capture_logs(project).await;
        }
        res
    }

    /// Captured (non-following) stack logs.
    pub async fn logs(&self, project: &Project) -> StackOpResult {
        self.compose(project, &["logs"]).await
    }

    /// `ps --format json` — one JSON object per line.
    pub async fn status(&self, project: &Project) -> Result<Vec<ServiceStatus>> {
        let res = self.compose(project, &["ps", "--format", "json"]).await;
        if !res.success {
            return Err(Error::StackCommand(res.output));
        }
        Ok(parse_ps_lines(&res.output))
    }

    async fn compose(&self, project: &Project, verb: &[&str]) -> StackOpResult {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.arg("compose")
            .arg("--file")
            .arg(project.compose_file())
            .arg("--project-directory")
            .arg(&project.dir)
            .args(verb);

        info!(project = %project.id, ?verb, "compose command");
        match cmd.output().await {
            Ok(out) => {
                let success = out.status.success();
                let stdout = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
                let stderr = String::from_utf8_lossy(&out.stderr).trim_end().to_string();
                if success {
                    StackOpResult {
                        success,
                        output: stdout,
                    }
                } else {
                    error!(project = %project.id, ?verb, code = ?out.status.code(), %stderr, "compose command failed");
                    StackOpResult {
                        success,
                        output: if stderr.is_empty() { stdout } else { stderr },
                    }
                }
            }
            Err(e) => {
                error!(project = %project.id, ?verb, error = %e, "failed to spawn compose");
                StackOpResult {
                    success: false,
                    output: format!("failed to run {}: {e}", self.docker_bin),
                }
            }
        }
    }

    async fn capture_logs(&self, project: &Project) {
        let res = self.logs(project).await;
        if res.success {
            info!(project = %project.id, logs = %res.output, "stack logs after start");
        } else {
            warn!(project = %project.id, "could not capture stack logs");
        }
    }
}

fn parse_ps_lines(out: &str) -> Vec<ServiceStatus> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| serde_json::from_str::<ServiceStatus>(l).ok())
        .collect()
}
