use crate::config::Config;
use crate::error::Error;
use crate::redact;
use crate::registry::ProjectRegistry;
use crate::stack::{ServiceStatus, StackController, StackOpResult};
use crate::swap::{Orchestrator, SwapOutcome};
use tracing::warn;

/// Placeholder rendered when a project has no active env file.
pub const NO_ENV_PLACEHOLDER: &str = "No env file found.";

/// Operator intent, decoded exactly once at the transport boundary.
/// Identifiers are plain strings previously obtained from a `list*` reply;
/// the router re-checks existence only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ListProjects,
    ListCandidates { project: String },
    Swap { project: String, candidate: String },
    Start { project: String },
    Stop { project: String },
    Restart { project: String },
    ShowEnv { project: String },
    Status { project: String },
}

impl Intent {
    /// Decode a wire payload. The format mirrors the callback payloads of
    /// the chat front end: `projects`, `project:<id>`, `env:<id>:<file>`,
    /// `start:<id>`, `stop:<id>`, `restart:<id>`, `print:<id>`,
    /// `status:<id>`.
    pub fn parse(payload: &str) -> Option<Intent> {
        let payload = payload.trim();
        if payload == "projects" {
            return Some(Intent::ListProjects);
        }
        let (verb, rest) = payload.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        match verb {
            "project" => Some(Intent::ListCandidates {
                project: rest.to_string(),
            }),
            "env" => {
                let (project, candidate) = rest.split_once(':')?;
                if project.is_empty() || candidate.is_empty() {
                    return None;
                }
                Some(Intent::Swap {
                    project: project.to_string(),
                    candidate: candidate.to_string(),
                })
            }
            "start" => Some(Intent::Start {
                project: rest.to_string(),
            }),
            "stop" => Some(Intent::Stop {
                project: rest.to_string(),
            }),
            "restart" => Some(Intent::Restart {
                project: rest.to_string(),
            }),
            "print" => Some(Intent::ShowEnv {
                project: rest.to_string(),
            }),
            "status" => Some(Intent::Status {
                project: rest.to_string(),
            }),
            _ => None,
        }
    }
}

/// Structured result of a dispatched intent. The transport renders these;
/// the only prose the core contributes is the captured subprocess output.
#[derive(Debug)]
pub enum Reply {
    Projects(Vec<String>),
    Candidates {
        project: String,
        names: Vec<String>,
    },
    EnvText {
        project: String,
        text: String,
    },
    Status {
        project: String,
        services: Vec<ServiceStatus>,
    },
    Verdict {
        action: &'static str,
        result: StackOpResult,
    },
    SwapReport {
        project: String,
        candidate: String,
        outcome: SwapOutcome,
    },
    /// Recovered error; the caller stays alive and renders the message.
    Failure(String),
}

/// Receives decoded intents and drives the registry, redactor, controller
/// and orchestrator. Recoverable errors (missing roots, missing env file)
/// become placeholder replies rather than crashes.
pub struct Router {
    registry: ProjectRegistry,
    stack: StackController,
    orchestrator: Orchestrator,
}

impl Router {
    pub fn new(cfg: &Config) -> Self {
        let stack = StackController::new(cfg.docker_bin.clone());
        Router {
            registry: ProjectRegistry::new(&cfg.project_root, &cfg.env_root),
            orchestrator: Orchestrator::new(stack.clone()),
            stack,
        }
    }

    pub async fn dispatch(&self, intent: Intent) -> Reply {
        match intent {
            Intent::ListProjects => match self.registry.list_projects() {
                Ok(projects) => Reply::Projects(projects.into_iter().map(|p| p.id).collect()),
                Err(Error::DirectoryNotFound(dir)) => {
                    warn!(dir = %dir.display(), "project root missing");
                    Reply::Projects(Vec::new())
                }
                Err(e) => Reply::Failure(e.to_string()),
            },

            Intent::ListCandidates { project } => match self
                .registry
                .find_project(&project)
                .and_then(|p| self.registry.list_candidates(&p))
            {
                Ok(candidates) => Reply::Candidates {
                    project,
                    names: candidates.into_iter().map(|c| c.name).collect(),
                },
                Err(Error::DirectoryNotFound(dir)) => {
                    warn!(dir = %dir.display(), "no env candidates");
                    Reply::Candidates {
                        project,
                        names: Vec::new(),
                    }
                }
                Err(e) => Reply::Failure(e.to_string()),
            },

            Intent::Swap { project, candidate } => {
                let p = match self.registry.find_project(&project) {
                    Ok(p) => p,
                    Err(e) => return Reply::Failure(e.to_string()),
                };
                let c = self.registry.candidate(&p, &candidate);
                match self.orchestrator.swap(&p, &c).await {
                    Ok(outcome) => Reply::SwapReport {
                        project,
                        candidate,
                        outcome,
                    },
                    // FilesystemOp: the sequence aborted between stop and
                    // start; the message carries the failed action + path.
                    Err(e) => Reply::Failure(e.to_string()),
                }
            }

            Intent::Start { project } => self.lifecycle(project, "start").await,
            Intent::Stop { project } => self.lifecycle(project, "stop").await,
            Intent::Restart { project } => self.lifecycle(project, "restart").await,

            Intent::ShowEnv { project } => {
                let p = match self.registry.find_project(&project) {
                    Ok(p) => p,
                    Err(e) => return Reply::Failure(e.to_string()),
                };
                match redact::read_masked(&p) {
                    Ok(text) => Reply::EnvText { project, text },
                    Err(Error::EnvFileNotFound(_)) => Reply::EnvText {
                        project,
                        text: NO_ENV_PLACEHOLDER.to_string(),
                    },
                    Err(e) => Reply::Failure(e.to_string()),
                }
            }

            Intent::Status { project } => {
                let p = match self.registry.find_project(&project) {
                    Ok(p) => p,
                    Err(e) => return Reply::Failure(e.to_string()),
                };
                match self.stack.status(&p).await {
                    Ok(services) => Reply::Status { project, services },
                    Err(e) => Reply::Failure(e.to_string()),
                }
            }
        }
    }

    async fn lifecycle(&self, project: String, action: &'static str) -> Reply {
        let p = match self.registry.find_project(&project) {
            Ok(p) => p,
            Err(e) => return Reply::Failure(e.to_string()),
        };
        let result = match action {
            "start" => self.orchestrator.start(&p).await,
            "stop" => self.orchestrator.stop(&p).await,
            _ => self.orchestrator.restart(&p).await,
        };
        Reply::Verdict { action, result }
    }
}
