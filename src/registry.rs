use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub dir: PathBuf,
}

impl Project {
    pub fn compose_file(&self) -> PathBuf {
        self.dir.join("docker-compose.yml")
    }

    pub fn env_file(&self) -> PathBuf {
        self.dir.join(".env")
    }
}

/// A stored env file an operator can activate. Read-only; only ever copied.
#[derive(Debug, Clone)]
pub struct EnvCandidate {
    pub name: String,
    pub path: PathBuf,
}

/// Scans the two configured roots: one subdirectory per project under the
/// project root, and a mirror of project names under the env root holding
/// candidate env files.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    project_root: PathBuf,
    env_root: PathBuf,
}

impl ProjectRegistry {
    pub fn new(project_root: impl Into<PathBuf>, env_root: impl Into<PathBuf>) -> Self {
        ProjectRegistry {
            project_root: project_root.into(),
            env_root: env_root.into(),
        }
    }

    /// Subdirectories of the project root, sorted by name. Plain files are
    /// ignored.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let entries = read_dir_checked(&self.project_root)?;
        let mut projects: Vec<Project> = entries
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let id = p.file_name()?.to_str()?.to_string();
                Some(Project { id, dir: p.clone() })
            })
            .collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(root = %self.project_root.display(), count = projects.len(), "listed projects");
        Ok(projects)
    }

    /// Existence is re-checked on every call rather than cached; a project
    /// removed from disk mid-session disappears from the surface.
    pub fn find_project(&self, id: &str) -> Result<Project> {
        let dir = self.project_root.join(id);
        if !dir.is_dir() {
            return Err(Error::DirectoryNotFound(dir));
        }
        Ok(Project {
            id: id.to_string(),
            dir,
        })
    }

    /// Files under `{env_root}/{project.id}`, sorted by name.
    pub fn list_candidates(&self, project: &Project) -> Result<Vec<EnvCandidate>> {
        let dir = self.env_root.join(&project.id);
        let entries = read_dir_checked(&dir)?;
        let mut candidates: Vec<EnvCandidate> = entries
            .into_iter()
            .filter(|p| p.is_file())
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some(EnvCandidate { name, path: p.clone() })
            })
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    /// Candidate path for a name previously obtained from `list_candidates`.
    /// Existence is checked by the orchestrator before anything is stopped.
    pub fn candidate(&self, project: &Project, name: &str) -> EnvCandidate {
        EnvCandidate {
            name: name.to_string(),
            path: self.env_root.join(&project.id).join(name),
        }
    }
}

fn read_dir_checked(dir: &Path) -> Result<Vec<PathBuf>> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(Error::DirectoryNotFound(dir.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
