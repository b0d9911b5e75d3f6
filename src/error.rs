use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no active env file at {}", .0.display())]
    EnvFileNotFound(PathBuf),

    #[error("stack command failed: {0}")]
    StackCommand(String),

    #[error("{action} failed for {}: {source}", .path.display())]
    FilesystemOp {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
