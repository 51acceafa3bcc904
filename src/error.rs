//! Error types for image operations.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{} is not a usable disk image: {reason}", image.display())]
    InvalidImage { image: PathBuf, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Loop device mapping failed: {0}")]
    MappingFailed(String),

    #[error("Mount failed: {0}")]
    MountFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User '{user}' not found in {}", shadow.display())]
    UserNotFound { user: String, shadow: PathBuf },

    #[error("Partition copy failed: {0}")]
    CopyFailed(String),

    #[error("Partition {index} does not exist (image has {count})")]
    NoSuchPartition { index: usize, count: usize },

    #[error("Executable not found: {0}. Make sure all dependencies are installed.")]
    ToolMissing(String),

    #[error("{program} failed with exit code {code:?}: {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stderr of a failed tool, or the display form of any other error.
    pub fn detail(&self) -> String {
        match self {
            Error::Command { stderr, .. } if !stderr.is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}
