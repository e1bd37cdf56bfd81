use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RootstrapError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Fetch Error: cannot fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("Package Not Found: cannot find package '{0}' in the repository index")]
    NotFound(String),

    #[error("Unknown package format: {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("Extraction Error: {0}")]
    Extract(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Command '{program}' failed with {status}")]
    Process { program: String, status: ExitStatus },
}

impl RootstrapError {
    /// Wraps an I/O error with the path it concerned.
    pub fn io_at(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        RootstrapError::IoError(format!("Failed to {action} {}: {err}", path.display()))
    }
}

impl From<std::io::Error> for RootstrapError {
    fn from(err: std::io::Error) -> Self {
        RootstrapError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for RootstrapError {
    fn from(err: reqwest::Error) -> Self {
        RootstrapError::Http(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RootstrapError>;
