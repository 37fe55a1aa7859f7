//! Error types for fixture generation and script execution

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("the parameters must contain a '{key}' element")]
    MissingParameter { key: String },

    #[error("the element '{key}' in the parameters is empty")]
    EmptyParameter { key: String },

    #[error("home directory '{}' not found", .0.display())]
    HomeDirNotFound(PathBuf),

    #[error("temp directory '{}' not found", .0.display())]
    TempDirNotFound(PathBuf),

    #[error("error {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error processing template from {}: {reason}", .path.display())]
    Template { path: PathBuf, reason: String },

    #[error("Script parse error in {script} line {line}: {reason}")]
    ScriptParse {
        script: String,
        line: usize,
        reason: String,
    },

    #[error("{0}")]
    AssertionFailed(String),

    #[error("usage: {0}")]
    Usage(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unrecognized condition name '{0}'")]
    UnknownCondition(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Sandbox(#[from] sbtest_common::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl HarnessError {
    /// Wraps an I/O error with the operation attempted and the path involved
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for failures detected before any test ran
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            HarnessError::MissingParameter { .. }
                | HarnessError::EmptyParameter { .. }
                | HarnessError::HomeDirNotFound(_)
                | HarnessError::TempDirNotFound(_)
                | HarnessError::Io { .. }
                | HarnessError::Template { .. }
                | HarnessError::Config(_)
        )
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
