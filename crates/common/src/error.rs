//! Error types for sbtest

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading sandbox state or comparing versions
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid version '{version}': {reason}")]
    VersionParse { version: String, reason: String },

    #[error("sandbox description not found at {0}")]
    DescriptionNotFound(PathBuf),

    #[error("error reading sandbox description {path}: {source}")]
    DescriptionRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing sandbox description {path}: {source}")]
    DescriptionParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error recognizing the type of sandbox '{sandbox}': {sb_type}")]
    UnknownSandboxType { sandbox: String, sb_type: String },
}
