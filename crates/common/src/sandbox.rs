//! Read-only view of a deployed database sandbox
//!
//! The deployment tool writes `sbdescription.json` into every sandbox
//! directory. sbtest never modifies it; it only reads the version, the
//! topology type and the list of allocated ports.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::version::is_at_least;

/// File name of the description inside a sandbox directory
pub const DESCRIPTION_FILE: &str = "sbdescription.json";

/// Versions at or above this allocate the extra ports in [`PORT_ADJUSTMENT_80`]
pub const PORT_ADJUSTMENT_THRESHOLD: [u32; 3] = [8, 0, 1];

/// Additional ports allocated per sandbox type from 8.0.1 onwards
pub const PORT_ADJUSTMENT_80: &[(&str, usize)] = &[
    ("single", 1),
    ("master-slave", 3),
    ("multiple", 3),
    ("group-multi-primary", 3),
    ("group-single-primary", 3),
];

/// Sandbox description as written by the deployment tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxDescription {
    #[serde(default)]
    pub basedir: String,

    #[serde(rename = "type")]
    pub sb_type: String,

    pub version: String,

    #[serde(default)]
    pub flavor: Option<String>,

    #[serde(default)]
    pub port: Vec<u32>,

    #[serde(default)]
    pub nodes: Option<u32>,

    #[serde(default)]
    pub node_num: Option<u32>,

    #[serde(default, rename = "dbdeployer-version")]
    pub deployer_version: Option<String>,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default, rename = "command-line")]
    pub command_line: Option<String>,
}

impl SandboxDescription {
    /// Parse a description from JSON text
    pub fn from_json(json: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::DescriptionParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read the description stored in `sandbox_dir`
    pub fn read(sandbox_dir: &Path) -> Result<Self> {
        let path = sandbox_dir.join(DESCRIPTION_FILE);
        if !crate::probe::is_file(&path) {
            return Err(Error::DescriptionNotFound(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|source| Error::DescriptionRead {
            path: path.clone(),
            source,
        })?;
        let description = Self::from_json(&content, &path)?;
        debug!(
            "Read description for {}: type={} version={} ports={}",
            sandbox_dir.display(),
            description.sb_type,
            description.version,
            description.port.len()
        );
        Ok(description)
    }

    /// Number of allocated ports
    pub fn port_count(&self) -> usize {
        self.port.len()
    }

    /// Port count expected for this sandbox given the count for pre-8.0.1 releases.
    ///
    /// `sandbox` only labels the error when the type is not in the table.
    pub fn expected_ports(&self, base: usize, sandbox: &str) -> Result<usize> {
        if !is_at_least(&self.version, PORT_ADJUSTMENT_THRESHOLD)? {
            return Ok(base);
        }
        let extra = extra_ports_for(&self.sb_type).ok_or_else(|| Error::UnknownSandboxType {
            sandbox: sandbox.to_string(),
            sb_type: self.sb_type.clone(),
        })?;
        Ok(base + extra)
    }
}

/// Looks up the extra port count for a sandbox type
pub fn extra_ports_for(sb_type: &str) -> Option<usize> {
    PORT_ADJUSTMENT_80
        .iter()
        .find(|(name, _)| *name == sb_type)
        .map(|(_, extra)| *extra)
}
