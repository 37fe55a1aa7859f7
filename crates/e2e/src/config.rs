//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, HarnessResult};

/// Versions generated and tested when none are configured
pub const DEFAULT_VERSIONS: [&str; 3] = ["5.6.41", "5.7.31", "8.0.29"];

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding the `*.tmpl` templates
    pub template_dir: PathBuf,

    /// Root of the generated fixture tree
    pub output_dir: PathBuf,

    /// Where the JSON results report is written
    pub results_dir: PathBuf,

    /// Target versions, one test group each
    pub versions: Vec<String>,

    /// Value of the `Home` template parameter
    pub home_dir: PathBuf,

    /// Value of the `TmpDir` template parameter
    pub tmp_dir: PathBuf,

    /// Generate fixtures and keep them, without running anything
    pub dry_run: bool,

    /// Keep the fixture tree after a full run
    pub keep_fixtures: bool,

    /// Run test groups concurrently
    pub parallel: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("testdata"),
            results_dir: PathBuf::from("test-results"),
            versions: DEFAULT_VERSIONS.iter().map(|v| v.to_string()).collect(),
            home_dir: sbtest_common::default_home_dir(),
            tmp_dir: PathBuf::from("/tmp"),
            dry_run: false,
            keep_fixtures: false,
            parallel: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| HarnessError::io("reading config", path, e))?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.versions.is_empty() {
            return Err(HarnessError::Config("no target versions configured".to_string()));
        }
        if let Some(v) = self.versions.iter().find(|v| v.trim().is_empty()) {
            return Err(HarnessError::Config(format!("invalid target version '{}'", v)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = HarnessConfig::load(&tmp.path().join("sbtest.toml")).unwrap();
        assert_eq!(config.versions, vec!["5.6.41", "5.7.31", "8.0.29"]);
        assert_eq!(config.output_dir, PathBuf::from("testdata"));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sbtest.toml");
        std::fs::write(&path, "versions = [\"8.0.29\"]\nparallel = true\n").unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.versions, vec!["8.0.29"]);
        assert!(config.parallel);
        assert_eq!(config.template_dir, PathBuf::from("templates"));
    }

    #[test]
    fn test_empty_versions_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sbtest.toml");
        std::fs::write(&path, "versions = []\n").unwrap();
        assert!(matches!(HarnessConfig::load(&path), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sbtest.toml");
        std::fs::write(&path, "versions = 8.0\n").unwrap();
        assert!(matches!(HarnessConfig::load(&path), Err(HarnessError::Toml(_))));
    }
}
