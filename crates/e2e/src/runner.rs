//! Harness driver: generate fixtures, run them, clean up
//!
//! The three phases run strictly in order. All fixtures for every
//! target version are generated before the first script runs, so a
//! failed generation never leaves a group running against a partial tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use sbtest_common::probe::dir_exists;

use crate::conditions::evaluate_condition;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{self, GenerationReport, ParamSet, FIXTURE_EXT};
use crate::predicates::sandbox_commands;
use crate::script::{load_scripts, run_script, EngineParams, ScriptResult};

/// Where the driver currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Run,
    Teardown,
    Done,
}

/// Fixtures under one version-labeled subdirectory
#[derive(Debug, Clone)]
pub struct TestGroup {
    pub name: String,
    pub dir: PathBuf,
}

/// Result of one test group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub scripts: Vec<ScriptResult>,
    pub error: Option<String>,
}

/// Result of running all groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub groups: Vec<GroupResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Everything a full run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub generated: Vec<GenerationReport>,
    /// `None` for a dry run
    pub suite: Option<SuiteResult>,
    /// Set when the fixture tree could not be removed
    pub cleanup_error: Option<String>,
}

/// Main harness runner
pub struct TestRunner {
    config: HarnessConfig,
    phase: Phase,
    generated: bool,
}

impl TestRunner {
    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            config,
            phase: Phase::Setup,
            generated: false,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The command and condition vocabulary registered with the script engine
    pub fn engine_params() -> EngineParams {
        EngineParams {
            cmds: sandbox_commands(),
            condition: Some(evaluate_condition),
            env: Vec::new(),
        }
    }

    /// Setup phase: generate fixtures for every target version.
    ///
    /// The first failure aborts the whole run.
    pub fn setup(&mut self) -> HarnessResult<Vec<GenerationReport>> {
        self.config.validate()?;
        self.phase = Phase::Setup;

        let mut reports = Vec::with_capacity(self.config.versions.len());
        for version in &self.config.versions {
            let label = fixtures::version_label(version);
            let params = ParamSet::for_version(version, &self.config.home_dir, &self.config.tmp_dir);
            let report = fixtures::generate(
                &self.config.template_dir,
                &self.config.output_dir,
                &label,
                &params,
            )
            .map_err(|e| {
                error!("error creating the tests for {}: {}", label, e);
                e
            })?;
            self.generated = true;
            reports.push(report);
        }
        Ok(reports)
    }

    /// One group per label this run generated, in generation order
    pub fn groups_for(&self, generated: &[GenerationReport]) -> Vec<TestGroup> {
        groups_for(&self.config.output_dir, generated)
    }

    /// Run phase: execute every group, isolating failures per group
    pub async fn run_groups(&mut self, groups: Vec<TestGroup>) -> HarnessResult<SuiteResult> {
        self.phase = Phase::Run;
        let started_at = Utc::now();
        let start = Instant::now();
        let params = Self::engine_params();

        info!("Running {} test group(s)...", groups.len());

        let mut results = Vec::with_capacity(groups.len());
        if self.config.parallel {
            let handles: Vec<_> = groups
                .into_iter()
                .map(|group| {
                    let params = params.clone();
                    tokio::task::spawn_blocking(move || run_group(&group, &params))
                })
                .collect();
            for handle in handles {
                results.push(handle.await?);
            }
        } else {
            for group in groups {
                let params = params.clone();
                results.push(tokio::task::spawn_blocking(move || run_group(&group, &params)).await?);
            }
        }

        let scripts = results.iter().flat_map(|g| g.scripts.iter());
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for script in scripts {
            if script.passed() {
                passed += 1;
            } else if script.failed() {
                failed += 1;
            } else {
                skipped += 1;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(SuiteResult {
            started_at,
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            groups: results,
        })
    }

    /// Teardown phase: remove the fixture tree unless it must be kept
    pub fn teardown(&mut self) -> HarnessResult<()> {
        self.phase = Phase::Teardown;
        let output = &self.config.output_dir;

        if self.generated && !self.config.dry_run && !self.config.keep_fixtures && dir_exists(output) {
            debug!("Removing {}", output.display());
            std::fs::remove_dir_all(output)
                .map_err(|e| HarnessError::io("removing directory", output, e))?;
        }
        self.phase = Phase::Done;
        Ok(())
    }

    /// Setup, run (skipped for a dry run) and teardown
    pub async fn run(&mut self) -> HarnessResult<RunReport> {
        let generated = self.setup()?;

        let suite = if self.config.dry_run {
            info!(
                "Dry run: fixtures kept in {}",
                self.config.output_dir.display()
            );
            None
        } else {
            let groups = self.groups_for(&generated);
            Some(self.run_groups(groups).await)
        };

        let cleanup_error = self.teardown().err().map(|e| {
            warn!("{}", e);
            e.to_string()
        });

        Ok(RunReport {
            generated,
            suite: suite.transpose()?,
            cleanup_error,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> HarnessResult<PathBuf> {
        let dir = &self.config.results_dir;
        std::fs::create_dir_all(dir).map_err(|e| HarnessError::io("creating directory", dir, e))?;

        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json).map_err(|e| HarnessError::io("writing results", &path, e))?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// One group per generated label under `output_dir`.
///
/// Label directories left behind by earlier runs are never included.
pub fn groups_for(output_dir: &Path, generated: &[GenerationReport]) -> Vec<TestGroup> {
    generated
        .iter()
        .map(|report| TestGroup {
            name: report.label.clone(),
            dir: output_dir.join(&report.label),
        })
        .collect()
}

/// Runs every fixture in a group; one failing script does not stop the others
pub fn run_group(group: &TestGroup, params: &EngineParams) -> GroupResult {
    let start = Instant::now();
    info!("=== group {}", group.name);

    let loaded = match load_scripts(&group.dir, FIXTURE_EXT) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("✗ {} - {}", group.name, e);
            return GroupResult {
                name: group.name.clone(),
                success: false,
                duration_ms: start.elapsed().as_millis() as u64,
                scripts: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    let mut scripts = Vec::with_capacity(loaded.len());
    for entry in loaded {
        let result = match entry {
            Ok(script) => run_script(&script, params),
            Err(parse_failure) => parse_failure,
        };
        match &result.outcome {
            crate::script::Outcome::Passed => {
                info!("✓ {}/{} ({} ms)", group.name, result.name, result.duration_ms)
            }
            crate::script::Outcome::Skipped { reason } => {
                info!("- {}/{} skipped: {}", group.name, result.name, reason)
            }
            crate::script::Outcome::Failed { line, message } => {
                error!("✗ {}/{} line {} - {}", group.name, result.name, line, message)
            }
        }
        scripts.push(result);
    }

    GroupResult {
        name: group.name.clone(),
        success: scripts.iter().all(|s| !s.failed()),
        duration_ms: start.elapsed().as_millis() as u64,
        scripts,
        error: None,
    }
}
