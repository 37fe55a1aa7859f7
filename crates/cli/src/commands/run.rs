//! Run Commands - generate fixtures and run them against sandboxes

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use sbtest_e2e::fixtures::GenerationReport;
use sbtest_e2e::{HarnessConfig, TestRunner};

use crate::output::{print_list, print_suite, print_warning, OutputFormat, TableDisplay};

/// Options shared by `run` and `generate`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Target version (repeatable, replaces the configured list)
    #[arg(long = "version", value_name = "VERSION")]
    pub versions: Vec<String>,

    /// Template directory
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Root of the generated fixture tree
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Generate fixtures and keep them, without running anything
    #[arg(long)]
    pub dry: bool,

    /// Keep the fixture tree after the run
    #[arg(long)]
    pub keep: bool,

    /// Run test groups concurrently
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// One generated fixture
#[derive(Debug, Serialize)]
struct FixtureRow {
    label: String,
    fixture: String,
}

impl TableDisplay for FixtureRow {
    fn headers() -> Vec<&'static str> {
        vec!["GROUP", "FIXTURE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.label.clone(), self.fixture.clone()]
    }
}

fn fixture_rows(reports: &[GenerationReport]) -> Vec<FixtureRow> {
    reports
        .iter()
        .flat_map(|report| {
            report.fixtures.iter().map(move |path| FixtureRow {
                label: report.label.clone(),
                fixture: path.display().to_string(),
            })
        })
        .collect()
}

fn load_config(config_path: &Path, selection: SelectionArgs) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if !selection.versions.is_empty() {
        config.versions = selection.versions;
    }
    if let Some(templates) = selection.templates {
        config.template_dir = templates;
    }
    if let Some(output) = selection.output {
        config.output_dir = output;
    }
    debug!(
        "Using templates from {:?}, fixtures in {:?}",
        config.template_dir, config.output_dir
    );
    info!("Target versions: {}", config.versions.join(", "));
    Ok(config)
}

/// Full run: setup, run and teardown. `Ok(false)` means a fixture failed.
pub async fn execute_run(args: RunArgs, config_path: &Path, format: OutputFormat) -> Result<bool> {
    let mut config = load_config(config_path, args.selection)?;
    config.dry_run |= args.dry;
    config.keep_fixtures |= args.keep;
    config.parallel |= args.parallel;

    let mut runner = TestRunner::with_config(config);
    let report = runner.run().await.context("test run aborted")?;

    if let Some(error) = &report.cleanup_error {
        print_warning(&format!("fixture cleanup failed: {}", error));
    }

    match report.suite {
        None => {
            print_list(&fixture_rows(&report.generated), format);
            Ok(true)
        }
        Some(suite) => {
            runner
                .write_results(&suite)
                .context("writing results report")?;
            print_suite(&suite, format);
            Ok(suite.success())
        }
    }
}

/// Generation only; the fixture tree is always kept
pub async fn execute_generate(
    args: GenerateArgs,
    config_path: &Path,
    format: OutputFormat,
) -> Result<bool> {
    let mut config = load_config(config_path, args.selection)?;
    config.dry_run = true;

    let mut runner = TestRunner::with_config(config);
    let generated = runner.setup().context("fixture generation failed")?;
    print_list(&fixture_rows(&generated), format);
    Ok(true)
}
