//! Fixture generation
//!
//! Every `*.tmpl` file in a template directory is rendered once per
//! version label. From the output directory `testdata`, the template
//! `single.tmpl` and the label `8_0_29` we get the fixture
//! `testdata/8_0_29/single_8_0_29.txt`. The script runner builds one
//! test group per label subdirectory, so this layout must not change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use sbtest_common::probe::dir_exists;

use crate::error::{HarnessError, HarnessResult};
use crate::template::Template;

/// Extension of template files
pub const TEMPLATE_EXT: &str = "tmpl";

/// Extension of generated fixtures
pub const FIXTURE_EXT: &str = "txt";

pub const KEY_DB_VERSION: &str = "DbVersion";
pub const KEY_DB_PATH_VER: &str = "DbPathVer";
pub const KEY_HOME: &str = "Home";
pub const KEY_TMP_DIR: &str = "TmpDir";

/// Keys every parameter set must define, in the order they are checked
pub const REQUIRED_KEYS: [&str; 4] = [KEY_DB_VERSION, KEY_DB_PATH_VER, KEY_HOME, KEY_TMP_DIR];

/// Parameters substituted into templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet(BTreeMap<String, String>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard parameters for one target version
    pub fn for_version(version: &str, home: &Path, tmp_dir: &Path) -> Self {
        let mut params = Self::new();
        params
            .set(KEY_DB_VERSION, version)
            .set(KEY_DB_PATH_VER, version_label(version))
            .set(KEY_HOME, home.to_string_lossy())
            .set(KEY_TMP_DIR, tmp_dir.to_string_lossy());
        params
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Checks required keys, then the home and temp directories
    pub fn validate(&self) -> HarnessResult<()> {
        for key in REQUIRED_KEYS {
            match self.get(key) {
                None => {
                    return Err(HarnessError::MissingParameter {
                        key: key.to_string(),
                    })
                }
                Some("") => {
                    return Err(HarnessError::EmptyParameter {
                        key: key.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        let home = PathBuf::from(self.get(KEY_HOME).unwrap_or_default());
        if !dir_exists(&home) {
            return Err(HarnessError::HomeDirNotFound(home));
        }

        let tmp_dir = PathBuf::from(self.get(KEY_TMP_DIR).unwrap_or_default());
        if !dir_exists(&tmp_dir) {
            return Err(HarnessError::TempDirNotFound(tmp_dir));
        }
        Ok(())
    }
}

/// Filesystem-safe label for a version: `8.0.29` -> `8_0_29`
pub fn version_label(version: &str) -> String {
    version.replace('.', "_")
}

/// Path of the fixture produced from `template_base` for `label`
pub fn fixture_path(output_dir: &Path, label: &str, template_base: &str) -> PathBuf {
    output_dir
        .join(label)
        .join(format!("{}_{}.{}", template_base, label, FIXTURE_EXT))
}

/// Outcome of one generation pass
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub label: String,
    pub fixtures: Vec<PathBuf>,
}

/// Template files directly inside `template_dir`, sorted by name
pub fn list_templates(template_dir: &Path) -> HarnessResult<Vec<PathBuf>> {
    let mut templates = Vec::new();
    for entry in walkdir::WalkDir::new(template_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory loop"));
            HarnessError::io("retrieving template files from", template_dir, source)
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().map(|ext| ext == TEMPLATE_EXT).unwrap_or(false)
        {
            templates.push(path.to_path_buf());
        }
    }
    Ok(templates)
}

/// Renders every template in `template_dir` into `<output_dir>/<label>/`.
///
/// The first failure aborts the pass for this label.
pub fn generate(
    template_dir: &Path,
    output_dir: &Path,
    label: &str,
    params: &ParamSet,
) -> HarnessResult<GenerationReport> {
    params.validate()?;

    ensure_dir(output_dir)?;
    let templates = list_templates(template_dir)?;

    let label_dir = output_dir.join(label);
    ensure_dir(&label_dir)?;

    let mut report = GenerationReport {
        label: label.to_string(),
        fixtures: Vec::with_capacity(templates.len()),
    };

    for template_path in &templates {
        let base = template_base_name(template_path);

        let contents = std::fs::read_to_string(template_path)
            .map_err(|e| HarnessError::io("reading file", template_path, e))?;

        let rendered = Template::parse(&contents)
            .and_then(|tmpl| tmpl.render(params.as_map()))
            .map_err(|e| HarnessError::Template {
                path: template_path.clone(),
                reason: e.to_string(),
            })?;

        let target = fixture_path(output_dir, label, &base);
        std::fs::write(&target, rendered.as_bytes())
            .map_err(|e| HarnessError::io("writing text file", &target, e))?;

        debug!("Generated {} from {}", target.display(), template_path.display());
        report.fixtures.push(target);
    }

    info!(
        "Generated {} fixture(s) for {} in {}",
        report.fixtures.len(),
        label,
        label_dir.display()
    );
    Ok(report)
}

fn template_base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// One level only; a missing parent is reported rather than created.
fn ensure_dir(dir: &Path) -> HarnessResult<()> {
    if !dir_exists(dir) {
        std::fs::create_dir(dir).map_err(|e| HarnessError::io("creating directory", dir, e))?;
    }
    Ok(())
}
