use std::path::PathBuf;
use tempfile::TempDir;

use sbtest_e2e::config::DEFAULT_VERSIONS;
use sbtest_e2e::fixtures::{self, ParamSet};
use sbtest_e2e::script::{load_scripts, Script};
use sbtest_e2e::TestRunner;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/e2e has a parent")
        .parent()
        .expect("crates has a parent")
        .to_path_buf()
}

/// Shipped Templates Render
///
/// Renders every template under `templates/` for each default version
/// and checks that the resulting fixtures parse as scripts and only use
/// commands the harness knows.
#[test]
fn shipped_templates_render_and_parse_for_every_version() {
    let template_dir = workspace_root().join("templates");
    assert!(template_dir.is_dir(), "missing {}", template_dir.display());

    let tmp = TempDir::new().expect("create temp dir");
    let output = tmp.path().join("testdata");

    for version in DEFAULT_VERSIONS {
        let label = fixtures::version_label(version);
        let params = ParamSet::for_version(version, tmp.path(), tmp.path());
        let report = fixtures::generate(&template_dir, &output, &label, &params)
            .unwrap_or_else(|e| panic!("generation for {version} failed: {e}"));
        assert!(!report.fixtures.is_empty());

        for fixture in &report.fixtures {
            let name = fixture.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.ends_with(&format!("_{label}.txt")), "unexpected name {name}");

            let script = Script::from_file(fixture)
                .unwrap_or_else(|e| panic!("{} does not parse: {e}", fixture.display()));
            assert!(!script.is_empty());
        }
    }

    for version in DEFAULT_VERSIONS {
        let scripts = load_scripts(&output.join(fixtures::version_label(version)), "txt").unwrap();
        assert!(scripts.iter().all(|s| s.is_ok()));
    }
}

/// The registered vocabulary covers every sandbox command the templates use
#[test]
fn engine_vocabulary_is_registered() {
    let params = TestRunner::engine_params();
    for name in ["find_errors", "check_file", "sleep", "check_ports"] {
        assert!(params.cmds.get(name).is_some(), "{name} not registered");
    }
    let condition = params.condition.expect("condition hook registered");
    assert!(condition("minimum_version_for_group:8.0.29").unwrap());
    assert!(condition("no_such_condition").is_err());
}
