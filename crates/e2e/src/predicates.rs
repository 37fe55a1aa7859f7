//! Verification commands asserting on deployed sandbox state
//!
//! Each command receives the running script state, whether the caller
//! negated it with `!`, and its arguments. Returning an error fails the
//! script. Sandbox paths are resolved against the script work directory
//! when relative.

use std::path::Path;
use std::time::Duration;
use tracing::debug;

use sbtest_common::probe::{dir_exists, file_exists};
use sbtest_common::SandboxDescription;

use crate::error::{HarnessError, HarnessResult};
use crate::script::{CommandRegistry, ScriptState};

/// Marker searched for in the sandbox error log
pub const ERROR_MARKER: &str = "ERROR";

/// Data directory inside a sandbox
pub const DATA_DIR: &str = "data";

/// Error log inside the data directory
pub const ERROR_LOG: &str = "msandbox.err";

/// Default pause for `sleep` without arguments
pub const DEFAULT_SLEEP_SECS: u64 = 1;

/// Registry holding every sandbox verification command
pub fn sandbox_commands() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry
        // find_errors /path/to/sandbox
        // negated, succeeds when the log does not contain ERROR
        .register("find_errors", find_errors)
        // check_file /path/to/sandbox file1 [file2 ...]
        // negated, succeeds when none of the files exist
        .register("check_file", check_file)
        // sleep [seconds]
        .register("sleep", sleep)
        // check_ports /path/to/sandbox 3
        .register("check_ports", check_ports);
    registry
}

fn sandbox_name(sb_dir: &Path) -> String {
    sb_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| sb_dir.display().to_string())
}

/// Looks for `ERROR` in the sandbox error log
pub fn find_errors(ts: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    let sb_arg = args
        .first()
        .ok_or_else(|| HarnessError::Usage("no sandbox path provided".to_string()))?;
    let sb_dir = ts.resolve(sb_arg);
    let data_dir = sb_dir.join(DATA_DIR);
    let log_file = data_dir.join(ERROR_LOG);

    if !dir_exists(&data_dir) {
        return Err(HarnessError::AssertionFailed(format!(
            "sandbox data dir {} not found",
            data_dir.display()
        )));
    }
    if !file_exists(&log_file) {
        return Err(HarnessError::AssertionFailed(format!(
            "file {} not found",
            log_file.display()
        )));
    }

    let contents = std::fs::read(&log_file)
        .map_err(|e| HarnessError::io("reading file", &log_file, e))?;
    let has_error = String::from_utf8_lossy(&contents).contains(ERROR_MARKER);
    debug!("{}: {} contains {}: {}", ts.name(), log_file.display(), ERROR_MARKER, has_error);

    if neg && has_error {
        return Err(HarnessError::AssertionFailed(format!(
            "ERRORs found in {} (negated: expected none)",
            log_file.display()
        )));
    }
    if !neg && !has_error {
        return Err(HarnessError::AssertionFailed(format!(
            "ERRORs not found in {}",
            log_file.display()
        )));
    }
    Ok(())
}

/// Checks that each named file exists inside the sandbox, or that none does when negated
pub fn check_file(ts: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    let (sb_arg, files) = args
        .split_first()
        .ok_or_else(|| HarnessError::Usage("no sandbox path provided".to_string()))?;
    let sb_dir = ts.resolve(sb_arg);

    for name in files {
        let path = sb_dir.join(name);
        let exists = file_exists(&path);

        if neg && exists {
            return Err(HarnessError::AssertionFailed(format!(
                "file {} found (negated: expected absent)",
                path.display()
            )));
        }
        if !neg && !exists {
            return Err(HarnessError::AssertionFailed(format!(
                "file {} not found",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Pauses for the given number of seconds, one by default
pub fn sleep(ts: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    if neg {
        return Err(HarnessError::Usage("unsupported: ! sleep".to_string()));
    }
    let seconds = match args.first() {
        None => DEFAULT_SLEEP_SECS,
        Some(arg) => arg
            .parse::<u64>()
            .map_err(|_| HarnessError::Usage(format!("invalid number provided: '{}'", arg)))?,
    };
    ts.logf(format!("sleeping {}s", seconds));
    std::thread::sleep(Duration::from_secs(seconds));
    Ok(())
}

/// Compares the sandbox's allocated port count with the expected one.
///
/// The expected count is the given base plus the per-type adjustment for
/// releases from 8.0.1 onwards. Negated, the counts must differ.
pub fn check_ports(ts: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    let (sb_arg, count_arg) = match args {
        [sb, count, ..] => (sb, count),
        _ => {
            return Err(HarnessError::Usage(
                "no sandbox path and number of ports provided".to_string(),
            ))
        }
    };
    let sb_dir = ts.resolve(sb_arg);
    let base: usize = count_arg.parse().map_err(|e| {
        HarnessError::Usage(format!("error converting text '{}' to number: {}", count_arg, e))
    })?;

    let name = sandbox_name(&sb_dir);
    let description = SandboxDescription::read(&sb_dir)?;
    let expected = description.expected_ports(base, &name)?;
    let actual = description.port_count();
    ts.logf(format!(
        "sandbox '{}' ({} {}): expected {} ports, found {}",
        name, description.sb_type, description.version, expected, actual
    ));

    if neg && actual == expected {
        return Err(HarnessError::AssertionFailed(format!(
            "sandbox '{}': wanted a port count other than {} (negated) - got {}",
            name, expected, actual
        )));
    }
    if !neg && actual != expected {
        return Err(HarnessError::AssertionFailed(format!(
            "sandbox '{}': wanted {} ports - got {}",
            name, expected, actual
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;
    use tempfile::TempDir;
    use test_case::test_case;

    struct Fixture {
        _work: TempDir,
        state: ScriptState,
    }

    fn fixture() -> Fixture {
        let work = TempDir::new().unwrap();
        let state = ScriptState::new("predicates", work.path(), &[]);
        Fixture { _work: work, state }
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sandbox(root: &Path, name: &str, version: &str, sb_type: &str, ports: &[u32]) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(dir.join(DATA_DIR)).unwrap();
        let description = serde_json::json!({
            "basedir": format!("/opt/mysql/{}", version),
            "type": sb_type,
            "version": version,
            "port": ports,
        });
        std::fs::write(
            dir.join(sbtest_common::sandbox::DESCRIPTION_FILE),
            description.to_string(),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_registry_names() {
        let registry = sandbox_commands();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["check_file", "check_ports", "find_errors", "sleep"]);
    }

    #[test]
    fn test_find_errors_honors_negation() {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "msb_8_0_29", "8.0.29", "single", &[1, 2]);
        let log = sb.join(DATA_DIR).join(ERROR_LOG);
        let a = args(&[sb.to_str().unwrap()]);

        std::fs::write(&log, "[Note] ready for connections\n").unwrap();
        assert!(find_errors(&mut fx.state, true, &a).is_ok());
        assert!(find_errors(&mut fx.state, false, &a).is_err());

        std::fs::write(&log, "[ERROR] Can't open the mysql.plugin table\n").unwrap();
        assert!(find_errors(&mut fx.state, false, &a).is_ok());
        let err = find_errors(&mut fx.state, true, &a).unwrap_err();
        assert!(err.to_string().contains("ERRORs found"));
    }

    #[test]
    fn test_find_errors_missing_pieces() {
        let mut fx = fixture();
        let missing = fx.state.work_dir().join("nowhere");
        let err = find_errors(&mut fx.state, true, &args(&[missing.to_str().unwrap()])).unwrap_err();
        assert!(err.to_string().contains("data dir"));

        let sb = sandbox(fx.state.work_dir(), "msb", "5.7.31", "single", &[1]);
        let err = find_errors(&mut fx.state, true, &args(&[sb.to_str().unwrap()])).unwrap_err();
        assert!(err.to_string().contains(ERROR_LOG));

        assert!(matches!(
            find_errors(&mut fx.state, false, &[]),
            Err(HarnessError::Usage(_))
        ));
    }

    #[test]
    fn test_check_file_matrix() {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "msb", "8.0.29", "single", &[1, 2]);
        for f in ["start", "stop", "status"] {
            std::fs::write(sb.join(f), "#!/bin/sh\n").unwrap();
        }
        let sb = sb.to_str().unwrap();

        let all_present = args(&[sb, "start", "stop", "status"]);
        assert!(check_file(&mut fx.state, false, &all_present).is_ok());
        assert!(check_file(&mut fx.state, true, &all_present).is_err());

        let one_missing = args(&[sb, "start", "restart", "stop"]);
        let err = check_file(&mut fx.state, false, &one_missing).unwrap_err();
        assert!(err.to_string().contains("restart"));

        let none_present = args(&[sb, "restart", "clear"]);
        assert!(check_file(&mut fx.state, true, &none_present).is_ok());
        assert!(check_file(&mut fx.state, false, &none_present).is_err());
    }

    #[test]
    fn test_check_file_relative_sandbox() {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "rel", "8.0.29", "single", &[1, 2]);
        std::fs::write(sb.join("use"), "").unwrap();
        assert!(check_file(&mut fx.state, false, &args(&["rel", "use"])).is_ok());
    }

    #[test_case("5.7.31", "single", &[5731], 1, true ; "no adjustment before 8.0.1")]
    #[test_case("8.0.29", "single", &[8029, 18029], 1, true ; "single gains one port")]
    #[test_case("8.0.29", "single", &[8029], 1, false ; "single missing the extra port")]
    #[test_case("8.0.29", "group-multi-primary", &[1, 2, 3, 4, 5, 6], 3, true ; "group gains three")]
    #[test_case("5.6.41", "master-slave", &[1, 2, 3], 3, true ; "replication before threshold")]
    fn test_check_ports(version: &str, sb_type: &str, ports: &[u32], base: usize, passes: bool) {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "sb", version, sb_type, ports);
        let count = base.to_string();
        let a = args(&[sb.to_str().unwrap(), count.as_str()]);

        assert_eq!(check_ports(&mut fx.state, false, &a).is_ok(), passes);
        assert_eq!(check_ports(&mut fx.state, true, &a).is_ok(), !passes);
    }

    #[test]
    fn test_check_ports_unknown_type() {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "ndb_msb", "8.0.29", "ndb", &[1, 2]);
        let err = check_ports(&mut fx.state, false, &args(&[sb.to_str().unwrap(), "1"])).unwrap_err();
        assert!(err.to_string().contains("error recognizing the type"));
        assert!(err.to_string().contains("ndb_msb"));
    }

    #[test]
    fn test_check_ports_errors() {
        let mut fx = fixture();
        let sb = fx.state.work_dir().join("empty");
        std::fs::create_dir(&sb).unwrap();
        let sb = sb.to_str().unwrap().to_string();

        assert!(matches!(
            check_ports(&mut fx.state, false, &args(&[sb.as_str()])),
            Err(HarnessError::Usage(_))
        ));
        assert!(matches!(
            check_ports(&mut fx.state, false, &args(&[sb.as_str(), "three"])),
            Err(HarnessError::Usage(_))
        ));
        assert!(matches!(
            check_ports(&mut fx.state, true, &args(&[sb.as_str(), "1"])),
            Err(HarnessError::Sandbox(_))
        ));
    }

    #[test]
    fn test_check_ports_bad_version() {
        let mut fx = fixture();
        let sb = sandbox(fx.state.work_dir(), "sb", "8.0", "single", &[1]);
        let err = check_ports(&mut fx.state, false, &args(&[sb.to_str().unwrap(), "1"])).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Sandbox(sbtest_common::Error::VersionParse { .. })
        ));
    }

    #[test]
    fn test_sleep() {
        let mut fx = fixture();
        let start = Instant::now();
        assert!(sleep(&mut fx.state, false, &args(&["0"])).is_ok());
        assert!(start.elapsed() < Duration::from_millis(500));

        let err = sleep(&mut fx.state, false, &args(&["soon"])).unwrap_err();
        assert!(err.to_string().contains("invalid number"));
        assert!(sleep(&mut fx.state, true, &[]).is_err());
    }

    #[test]
    fn test_sleep_defaults_to_one_second() {
        let mut fx = fixture();
        let start = Instant::now();
        sleep(&mut fx.state, false, &[]).unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
