//! Conditions that gate script steps
//!
//! A condition is written `name:arg1:arg2` inside a `[...]` guard and
//! decides whether the guarded line runs at all.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use sbtest_common::probe::file_exists;

use crate::error::{HarnessError, HarnessResult};

/// Time between two existence checks in `exists_within_seconds`
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Release lines that support the multi-node topology under test
const GROUP_VERSION_PREFIXES: [&str; 2] = ["5.7", "8.0"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `minimum_version_for_group:<version>`
    MinimumVersionForGroup { version: String },

    /// `exists_within_seconds:<file>:<seconds>`
    ExistsWithinSeconds { file: PathBuf, seconds: u64 },
}

impl FromStr for Condition {
    type Err = HarnessError;

    fn from_str(s: &str) -> HarnessResult<Self> {
        let elements: Vec<&str> = s.split(':').collect();
        let (name, args) = elements
            .split_first()
            .ok_or_else(|| HarnessError::UnknownCondition(s.to_string()))?;

        match *name {
            "minimum_version_for_group" => match args {
                [version] => Ok(Condition::MinimumVersionForGroup {
                    version: version.to_string(),
                }),
                _ => Err(HarnessError::Usage(
                    "condition 'minimum_version_for_group' requires a version".to_string(),
                )),
            },
            "exists_within_seconds" => match args {
                [file, seconds] => {
                    let seconds = seconds.parse::<u64>().map_err(|e| {
                        HarnessError::Usage(format!(
                            "condition 'exists_within_seconds': invalid number of seconds '{}': {}",
                            seconds, e
                        ))
                    })?;
                    Ok(Condition::ExistsWithinSeconds {
                        file: PathBuf::from(*file),
                        seconds,
                    })
                }
                _ => Err(HarnessError::Usage(
                    "condition 'exists_within_seconds' requires a file name and the number of seconds"
                        .to_string(),
                )),
            },
            other => Err(HarnessError::UnknownCondition(other.to_string())),
        }
    }
}

impl Condition {
    /// Evaluates the condition, blocking for polling conditions
    pub fn evaluate(&self) -> bool {
        match self {
            Condition::MinimumVersionForGroup { version } => GROUP_VERSION_PREFIXES
                .iter()
                .any(|prefix| version.starts_with(prefix)),
            Condition::ExistsWithinSeconds { file, seconds } => {
                exists_within(file, *seconds, POLL_INTERVAL)
            }
        }
    }
}

/// Parses and evaluates a condition string.
///
/// This is the condition hook registered with the script engine.
pub fn evaluate_condition(condition: &str) -> HarnessResult<bool> {
    let parsed: Condition = condition.parse()?;
    let result = parsed.evaluate();
    debug!("condition [{}] -> {}", condition, result);
    Ok(result)
}

/// Checks for `file` once per `interval`, up to `polls` times.
///
/// With zero polls the answer is the immediate existence check.
pub fn exists_within(file: &Path, polls: u64, interval: Duration) -> bool {
    if polls == 0 {
        return file_exists(file);
    }
    for _ in 0..polls {
        std::thread::sleep(interval);
        if file_exists(file) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("5.6.41", false)]
    #[test_case("5.7.30", true)]
    #[test_case("8.0.29", true)]
    #[test_case("8.4.0", false)]
    fn test_minimum_version_for_group(version: &str, expected: bool) {
        let cond = format!("minimum_version_for_group:{}", version);
        assert_eq!(evaluate_condition(&cond).unwrap(), expected);
    }

    #[test]
    fn test_parse_tagged_variants() {
        assert_eq!(
            "exists_within_seconds:/tmp/x:3".parse::<Condition>().unwrap(),
            Condition::ExistsWithinSeconds {
                file: PathBuf::from("/tmp/x"),
                seconds: 3
            }
        );
    }

    #[test_case("minimum_version_for_group" ; "missing version")]
    #[test_case("exists_within_seconds:/tmp/x" ; "missing seconds")]
    #[test_case("exists_within_seconds:/tmp/x:soon" ; "non numeric seconds")]
    #[test_case("exists_within_seconds:/tmp/x:-1" ; "negative seconds")]
    fn test_bad_arguments(cond: &str) {
        assert!(matches!(evaluate_condition(cond), Err(HarnessError::Usage(_))));
    }

    #[test]
    fn test_unrecognized_condition() {
        let err = evaluate_condition("maximum_version:8.0.29").unwrap_err();
        assert!(matches!(err, HarnessError::UnknownCondition(name) if name == "maximum_version"));
        assert!(matches!(evaluate_condition(""), Err(HarnessError::UnknownCondition(_))));
    }

    #[test]
    fn test_zero_seconds_is_immediate() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("present");
        std::fs::write(&present, "").unwrap();
        let absent = tmp.path().join("absent");

        let start = Instant::now();
        let cond = format!("exists_within_seconds:{}:0", present.display());
        assert!(evaluate_condition(&cond).unwrap());
        let cond = format!("exists_within_seconds:{}:0", absent.display());
        assert!(!evaluate_condition(&cond).unwrap());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_file_appearing_late_is_found() {
        let tmp = TempDir::new().unwrap();
        let late = tmp.path().join("late");
        let writer = {
            let late = late.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(1));
                std::fs::write(late, "up").unwrap();
            })
        };

        let start = Instant::now();
        let cond = format!("exists_within_seconds:{}:3", late.display());
        assert!(evaluate_condition(&cond).unwrap());
        assert!(start.elapsed() < Duration::from_secs(3) + Duration::from_millis(500));
        writer.join().unwrap();
    }

    #[test]
    fn test_file_never_created_times_out() {
        let tmp = TempDir::new().unwrap();
        let never = tmp.path().join("never");

        let start = Instant::now();
        assert!(!exists_within(&never, 3, Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_bound_elapses_at_poll_granularity() {
        let tmp = TempDir::new().unwrap();
        let never = tmp.path().join("never");

        let start = Instant::now();
        let cond = format!("exists_within_seconds:{}:2", never.display());
        assert!(!evaluate_condition(&cond).unwrap());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
