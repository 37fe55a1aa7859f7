//! Check Commands - run one verification command or condition directly

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use sbtest_e2e::conditions::evaluate_condition;
use sbtest_e2e::predicates::sandbox_commands;
use sbtest_e2e::{HarnessError, ScriptState};

use crate::output::{print_error, print_message, print_success, OutputFormat};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Command name (find_errors, check_file, sleep, check_ports)
    pub command: String,

    /// Invert the expectation, like a leading `!` in a fixture
    #[arg(long)]
    pub not: bool,

    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConditionArgs {
    /// Condition string, e.g. `minimum_version_for_group:8.0.29`
    pub condition: String,
}

#[derive(Debug, Serialize)]
struct ConditionAnswer<'a> {
    condition: &'a str,
    value: bool,
}

/// Runs a registered command from the current directory.
///
/// `Ok(false)` means the check ran and did not hold.
pub fn execute_check(args: CheckArgs) -> Result<bool> {
    let registry = sandbox_commands();
    let cmd = registry.get(&args.command).ok_or_else(|| {
        let known: Vec<&str> = registry.names().collect();
        anyhow!("unknown command '{}' (known: {})", args.command, known.join(", "))
    })?;

    let cwd = std::env::current_dir()?;
    debug!("Running {} (negated: {}) from {:?}", args.command, args.not, cwd);
    let mut state = ScriptState::new("check", &cwd, &[]);
    let outcome = cmd(&mut state, args.not, &args.args);

    for line in state.log() {
        println!("{}", line);
    }

    match outcome {
        Ok(()) => {
            print_success(&format!("{} passed", args.command));
            Ok(true)
        }
        Err(e @ HarnessError::Usage(_)) => Err(e.into()),
        Err(e) if e.is_setup_error() => Err(e.into()),
        Err(e) => {
            print_error(&format!("{}: {}", args.command, e));
            Ok(false)
        }
    }
}

/// Evaluates a condition; the exit status carries its value
pub fn execute_condition(args: ConditionArgs, format: OutputFormat) -> Result<bool> {
    let value = evaluate_condition(&args.condition)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&ConditionAnswer {
                condition: &args.condition,
                value,
            })?
        ),
        _ => print_message(&format!("[{}] {}", args.condition, value), format),
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_command_is_an_error() {
        let args = CheckArgs {
            command: "frobnicate".to_string(),
            not: false,
            args: vec![],
        };
        let err = execute_check(args).unwrap_err();
        assert!(err.to_string().contains("check_ports"));
    }

    #[test]
    fn test_check_file_result_maps_to_bool() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("start"), "").unwrap();
        let sb = tmp.path().display().to_string();

        let present = CheckArgs {
            command: "check_file".to_string(),
            not: false,
            args: vec![sb.clone(), "start".to_string()],
        };
        assert!(execute_check(present).unwrap());

        let negated = CheckArgs {
            command: "check_file".to_string(),
            not: true,
            args: vec![sb, "start".to_string()],
        };
        assert!(!execute_check(negated).unwrap());
    }

    #[test]
    fn test_condition_value_and_errors() {
        let group = ConditionArgs {
            condition: "minimum_version_for_group:5.6.41".to_string(),
        };
        assert!(!execute_condition(group, OutputFormat::Plain).unwrap());

        let unknown = ConditionArgs {
            condition: "no_such_condition".to_string(),
        };
        assert!(execute_condition(unknown, OutputFormat::Plain).is_err());
    }
}
