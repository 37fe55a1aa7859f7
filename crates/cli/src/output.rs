//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use sbtest_e2e::script::{Outcome, ScriptResult};
use sbtest_e2e::SuiteResult;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

fn outcome_cell(outcome: &Outcome) -> Cell {
    match outcome {
        Outcome::Passed => Cell::new("passed").fg(Color::Green),
        Outcome::Skipped { .. } => Cell::new("skipped").fg(Color::Yellow),
        Outcome::Failed { .. } => Cell::new("failed").fg(Color::Red),
    }
}

fn outcome_detail(result: &ScriptResult) -> String {
    match &result.outcome {
        Outcome::Passed => String::new(),
        Outcome::Skipped { reason } => reason.clone(),
        Outcome::Failed { line, message } => format!("line {}: {}", line, message),
    }
}

/// Print a suite of group results
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(suite).unwrap_or_default());
            return;
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["GROUP", "FIXTURE", "STATUS", "TIME", "DETAIL"]);

            for group in &suite.groups {
                if let Some(error) = &group.error {
                    table.add_row(vec![
                        Cell::new(&group.name),
                        Cell::new("-"),
                        Cell::new("error").fg(Color::Red),
                        Cell::new(format!("{} ms", group.duration_ms)),
                        Cell::new(error),
                    ]);
                }
                for script in &group.scripts {
                    table.add_row(vec![
                        Cell::new(&group.name),
                        Cell::new(&script.name),
                        outcome_cell(&script.outcome),
                        Cell::new(format!("{} ms", script.duration_ms)),
                        Cell::new(outcome_detail(script)),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            for group in &suite.groups {
                for script in &group.scripts {
                    let marker = match script.outcome {
                        Outcome::Passed => "✓".green(),
                        Outcome::Skipped { .. } => "-".yellow(),
                        Outcome::Failed { .. } => "✗".red(),
                    };
                    println!("{} {}/{} {}", marker, group.name, script.name, outcome_detail(script).as_str().dimmed());
                }
                if let Some(error) = &group.error {
                    println!("{} {} {}", "✗".red(), group.name, error);
                }
            }
        }
    }

    println!("{}", "━".repeat(60).dimmed());
    let summary = format!(
        "{} passed, {} failed, {} skipped ({} ms)",
        suite.passed, suite.failed, suite.skipped, suite.duration_ms
    );
    if suite.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

/// Print a simple message
pub fn print_message(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "message": message }));
        }
        _ => {
            println!("{}", message);
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
