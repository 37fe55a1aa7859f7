//! sbtest fixture and verification framework
//!
//! This crate turns a directory of parameterized templates into one
//! fixture tree per database version and runs those fixtures against
//! sandboxes deployed by an external tool:
//! - Renders `*.tmpl` templates into `<output>/<label>/<name>_<label>.txt`
//! - Parses and runs fixtures as line-oriented scripts
//! - Registers the sandbox verification commands and conditions
//! - Drives setup, run and teardown and reports the results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Harness Driver (runner)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── setup()        -> fixtures::generate() per version   │
//! │    ├── run_groups()   -> script::run_script() per fixture   │
//! │    └── teardown()     -> remove output root                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Script vocabulary                                          │
//! │    ├── find_errors, check_file, sleep, check_ports          │
//! │    └── minimum_version_for_group, exists_within_seconds     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod conditions;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod predicates;
pub mod runner;
pub mod script;
pub mod template;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use fixtures::{generate, ParamSet};
pub use runner::{RunReport, SuiteResult, TestRunner};
pub use script::{CommandRegistry, EngineParams, Script, ScriptState};
