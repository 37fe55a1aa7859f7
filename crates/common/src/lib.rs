//! sbtest Common Library
//!
//! Shared types and helpers used by the fixture generator and the
//! verification predicates: filesystem probes, version comparison and
//! the read-only view of a deployed sandbox.

pub mod error;
pub mod probe;
pub mod sandbox;
pub mod version;

// Re-export commonly used types
pub use error::{Error, Result};
pub use sandbox::{extra_ports_for, SandboxDescription, PORT_ADJUSTMENT_80, PORT_ADJUSTMENT_THRESHOLD};
pub use version::{is_at_least, Version};

/// sbtest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default home directory, taken from `$HOME`
pub fn default_home_dir() -> std::path::PathBuf {
    std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}
