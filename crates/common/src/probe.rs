//! Filesystem existence probes

use std::path::Path;

/// Reports whether `path` exists and is a directory.
pub fn dir_exists(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Reports whether anything (file, directory, special file) exists at `path`.
///
/// Symlinks are followed, so a dangling link counts as absent.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path).is_ok()
}

/// Reports whether `path` exists and is a regular file.
pub fn is_file(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(dir_exists(tmp.path()));
        assert!(file_exists(tmp.path()));
        assert!(!is_file(tmp.path()));
    }

    #[test]
    fn test_probe_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("msandbox.err");
        std::fs::write(&file, "ok").unwrap();

        assert!(file_exists(&file));
        assert!(is_file(&file));
        assert!(!dir_exists(&file));
    }

    #[test]
    fn test_probe_missing_path() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(!file_exists(&missing));
        assert!(!dir_exists(&missing));
        assert!(!is_file(&missing));
    }
}
