//! Dotted version parsing and comparison

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A `major.minor.patch` release number.
///
/// Field order gives the derived `Ord` its lexicographic meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl From<[u32; 3]> for Version {
    fn from(triple: [u32; 3]) -> Self {
        Self::new(triple[0], triple[1], triple[2])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = |reason: String| Error::VersionParse {
            version: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(parse_err(format!(
                "expected 3 dotted components, found {}",
                parts.len()
            )));
        }

        let mut triple = [0u32; 3];
        for (slot, part) in triple.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(parse_err(format!("component '{}' is not a number", part)));
            }
            *slot = part
                .parse()
                .map_err(|e| parse_err(format!("component '{}': {}", part, e)))?;
        }
        Ok(Version::from(triple))
    }
}

/// Reports whether `version` is greater than or equal to `threshold`.
///
/// A malformed version is an error, never "not greater".
pub fn is_at_least(version: &str, threshold: [u32; 3]) -> Result<bool> {
    let parsed: Version = version.parse()?;
    Ok(parsed >= Version::from(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("8.0.29", [8, 0, 1], true ; "newer patch")]
    #[test_case("5.7.31", [8, 0, 1], false ; "older major")]
    #[test_case("8.0.1", [8, 0, 1], true ; "boundary inclusive")]
    #[test_case("8.0.0", [8, 0, 1], false ; "just below")]
    #[test_case("10.0.0", [8, 0, 1], true ; "two digit major")]
    #[test_case("8.1.0", [8, 0, 30], true ; "minor dominates patch")]
    fn test_is_at_least(version: &str, threshold: [u32; 3], expected: bool) {
        assert_eq!(is_at_least(version, threshold).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("8.0" ; "two components")]
    #[test_case("8.0.29.1" ; "four components")]
    #[test_case("8.0.x" ; "non numeric")]
    #[test_case("8.0.29-rc" ; "suffix")]
    #[test_case("-8.0.1" ; "negative")]
    #[test_case("+8.0.1" ; "explicit plus sign")]
    #[test_case("8. 0.1" ; "inner whitespace")]
    #[test_case("8..1" ; "empty component")]
    fn test_malformed_version_is_error(version: &str) {
        let err = is_at_least(version, [8, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::VersionParse { .. }));
    }

    #[test]
    fn test_display_round_trips_trimmed_input() {
        let v: Version = " 5.7.31 ".parse().unwrap();
        assert_eq!(v.to_string(), "5.7.31");
        assert_eq!(v, Version::new(5, 7, 31));
    }
}
