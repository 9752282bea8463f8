//! Designer schema versions
//!
//! Provides [`SchemaVersion`], the dotted version tag a protocol document
//! carries in `designerApplication.version`.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Dotted `major.minor.patch` version of a protocol document
///
/// Ordering is numeric per component, so `7.10.0 > 7.9.0`.
///
/// # Examples
/// - `"7"` → `7.0.0`
/// - `"7.1"` → `7.1.0`
/// - `"8.0.0"` → `8.0.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl SchemaVersion {
    /// Create version from components
    #[inline]
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Major component
    #[inline]
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.major
    }

    /// Minor component
    #[inline]
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component
    #[inline]
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.patch
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SchemaError::invalid_version(s, "empty version"));
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for segment in trimmed.split('.') {
            if count == parts.len() {
                return Err(SchemaError::invalid_version(s, "more than three components"));
            }
            parts[count] = segment
                .parse::<u64>()
                .map_err(|_| SchemaError::invalid_version(s, format!("bad component '{segment}'")))?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_versions() {
        assert_eq!("7".parse::<SchemaVersion>().unwrap(), SchemaVersion::new(7, 0, 0));
        assert_eq!("7.1".parse::<SchemaVersion>().unwrap(), SchemaVersion::new(7, 1, 0));
        assert_eq!(
            "6.2.1".parse::<SchemaVersion>().unwrap(),
            SchemaVersion::new(6, 2, 1)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<SchemaVersion>().is_err());
        assert!("7.x".parse::<SchemaVersion>().is_err());
        assert!("1.2.3.4".parse::<SchemaVersion>().is_err());
        assert!("8.0.0-beta".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn orders_numerically() {
        let a: SchemaVersion = "7.9.0".parse().unwrap();
        let b: SchemaVersion = "7.10.0".parse().unwrap();
        assert!(a < b);
        assert!(SchemaVersion::new(6, 9, 9) < SchemaVersion::new(7, 0, 0));
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&SchemaVersion::new(7, 1, 0)).unwrap();
        assert_eq!(json, "\"7.1.0\"");

        let back: SchemaVersion = serde_json::from_str("\"8\"").unwrap();
        assert_eq!(back, SchemaVersion::new(8, 0, 0));
    }
}
