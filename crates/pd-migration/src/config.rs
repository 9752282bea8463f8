//! Migration configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! target_version = "8.0.0"
//! validate_output = true
//! validate_each_stage = false
//!
//! [id_strategy]
//! kind = "sequential"
//! prefix = "pd"
//! ```

use crate::identity::{IdMinter, SequentialIdSource, UuidIdSource};
use pd_schema::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Newest version the built-in chain produces
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(8, 0, 0);

/// How fresh entity ids are generated
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdStrategy {
    /// UUID v4 instances
    #[default]
    Random,
    /// `<prefix>-<n>` instances, reproducible across runs
    Sequential { prefix: String },
}

impl IdStrategy {
    /// Fresh minter for one run
    #[must_use]
    pub fn minter(&self) -> IdMinter {
        match self {
            Self::Random => IdMinter::new(Box::new(UuidIdSource)),
            Self::Sequential { prefix } => {
                IdMinter::new(Box::new(SequentialIdSource::new(prefix.clone())))
            }
        }
    }
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Version documents are migrated to
    pub target_version: SchemaVersion,
    /// Validate the final document
    pub validate_output: bool,
    /// Validate after every stage
    pub validate_each_stage: bool,
    /// Id generation
    pub id_strategy: IdStrategy,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With target version
    #[inline]
    #[must_use]
    pub fn with_target_version(mut self, version: SchemaVersion) -> Self {
        self.target_version = version;
        self
    }

    /// With final validation on or off
    #[inline]
    #[must_use]
    pub fn with_validate_output(mut self, enabled: bool) -> Self {
        self.validate_output = enabled;
        self
    }

    /// With per-stage validation on or off
    #[inline]
    #[must_use]
    pub fn with_validate_each_stage(mut self, enabled: bool) -> Self {
        self.validate_each_stage = enabled;
        self
    }

    /// With id strategy
    #[inline]
    #[must_use]
    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Parse TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or bad values
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_version: CURRENT_VERSION,
            validate_output: true,
            validate_each_stage: false,
            id_strategy: IdStrategy::Random,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        /// File that was asked for
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
