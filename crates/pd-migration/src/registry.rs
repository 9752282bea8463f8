//! Migrator registry
//!
//! Provides [`MigratorRegistry`], the explicit ordered chain of version
//! steps. The chain is checked for gaps and overlaps before use, and
//! [`MigratorRegistry::plan`] picks the contiguous run a document needs.

use crate::error::MigrationError;
use crate::migrator::Migrator;
use crate::stages::{FixedTrashPromotion, SchemaEightTags, SplitStackedLabware};
use pd_schema::SchemaVersion;

/// Ordered chain of migrators
#[derive(Debug, Default)]
pub struct MigratorRegistry {
    migrators: Vec<Box<dyn Migrator>>,
}

impl MigratorRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrators: Vec::new(),
        }
    }

    /// Create registry with the built-in chain (6.0.0 → 8.0.0)
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SplitStackedLabware));
        registry.register(Box::new(FixedTrashPromotion));
        registry.register(Box::new(SchemaEightTags));
        registry
    }

    /// Add a migrator; the chain is kept sorted by `from_version`
    pub fn register(&mut self, migrator: Box<dyn Migrator>) {
        let pos = self
            .migrators
            .partition_point(|m| m.from_version() <= migrator.from_version());
        self.migrators.insert(pos, migrator);
    }

    /// Check the chain is non-empty, forward-moving and contiguous
    ///
    /// # Errors
    /// Returns [`MigrationError::InvalidRegistry`] naming the first problem
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.migrators.is_empty() {
            return Err(MigrationError::InvalidRegistry(
                "no migrators registered".to_string(),
            ));
        }

        for m in &self.migrators {
            if m.to_version() <= m.from_version() {
                return Err(MigrationError::InvalidRegistry(format!(
                    "stage {} does not move forward ({} -> {})",
                    m.name(),
                    m.from_version(),
                    m.to_version()
                )));
            }
        }

        for pair in self.migrators.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.from_version() != prev.to_version() {
                let problem = if next.from_version() < prev.to_version() {
                    "overlaps"
                } else {
                    "leaves a gap after"
                };
                return Err(MigrationError::InvalidRegistry(format!(
                    "stage {} ({} -> {}) {} stage {} ({} -> {})",
                    next.name(),
                    next.from_version(),
                    next.to_version(),
                    problem,
                    prev.name(),
                    prev.from_version(),
                    prev.to_version()
                )));
            }
        }

        Ok(())
    }

    /// Earliest version the chain accepts
    #[must_use]
    pub fn oldest(&self) -> Option<SchemaVersion> {
        self.migrators.first().map(|m| m.from_version())
    }

    /// Version the chain ends at
    #[must_use]
    pub fn latest(&self) -> Option<SchemaVersion> {
        self.migrators.last().map(|m| m.to_version())
    }

    /// Migrators to apply to go from `from` to `target`
    ///
    /// A version between two stage boundaries starts at the first stage that
    /// produces something newer than it.
    ///
    /// # Errors
    /// Returns [`MigrationError::UnsupportedVersion`] if `from` lies outside
    /// the chain (even when it equals `target`), postdates `target`, or
    /// `target` is not a stage boundary reachable from `from`
    pub fn plan(
        &self,
        from: SchemaVersion,
        target: SchemaVersion,
    ) -> Result<&[Box<dyn Migrator>], MigrationError> {
        let (Some(oldest), Some(latest)) = (self.oldest(), self.latest()) else {
            return Err(MigrationError::unsupported(from, "no migrators registered"));
        };
        if from < oldest {
            return Err(MigrationError::unsupported(
                from,
                format!("older than the oldest supported version {oldest}"),
            ));
        }
        if from > latest {
            return Err(MigrationError::unsupported(
                from,
                format!("newer than the latest supported version {latest}"),
            ));
        }
        if from == target {
            return Ok(&[]);
        }
        if from > target {
            return Err(MigrationError::unsupported(
                from,
                format!("newer than the target version {target}"),
            ));
        }

        let start = self
            .migrators
            .iter()
            .position(|m| m.to_version() > from)
            .ok_or_else(|| {
                MigrationError::unsupported(from, format!("target {target} is beyond the chain"))
            })?;
        let end = self
            .migrators
            .iter()
            .skip(start)
            .position(|m| m.to_version() == target)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                MigrationError::unsupported(
                    from,
                    format!("target {target} is not reachable from {from}"),
                )
            })?;

        Ok(&self.migrators[start..=end])
    }

    /// Iterate migrators in chain order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migrator> {
        self.migrators.iter().map(|m| &**m)
    }

    /// Number of registered migrators
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }
}
