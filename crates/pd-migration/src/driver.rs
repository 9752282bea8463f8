//! Migration driver
//!
//! Detects a document's version, applies the needed run of the chain one
//! stage at a time, and checks the result. Runs are all-or-nothing: any
//! stage error aborts and no partial document is returned.

use crate::config::MigrationConfig;
use crate::error::{MigrationError, Violation};
use crate::migrator::MigrationContext;
use crate::registry::MigratorRegistry;
use crate::validate::validate;
use pd_catalog::DefinitionCatalog;
use pd_schema::{ProtocolDocument, SchemaVersion};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One applied stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    /// Stage name
    pub name: String,
    /// Version before the stage
    pub from: SchemaVersion,
    /// Version after the stage
    pub to: SchemaVersion,
    /// Command count going in
    pub commands_before: usize,
    /// Command count coming out
    pub commands_after: usize,
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Declared version of the input
    pub from: SchemaVersion,
    /// Requested target
    pub to: SchemaVersion,
    /// Applied stages, in order
    pub stages: Vec<StageReport>,
}

impl MigrationReport {
    /// Check if the document was returned as-is
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Migrated document with its report
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    /// Document at the target version
    pub document: ProtocolDocument,
    /// What was applied
    pub report: MigrationReport,
}

/// Applies the migrator chain to documents
pub struct MigrationDriver {
    registry: MigratorRegistry,
    catalog: Arc<dyn DefinitionCatalog>,
    config: MigrationConfig,
}

impl MigrationDriver {
    /// Create driver with the built-in chain and default configuration
    #[must_use]
    pub fn new(catalog: Arc<dyn DefinitionCatalog>) -> Self {
        Self {
            registry: MigratorRegistry::with_defaults(),
            catalog,
            config: MigrationConfig::default(),
        }
    }

    /// Create driver over a custom chain
    ///
    /// # Errors
    /// Returns [`MigrationError::InvalidRegistry`] if the chain is not contiguous
    pub fn with_registry(
        registry: MigratorRegistry,
        catalog: Arc<dyn DefinitionCatalog>,
    ) -> Result<Self, MigrationError> {
        registry.validate()?;
        Ok(Self {
            registry,
            catalog,
            config: MigrationConfig::default(),
        })
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Registered chain
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &MigratorRegistry {
        &self.registry
    }

    /// Migrate to the configured target version
    ///
    /// # Errors
    /// See [`MigrationDriver::migrate_to`]
    pub fn migrate(&self, doc: ProtocolDocument) -> Result<MigrationOutcome, MigrationError> {
        self.migrate_to(doc, self.config.target_version)
    }

    /// Migrate to `target`
    ///
    /// # Errors
    /// - [`MigrationError::UnsupportedVersion`] if the version is outside the chain
    /// - [`MigrationError::UnresolvableDefinition`] if a stage cannot resolve a definition
    /// - [`MigrationError::InvariantViolation`] if validation fails
    pub fn migrate_to(
        &self,
        mut doc: ProtocolDocument,
        target: SchemaVersion,
    ) -> Result<MigrationOutcome, MigrationError> {
        let from = doc.declared_version();
        let mut report = MigrationReport {
            from,
            to: target,
            stages: Vec::new(),
        };

        let plan = self.registry.plan(from, target)?;
        if plan.is_empty() {
            tracing::debug!("Document already at {}", target);
            return Ok(MigrationOutcome {
                document: doc,
                report,
            });
        }
        tracing::info!("Migrating {} -> {} ({} stage(s))", from, target, plan.len());

        let mut minter = self.config.id_strategy.minter();
        let mut ctx = MigrationContext::new(self.catalog.as_ref(), &mut minter);

        for migrator in plan {
            let before = doc.declared_version();
            let commands_before = doc.commands.len();
            doc = migrator.migrate(doc, &mut ctx)?;
            tracing::info!("Stage {} applied: {} -> {}", migrator.name(), before, migrator.to_version());

            if self.config.validate_each_stage {
                validate(&doc)?;
            }
            report.stages.push(StageReport {
                name: migrator.name().to_string(),
                from: before,
                to: migrator.to_version(),
                commands_before,
                commands_after: doc.commands.len(),
            });
        }

        let actual = doc.declared_version();
        if actual != target {
            return Err(MigrationError::InvariantViolation(vec![
                Violation::VersionMismatch {
                    expected: target,
                    actual,
                },
            ]));
        }
        if self.config.validate_output {
            validate(&doc)?;
        }

        Ok(MigrationOutcome {
            document: doc,
            report,
        })
    }

    /// Decode, migrate and re-encode a JSON document
    ///
    /// `target` defaults to the configured target version.
    ///
    /// # Errors
    /// [`MigrationError::Decode`] for malformed documents, otherwise as
    /// [`MigrationDriver::migrate_to`]
    pub fn migrate_value(
        &self,
        value: Value,
        target: Option<SchemaVersion>,
    ) -> Result<Value, MigrationError> {
        let doc: ProtocolDocument = serde_json::from_value(value)?;
        let outcome = self.migrate_to(doc, target.unwrap_or(self.config.target_version))?;
        Ok(serde_json::to_value(outcome.document)?)
    }

    /// Migrate independent documents in parallel
    ///
    /// Each document gets its own run (and id minter); results keep input order.
    pub fn migrate_batch(
        &self,
        docs: Vec<ProtocolDocument>,
    ) -> Vec<Result<MigrationOutcome, MigrationError>> {
        tracing::info!("Migrating batch of {} document(s)", docs.len());
        docs.into_par_iter().map(|doc| self.migrate(doc)).collect()
    }
}
