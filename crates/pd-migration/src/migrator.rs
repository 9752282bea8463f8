//! Migrator trait
//!
//! A migrator upgrades a document across exactly one version step. It owns
//! its input and returns a new document; the only shared state it touches is
//! the run's [`IdMinter`] and the read-only definition catalog.

use crate::error::MigrationError;
use crate::identity::IdMinter;
use pd_catalog::DefinitionCatalog;
use pd_schema::{ProtocolDocument, SchemaVersion};

/// Per-run collaborators handed to every stage
pub struct MigrationContext<'a> {
    /// Shared definition catalog
    pub catalog: &'a dyn DefinitionCatalog,
    /// Id minter for this run
    pub minter: &'a mut IdMinter,
}

impl<'a> MigrationContext<'a> {
    /// Create new context
    #[inline]
    #[must_use]
    pub fn new(catalog: &'a dyn DefinitionCatalog, minter: &'a mut IdMinter) -> Self {
        Self { catalog, minter }
    }
}

/// One version step of the chain
pub trait Migrator: Send + Sync {
    /// Stage name, by convention the version it produces
    fn name(&self) -> &'static str;

    /// Version this stage accepts
    fn from_version(&self) -> SchemaVersion;

    /// Version this stage produces
    fn to_version(&self) -> SchemaVersion;

    /// Upgrade `doc` by one step
    ///
    /// # Errors
    /// Any error aborts the whole run
    fn migrate(
        &self,
        doc: ProtocolDocument,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<ProtocolDocument, MigrationError>;
}

impl std::fmt::Debug for dyn Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrator({}: {} -> {})",
            self.name(),
            self.from_version(),
            self.to_version()
        )
    }
}
