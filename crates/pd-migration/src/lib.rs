//! Protocol Document Migration
//!
//! Upgrades stored protocol documents from any supported schema version to
//! the current one through an explicit, ordered chain of pure migrators.
//!
//! # Architecture
//!
//! ```text
//! JSON ──► MigrationDriver ──► plan (MigratorRegistry)
//!                │
//!                ├─► 7.0.0  split combined adapter+labware
//!                ├─► 7.1.0  promote fixed trash
//!                ├─► 8.0.0  schema 8 tags
//!                │     (each stage ends in DocumentAssembler)
//!                ▼
//!            validate ──► MigrationOutcome { document, report }
//! ```
//!
//! # Example
//!
//! ```rust
//! use pd_catalog::InMemoryCatalog;
//! use pd_migration::{MigrationDriver, SchemaVersion};
//! use std::sync::Arc;
//!
//! let driver = MigrationDriver::new(Arc::new(InMemoryCatalog::with_builtin_splits()));
//! let doc = serde_json::from_value(serde_json::json!({
//!     "schemaVersion": 8,
//!     "designerApplication": {"name": "opentrons/protocol-designer", "version": "8.0.0"},
//!     "commands": []
//! })).unwrap();
//!
//! let outcome = driver.migrate(doc).unwrap();
//! assert!(outcome.report.is_identity());
//! assert_eq!(outcome.document.declared_version(), SchemaVersion::new(8, 0, 0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod assembler;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod migrator;
pub mod registry;
pub mod stages;
pub mod validate;

// Re-exports
pub use assembler::{DocumentAssembler, SchemaTags};
pub use config::{ConfigError, IdStrategy, MigrationConfig, CURRENT_VERSION};
pub use driver::{MigrationDriver, MigrationOutcome, MigrationReport, StageReport};
pub use error::{MigrationError, Violation};
pub use identity::{
    rewrite_references, IdMinter, IdSource, RenameMap, SequentialIdSource, UuidIdSource,
};
pub use migrator::{MigrationContext, Migrator};
pub use registry::MigratorRegistry;
pub use pd_schema::{ProtocolDocument, SchemaVersion};

use pd_catalog::DefinitionCatalog;
use serde_json::Value;
use std::sync::Arc;

/// Migrate a JSON document with the built-in chain and default settings
///
/// `target` defaults to [`CURRENT_VERSION`].
///
/// # Errors
/// Any [`MigrationError`]; the caller should treat it as "file cannot be opened"
pub fn migrate(
    value: Value,
    target: Option<SchemaVersion>,
    catalog: Arc<dyn DefinitionCatalog>,
) -> Result<Value, MigrationError> {
    MigrationDriver::new(catalog).migrate_value(value, target)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
