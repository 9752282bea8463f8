//! Labware Definition Catalog
//!
//! Resolves definition URIs to definition metadata: identity, display name,
//! adapter/module/labware classification and well geometry.
//!
//! # Example
//!
//! ```rust
//! use pd_catalog::{DefinitionCatalog, DefinitionKind, InMemoryCatalog};
//!
//! let catalog = InMemoryCatalog::with_builtin_splits();
//! let kind = catalog
//!     .kind_of("opentrons/opentrons_96_pcr_adapter_nest_wellplate_100ul_pcr_full_skirt/1")
//!     .unwrap();
//! assert!(matches!(kind, DefinitionKind::Stacked { .. }));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod catalog;
pub mod definition;
pub mod error;
pub mod splits;

// Re-exports
pub use catalog::{DefinitionCatalog, InMemoryCatalog, LayeredCatalog};
pub use definition::{DefinitionKind, LabwareDefinition, Well, WellGeometry, WellShape};
pub use error::CatalogError;
pub use splits::SplitPair;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
