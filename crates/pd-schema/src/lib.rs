//! Protocol Document Schema
//!
//! Typed model of stored protocol documents across designer schema versions.
//!
//! # Core Concepts
//!
//! - [`ProtocolDocument`]: one stored protocol (deck layout, hardware, commands)
//! - [`Command`]: tagged command; load commands are typed, others opaque
//! - [`LocationReference`]: off deck, slot, module, or stacked on an adapter
//! - [`EntityId`]: `<instance>:<definitionURI>` id of a loaded entity
//! - [`EntityRef`]: step-form reference, entity or the built-in fixed trash
//! - [`SchemaVersion`]: dotted designer version tag
//!
//! # Example
//!
//! ```rust
//! use pd_schema::{ProtocolDocument, SchemaVersion};
//!
//! let doc: ProtocolDocument = serde_json::from_str(r#"{
//!     "schemaVersion": 7,
//!     "designerApplication": {"name": "opentrons/protocol-designer", "version": "7.1.0"},
//!     "commands": []
//! }"#).unwrap();
//!
//! assert_eq!(doc.declared_version(), SchemaVersion::new(7, 1, 0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod command;
pub mod document;
pub mod entity;
pub mod error;
pub mod location;
pub mod step_form;
pub mod version;

// Re-exports
pub use command::{
    Command, CommandBody, LoadAdapterParams, LoadLabwareParams, LoadModuleParams,
    LoadPipetteParams, LoadedKind,
};
pub use document::{DesignerApplication, DesignerData, ProtocolDocument, Robot, RobotType};
pub use entity::{DefinitionUri, EntityId, EntityRef, FIXED_TRASH_SENTINEL};
pub use error::SchemaError;
pub use location::LocationReference;
pub use step_form::StepForm;
pub use version::SchemaVersion;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
