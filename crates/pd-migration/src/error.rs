//! Error types for the migration pipeline
//!
//! Every failure is fatal for the document being migrated; there is no
//! partial result.

use pd_schema::{SchemaError, SchemaVersion};
use std::fmt::{self, Display, Formatter};

/// Migration failure
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Document version is outside the known chain
    #[error("unsupported protocol version {version}: {reason}")]
    UnsupportedVersion {
        /// Version the document declares
        version: SchemaVersion,
        /// Why the chain cannot take it
        reason: String,
    },

    /// A referenced definition could not be resolved
    #[error("cannot resolve definition '{uri}' for entity '{entity}'")]
    UnresolvableDefinition {
        /// URI that failed to resolve
        uri: String,
        /// Entity whose load needed it
        entity: String,
    },

    /// Structural invariant broken by a migrator
    #[error("invariant violated: {}", ViolationList(.0))]
    InvariantViolation(Vec<Violation>),

    /// Migrator chain is empty, overlapping or has gaps
    #[error("invalid migrator registry: {0}")]
    InvalidRegistry(String),

    /// Document model error
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Document JSON could not be decoded or encoded
    #[error("cannot decode document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl MigrationError {
    /// Create unsupported version error
    pub fn unsupported(version: SchemaVersion, reason: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            version,
            reason: reason.into(),
        }
    }

    /// Create unresolvable definition error
    pub fn unresolvable(uri: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::UnresolvableDefinition {
            uri: uri.into(),
            entity: entity.into(),
        }
    }

    /// Violations carried by an invariant error
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::InvariantViolation(v) => v,
            _ => &[],
        }
    }
}

/// One broken structural invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two load commands introduce the same id
    DuplicateLoad {
        /// Repeated id
        id: String,
    },
    /// Two top-level entities in one slot
    SlotOccupied {
        /// Deck slot name
        slot: String,
        /// Entity loaded there first
        first: String,
        /// Entity loaded there second
        second: String,
    },
    /// Two entities on one module
    ModuleOccupied {
        /// Module id
        module: String,
        /// Entity placed on it first
        first: String,
        /// Entity placed on it second
        second: String,
    },
    /// Two labware stacked on one adapter
    AdapterOccupied {
        /// Adapter id
        adapter: String,
        /// Labware stacked on it first
        first: String,
        /// Labware stacked on it second
        second: String,
    },
    /// Location names an entity that was not loaded before it
    UnknownLocation {
        /// Entity being placed
        entity: String,
        /// Location it names
        target: String,
    },
    /// `moduleId` location whose referent is not a module
    NotAModule {
        /// Entity being placed
        entity: String,
        /// Non-module it names
        target: String,
    },
    /// `labwareId` location whose referent is not an adapter
    NotAnAdapter {
        /// Entity being placed
        entity: String,
        /// Non-adapter it names
        target: String,
    },
    /// Operation command names an entity that is never loaded
    DanglingCommandReference {
        /// `commandType` of the command
        command_type: String,
        /// Command key, empty when absent
        key: String,
        /// Unknown id
        id: String,
    },
    /// Step-form field names an entity that is never loaded
    DanglingStepReference {
        /// Step id
        step: String,
        /// Field holding the reference
        field: String,
        /// Unknown id
        id: String,
    },
    /// Deck setup or liquid map keyed by an entity that is never loaded
    DanglingMapKey {
        /// `labwareLocationUpdate` or `ingredLocations`
        map: String,
        /// Unknown id
        id: String,
    },
    /// Fixed-trash sentinel present at a version that no longer allows it
    SurvivingSentinel {
        /// Where it was found
        at: String,
    },
    /// Final document does not carry the requested version
    VersionMismatch {
        /// Requested target
        expected: SchemaVersion,
        /// Version the document ended at
        actual: SchemaVersion,
    },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateLoad { id } => write!(f, "'{id}' is loaded more than once"),
            Self::SlotOccupied {
                slot,
                first,
                second,
            } => write!(f, "slot {slot} holds both '{first}' and '{second}'"),
            Self::ModuleOccupied {
                module,
                first,
                second,
            } => write!(f, "module '{module}' holds both '{first}' and '{second}'"),
            Self::AdapterOccupied {
                adapter,
                first,
                second,
            } => write!(f, "adapter '{adapter}' holds both '{first}' and '{second}'"),
            Self::UnknownLocation { entity, target } => {
                write!(f, "'{entity}' is placed on '{target}', which is not loaded before it")
            }
            Self::NotAModule { entity, target } => {
                write!(f, "'{entity}' is placed on '{target}' as a module, but it is not one")
            }
            Self::NotAnAdapter { entity, target } => {
                write!(f, "'{entity}' is stacked on '{target}', which is not an adapter")
            }
            Self::DanglingCommandReference {
                command_type,
                key,
                id,
            } => write!(f, "{command_type} command '{key}' references unloaded '{id}'"),
            Self::DanglingStepReference { step, field, id } => {
                write!(f, "step '{step}' field {field} references unloaded '{id}'")
            }
            Self::DanglingMapKey { map, id } => write!(f, "{map} is keyed by unloaded '{id}'"),
            Self::SurvivingSentinel { at } => write!(f, "fixed-trash sentinel remains in {at}"),
            Self::VersionMismatch { expected, actual } => {
                write!(f, "expected version {expected}, document is at {actual}")
            }
        }
    }
}

struct ViolationList<'a>(&'a [Violation]);

impl Display for ViolationList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            Display::fmt(violation, f)?;
        }
        Ok(())
    }
}
