//! Entity identifiers and definition URIs
//!
//! - [`DefinitionUri`]: `<namespace>/<loadName>/<version>` key into the definition table
//! - [`EntityId`]: `<instance>:<definitionURI>` composite id of a loaded entity
//! - [`EntityRef`]: what a step-form field points at, either a loaded entity
//!   or the built-in fixed trash fixture

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Legacy wire spelling of the built-in fixed trash
pub const FIXED_TRASH_SENTINEL: &str = "fixedTrash";

/// Definition URI: `<namespace>/<loadName>/<version>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionUri(String);

impl DefinitionUri {
    /// Build a URI from its parts
    #[must_use]
    pub fn from_parts(namespace: &str, load_name: &str, version: u32) -> Self {
        Self(format!("{namespace}/{load_name}/{version}"))
    }

    /// Raw URI string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace segment
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Load name segment
    #[must_use]
    pub fn load_name(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    /// Version segment
    #[must_use]
    pub fn version(&self) -> Option<u32> {
        self.0.rsplit('/').next().and_then(|v| v.parse().ok())
    }
}

impl FromStr for DefinitionUri {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        match segments.as_slice() {
            [namespace, load_name, version]
                if !namespace.is_empty()
                    && !load_name.is_empty()
                    && version.parse::<u32>().is_ok() =>
            {
                Ok(Self(s.to_string()))
            }
            _ => Err(SchemaError::InvalidDefinitionUri(s.to_string())),
        }
    }
}

impl Display for DefinitionUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DefinitionUri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Composite id of a loaded pipette, module, labware or adapter
///
/// Labware and adapter ids have the form `<instance>:<definitionURI>`.
/// Pipette and module ids are usually a bare instance string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing id string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Compose `<instance>:<uri>`
    #[must_use]
    pub fn compose(instance: &str, uri: &DefinitionUri) -> Self {
        Self(format!("{instance}:{uri}"))
    }

    /// Raw id string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instance part (everything before the first `:`)
    #[must_use]
    pub fn instance(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(instance, _)| instance)
    }

    /// Definition URI part, if the id is composite
    #[must_use]
    pub fn definition_uri(&self) -> Option<DefinitionUri> {
        self.0
            .split_once(':')
            .and_then(|(_, uri)| uri.parse().ok())
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Target of a step-form reference field
///
/// Older documents point at the built-in trash with a bare sentinel string.
/// Decoding maps that string to [`EntityRef::FixedTrash`] so nothing downstream
/// has to compare against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityRef {
    /// Built-in fixed trash with no load command
    FixedTrash,
    /// Loaded entity
    Entity(EntityId),
}

impl EntityRef {
    /// Interpret a raw reference string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == FIXED_TRASH_SENTINEL {
            Self::FixedTrash
        } else {
            Self::Entity(EntityId::new(raw))
        }
    }

    /// Wire spelling
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::FixedTrash => FIXED_TRASH_SENTINEL,
            Self::Entity(id) => id.as_str(),
        }
    }

    /// Loaded entity id, if any
    #[must_use]
    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            Self::FixedTrash => None,
            Self::Entity(id) => Some(id),
        }
    }
}

impl From<String> for EntityRef {
    fn from(raw: String) -> Self {
        if raw == FIXED_TRASH_SENTINEL {
            Self::FixedTrash
        } else {
            Self::Entity(EntityId(raw))
        }
    }
}

impl From<EntityRef> for String {
    fn from(r: EntityRef) -> Self {
        match r {
            EntityRef::FixedTrash => FIXED_TRASH_SENTINEL.to_string(),
            EntityRef::Entity(id) => id.0,
        }
    }
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_uri_parts() {
        let uri: DefinitionUri = "opentrons/nest_96_wellplate_200ul_flat/2".parse().unwrap();
        assert_eq!(uri.namespace(), "opentrons");
        assert_eq!(uri.load_name(), "nest_96_wellplate_200ul_flat");
        assert_eq!(uri.version(), Some(2));
        assert_eq!(
            DefinitionUri::from_parts("opentrons", "nest_96_wellplate_200ul_flat", 2),
            uri
        );
    }

    #[test]
    fn definition_uri_rejects_bad_shapes() {
        assert!("opentrons/plate".parse::<DefinitionUri>().is_err());
        assert!("opentrons/plate/x".parse::<DefinitionUri>().is_err());
        assert!("/plate/1".parse::<DefinitionUri>().is_err());
    }

    #[test]
    fn entity_id_splits_at_first_colon() {
        let uri: DefinitionUri = "opentrons/opentrons_96_pcr_adapter/1".parse().unwrap();
        let id = EntityId::compose("abc-123", &uri);
        assert_eq!(id.as_str(), "abc-123:opentrons/opentrons_96_pcr_adapter/1");
        assert_eq!(id.instance(), "abc-123");
        assert_eq!(id.definition_uri(), Some(uri));
    }

    #[test]
    fn bare_entity_id_has_no_uri() {
        let id = EntityId::new("pipette-1");
        assert_eq!(id.instance(), "pipette-1");
        assert_eq!(id.definition_uri(), None);
    }

    #[test]
    fn entity_ref_recognizes_sentinel() {
        assert_eq!(EntityRef::parse("fixedTrash"), EntityRef::FixedTrash);
        assert_eq!(
            EntityRef::parse("x:opentrons/a/1"),
            EntityRef::Entity(EntityId::new("x:opentrons/a/1"))
        );
        assert_eq!(EntityRef::FixedTrash.as_str(), FIXED_TRASH_SENTINEL);
        assert!(EntityRef::FixedTrash.entity().is_none());
    }

    #[test]
    fn entity_ref_serde_uses_wire_string() {
        let json = serde_json::to_string(&EntityRef::FixedTrash).unwrap();
        assert_eq!(json, "\"fixedTrash\"");
        let back: EntityRef = serde_json::from_str("\"trash-1\"").unwrap();
        assert_eq!(back, EntityRef::Entity(EntityId::new("trash-1")));
    }
}
