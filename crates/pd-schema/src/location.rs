//! Location references
//!
//! Provides [`LocationReference`], the tagged reference to where a loaded
//! entity sits.

use crate::entity::EntityId;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Wire keyword for the off-deck location
pub const OFF_DECK: &str = "offDeck";

/// Where an entity sits
///
/// Wire shapes:
/// - `"offDeck"`
/// - `{ "slotName": "A3" }`
/// - `{ "moduleId": "<id>" }`
/// - `{ "labwareId": "<id>" }` (stacked on an adapter)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLocation", into = "RawLocation")]
pub enum LocationReference {
    /// Not on the deck
    OffDeck,
    /// Directly in a deck slot
    Slot(String),
    /// On top of a module
    Module(EntityId),
    /// Stacked on another labware or adapter instance
    Labware(EntityId),
}

impl LocationReference {
    /// Slot location
    #[inline]
    #[must_use]
    pub fn slot(name: impl Into<String>) -> Self {
        Self::Slot(name.into())
    }

    /// Entity this location points at, if any
    #[must_use]
    pub fn referenced_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Module(id) | Self::Labware(id) => Some(id),
            Self::OffDeck | Self::Slot(_) => None,
        }
    }

    /// Flat string used by the initial deck setup step
    ///
    /// Slot names, module ids and labware ids share one string space there.
    #[must_use]
    pub fn to_deck_setup_value(&self) -> String {
        match self {
            Self::OffDeck => OFF_DECK.to_string(),
            Self::Slot(name) => name.clone(),
            Self::Module(id) | Self::Labware(id) => id.to_string(),
        }
    }
}

impl Display for LocationReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffDeck => f.write_str(OFF_DECK),
            Self::Slot(name) => write!(f, "slot {name}"),
            Self::Module(id) => write!(f, "module {id}"),
            Self::Labware(id) => write!(f, "labware {id}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawLocation {
    Keyword(String),
    Object(RawLocationObject),
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocationObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    slot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labware_id: Option<EntityId>,
}

impl TryFrom<RawLocation> for LocationReference {
    type Error = SchemaError;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        match raw {
            RawLocation::Keyword(word) if word == OFF_DECK => Ok(Self::OffDeck),
            RawLocation::Keyword(word) => Err(SchemaError::InvalidLocation(format!(
                "unknown keyword '{word}'"
            ))),
            RawLocation::Object(obj) => match (obj.slot_name, obj.module_id, obj.labware_id) {
                (Some(slot), None, None) => Ok(Self::Slot(slot)),
                (None, Some(module), None) => Ok(Self::Module(module)),
                (None, None, Some(labware)) => Ok(Self::Labware(labware)),
                (None, None, None) => Err(SchemaError::InvalidLocation(
                    "empty location object".to_string(),
                )),
                _ => Err(SchemaError::InvalidLocation(
                    "location object names more than one target".to_string(),
                )),
            },
        }
    }
}

impl From<LocationReference> for RawLocation {
    fn from(location: LocationReference) -> Self {
        match location {
            LocationReference::OffDeck => Self::Keyword(OFF_DECK.to_string()),
            LocationReference::Slot(slot) => Self::Object(RawLocationObject {
                slot_name: Some(slot),
                ..RawLocationObject::default()
            }),
            LocationReference::Module(module) => Self::Object(RawLocationObject {
                module_id: Some(module),
                ..RawLocationObject::default()
            }),
            LocationReference::Labware(labware) => Self::Object(RawLocationObject {
                labware_id: Some(labware),
                ..RawLocationObject::default()
            }),
        }
    }
}
