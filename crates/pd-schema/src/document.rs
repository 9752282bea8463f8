//! Protocol document
//!
//! The persisted description of a robot program: deck layout, loaded
//! hardware, and a command list, tagged with the designer version that wrote
//! it. Keys the model does not name are kept in `extra` maps so that a
//! migration only changes what it means to change.

use crate::command::Command;
use crate::entity::EntityId;
use crate::step_form::StepForm;
use crate::version::SchemaVersion;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Robot family the protocol targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RobotType {
    /// OT-2
    #[default]
    #[serde(rename = "OT-2 Standard")]
    Ot2,
    /// Flex
    #[serde(rename = "OT-3 Standard")]
    Flex,
}

/// `robot` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Robot {
    /// Robot model
    #[serde(default)]
    pub model: RobotType,
    /// Deck definition id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<String>,
}

/// `designerApplication.data`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignerData {
    /// Liquid placement: labware id → well → liquid → volume
    #[serde(default)]
    pub ingred_locations: IndexMap<String, Value>,
    /// Step id → step-form record
    #[serde(default)]
    pub saved_step_forms: IndexMap<String, StepForm>,
    /// Step execution order
    #[serde(default)]
    pub ordered_step_ids: Vec<String>,
    /// Pipette id → tiprack definition URI(s)
    #[serde(default)]
    pub pipette_tiprack_assignments: IndexMap<String, Value>,
    /// Fields this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `designerApplication`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignerApplication {
    /// Designer application name
    #[serde(default)]
    pub name: String,
    /// Schema-version tag read by the migration driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
    /// Designer state
    #[serde(default)]
    pub data: DesignerData,
}

/// A stored protocol at one schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDocument {
    /// `$otSharedSchema`
    #[serde(rename = "$otSharedSchema", default, skip_serializing_if = "Option::is_none")]
    pub shared_schema: Option<String>,
    /// Major schema version
    pub schema_version: u32,
    /// Protocol metadata (author, description, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Designer application block
    #[serde(default)]
    pub designer_application: DesignerApplication,
    /// Target robot
    #[serde(default)]
    pub robot: Robot,
    /// Definition URI → definition body
    #[serde(default)]
    pub labware_definitions: IndexMap<String, Value>,
    /// Command list in execution order
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Pass-through top-level keys (liquids, schema ids, legacy tables)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProtocolDocument {
    /// Version the document declares
    ///
    /// Reads `designerApplication.version`, falling back to
    /// `<schemaVersion>.0.0` when the designer tag is missing.
    #[must_use]
    pub fn declared_version(&self) -> SchemaVersion {
        self.designer_application
            .version
            .unwrap_or_else(|| SchemaVersion::new(u64::from(self.schema_version), 0, 0))
    }

    /// Designer data shortcut
    #[inline]
    #[must_use]
    pub fn designer_data(&self) -> &DesignerData {
        &self.designer_application.data
    }

    /// Ids introduced by load commands, in command order
    pub fn loaded_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.commands
            .iter()
            .filter_map(|c| c.loaded_entity().map(|(id, _)| id))
    }

    /// Pass-through top-level value
    #[must_use]
    pub fn extra_value(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBody;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn v6_json() -> Value {
        json!({
            "$otSharedSchema": "#/protocol/schemas/6",
            "schemaVersion": 6,
            "metadata": {"protocolName": "demo"},
            "designerApplication": {
                "name": "opentrons/protocol-designer",
                "version": "6.2.0",
                "data": {
                    "ingredLocations": {"plate:opentrons/x/1": {"A1": {"0": {"volume": 50}}}},
                    "savedStepForms": {
                        "__INITIAL_DECK_SETUP_STEP__": {
                            "stepType": "manualIntervention",
                            "id": "__INITIAL_DECK_SETUP_STEP__",
                            "labwareLocationUpdate": {"plate:opentrons/x/1": "1"}
                        }
                    },
                    "orderedStepIds": [],
                    "defaultValues": {"aspirate_mmFromBottom": 1}
                }
            },
            "robot": {"model": "OT-2 Standard", "deckId": "ot2_standard"},
            "pipettes": {"p1": {"name": "p300_single_gen2"}},
            "labware": {"plate:opentrons/x/1": {"displayName": "X", "definitionId": "opentrons/x/1"}},
            "labwareDefinitions": {},
            "commands": [
                {"key": "a", "commandType": "loadPipette", "params": {"pipetteId": "p1", "mount": "left"}},
                {"key": "b", "commandType": "loadLabware", "params": {"labwareId": "plate:opentrons/x/1", "location": {"slotName": "1"}}}
            ]
        })
    }

    #[test]
    fn decodes_schema_six_document() {
        let doc: ProtocolDocument = serde_json::from_value(v6_json()).unwrap();
        assert_eq!(doc.schema_version, 6);
        assert_eq!(doc.declared_version(), SchemaVersion::new(6, 2, 0));
        assert_eq!(doc.robot.model, RobotType::Ot2);
        assert_eq!(doc.commands.len(), 2);
        assert!(matches!(doc.commands[0].body, CommandBody::LoadPipette(_)));
        assert!(doc.extra_value("pipettes").is_some());
        assert!(doc.designer_data().extra.contains_key("defaultValues"));
        assert_eq!(doc.loaded_ids().count(), 2);
    }

    #[test]
    fn round_trips_pass_through_keys() {
        let doc: ProtocolDocument = serde_json::from_value(v6_json()).unwrap();
        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(encoded["labware"], v6_json()["labware"]);
        assert_eq!(encoded["metadata"], v6_json()["metadata"]);
        assert_eq!(
            encoded["designerApplication"]["data"]["defaultValues"],
            json!({"aspirate_mmFromBottom": 1})
        );
    }

    #[test]
    fn falls_back_to_schema_version_number() {
        let mut raw = v6_json();
        raw["designerApplication"]
            .as_object_mut()
            .unwrap()
            .remove("version");
        let doc: ProtocolDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.declared_version(), SchemaVersion::new(6, 0, 0));
    }

    #[test]
    fn flex_robot_model() {
        let mut raw = v6_json();
        raw["robot"] = json!({"model": "OT-3 Standard"});
        let doc: ProtocolDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.robot.model, RobotType::Flex);
    }
}
