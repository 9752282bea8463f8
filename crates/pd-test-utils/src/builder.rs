//! Fluent builder for protocol documents

use crate::definitions::{
    body, COMBINED_PCR, PCR_ADAPTER, PCR_PLATE, RESERVOIR, TIPRACK_300, TIPRACK_FLEX_1000,
    TRASH_OT2,
};
use pd_schema::step_form::INITIAL_DECK_SETUP_STEP_ID;
use pd_schema::{ProtocolDocument, RobotType};
use serde_json::{json, Map, Value};

pub fn slot(name: &str) -> Value {
    json!({ "slotName": name })
}

pub fn on_module(id: &str) -> Value {
    json!({ "moduleId": id })
}

pub fn on_labware(id: &str) -> Value {
    json!({ "labwareId": id })
}

/// `<instance>:<uri>` id
pub fn entity(instance: &str, uri: &str) -> String {
    format!("{instance}:{uri}")
}

/// Accumulates a document as JSON
///
/// Schema 6 documents get the legacy `pipettes`/`modules`/`labware` tables and
/// bare load params; later schemas get the descriptive fields inline.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    version: String,
    schema_version: u32,
    robot: RobotType,
    commands: Vec<Value>,
    steps: Map<String, Value>,
    ordered_step_ids: Vec<String>,
    deck_setup: Option<Map<String, Value>>,
    ingred_locations: Map<String, Value>,
    definitions: Map<String, Value>,
    pipettes: Map<String, Value>,
    modules: Map<String, Value>,
    labware: Map<String, Value>,
    next_key: usize,
}

impl DocumentBuilder {
    pub fn new(version: &str, robot: RobotType) -> Self {
        let schema_version = version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
            .unwrap();
        Self {
            version: version.to_string(),
            schema_version,
            robot,
            commands: Vec::new(),
            steps: Map::new(),
            ordered_step_ids: Vec::new(),
            deck_setup: None,
            ingred_locations: Map::new(),
            definitions: Map::new(),
            pipettes: Map::new(),
            modules: Map::new(),
            labware: Map::new(),
            next_key: 0,
        }
    }

    pub fn robot(mut self, robot: RobotType) -> Self {
        self.robot = robot;
        self
    }

    fn legacy(&self) -> bool {
        self.schema_version < 7
    }

    fn key(&mut self) -> String {
        self.next_key += 1;
        format!("k{}", self.next_key)
    }

    pub fn command(mut self, command_type: &str, params: Value) -> Self {
        let key = self.key();
        self.commands.push(json!({
            "key": key,
            "commandType": command_type,
            "params": params
        }));
        self
    }

    pub fn pipette(mut self, id: &str, mount: &str, name: &str) -> Self {
        let mut params = json!({"pipetteId": id, "mount": mount});
        if self.legacy() {
            self.pipettes.insert(id.to_string(), json!({"name": name}));
        } else {
            params["pipetteName"] = json!(name);
        }
        self.command("loadPipette", params)
    }

    pub fn module(mut self, id: &str, model: &str, location: Value) -> Self {
        let mut params = json!({"moduleId": id, "location": location});
        if self.legacy() {
            self.modules.insert(id.to_string(), json!({"model": model}));
        } else {
            params["model"] = json!(model);
        }
        self.command("loadModule", params)
    }

    pub fn labware(self, id: &str, uri: &str, location: Value, display_name: &str) -> Self {
        self.load("loadLabware", "labwareId", id, uri, location, display_name)
    }

    pub fn adapter(self, id: &str, uri: &str, location: Value, display_name: &str) -> Self {
        self.load("loadAdapter", "adapterId", id, uri, location, display_name)
    }

    fn load(
        mut self,
        command_type: &str,
        id_key: &str,
        id: &str,
        uri: &str,
        location: Value,
        display_name: &str,
    ) -> Self {
        let mut params = json!({ (id_key): id, "location": location });
        if self.legacy() {
            self.labware.insert(
                id.to_string(),
                json!({"displayName": display_name, "definitionId": uri}),
            );
        } else {
            let mut parts = uri.splitn(3, '/');
            let namespace = parts.next().unwrap();
            let load_name = parts.next().unwrap();
            let version: u32 = parts.next().unwrap().parse().unwrap();
            params["namespace"] = json!(namespace);
            params["loadName"] = json!(load_name);
            params["version"] = json!(version);
            params["displayName"] = json!(display_name);
        }
        self.definition(uri).command(command_type, params)
    }

    /// Embed the fixture body for `uri`; non-fixture URIs embed nothing
    pub fn definition(mut self, uri: &str) -> Self {
        if let Some(definition) = body(uri) {
            self.definitions.insert(uri.to_string(), definition);
        }
        self
    }

    /// Embed an arbitrary body
    pub fn definition_body(mut self, uri: &str, definition: Value) -> Self {
        self.definitions.insert(uri.to_string(), definition);
        self
    }

    pub fn step(mut self, id: &str, form: Value) -> Self {
        self.steps.insert(id.to_string(), form);
        self.ordered_step_ids.push(id.to_string());
        self
    }

    /// Initial deck setup entry: entity id → slot / module id / labware id
    pub fn deck_setup(mut self, id: &str, location: &str) -> Self {
        self.deck_setup
            .get_or_insert_with(Map::new)
            .insert(id.to_string(), json!(location));
        self
    }

    pub fn ingred(mut self, labware_id: &str, wells: Value) -> Self {
        self.ingred_locations.insert(labware_id.to_string(), wells);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut steps = self.steps.clone();
        if let Some(update) = &self.deck_setup {
            steps.insert(
                INITIAL_DECK_SETUP_STEP_ID.to_string(),
                json!({
                    "stepType": "manualIntervention",
                    "id": INITIAL_DECK_SETUP_STEP_ID,
                    "labwareLocationUpdate": update,
                    "moduleLocationUpdate": {},
                    "pipetteLocationUpdate": {}
                }),
            );
        }
        let robot = match self.robot {
            RobotType::Ot2 => json!({"model": "OT-2 Standard", "deckId": "ot2_standard"}),
            RobotType::Flex => json!({"model": "OT-3 Standard", "deckId": "ot3_standard"}),
        };

        let mut doc = json!({
            "$otSharedSchema": format!("#/protocol/schemas/{}", self.schema_version),
            "schemaVersion": self.schema_version,
            "metadata": {"protocolName": "fixture", "created": 1_700_000_000_000_u64},
            "designerApplication": {
                "name": "opentrons/protocol-designer",
                "version": self.version,
                "data": {
                    "ingredLocations": self.ingred_locations,
                    "savedStepForms": steps,
                    "orderedStepIds": self.ordered_step_ids,
                    "pipetteTiprackAssignments": {}
                }
            },
            "robot": robot,
            "labwareDefinitions": self.definitions,
            "commands": self.commands
        });
        if self.legacy() {
            doc["pipettes"] = json!(self.pipettes);
            doc["modules"] = json!(self.modules);
            doc["labware"] = json!(self.labware);
        }
        doc
    }

    pub fn build(&self) -> ProtocolDocument {
        serde_json::from_value(self.to_value()).unwrap()
    }
}

/// Schema 6 OT-2 protocol with a combined PCR adapter+plate on a heater-shaker
///
/// The fixed trash is loaded under its sentinel id, the way designer 6.x
/// wrote it, and the transfer step names it as blowout location.
pub fn v6_ot2_document() -> ProtocolDocument {
    v6_ot2_builder().build()
}

pub fn v6_ot2_builder() -> DocumentBuilder {
    let plate = entity("plate", COMBINED_PCR);
    let tips = entity("tips", TIPRACK_300);
    let res = entity("res", RESERVOIR);

    DocumentBuilder::new("6.2.0", RobotType::Ot2)
        .pipette("p1", "left", "p300_single_gen2")
        .module("hs:heaterShakerModuleType", "heaterShakerModuleV1", slot("1"))
        .labware(&plate, COMBINED_PCR, on_module("hs:heaterShakerModuleType"), "PCR plate")
        .labware(&tips, TIPRACK_300, slot("2"), "Tips")
        .labware(&res, RESERVOIR, slot("4"), "Reservoir")
        .labware("fixedTrash", TRASH_OT2, slot("12"), "Trash")
        .command("pickUpTip", json!({"pipetteId": "p1", "labwareId": tips, "wellName": "A1"}))
        .command(
            "aspirate",
            json!({"pipetteId": "p1", "labwareId": res, "wellName": "A1", "volume": 20, "flowRate": 46.43}),
        )
        .command(
            "dispense",
            json!({"pipetteId": "p1", "labwareId": plate, "wellName": "B1", "volume": 20, "flowRate": 46.43}),
        )
        .command("dropTip", json!({"pipetteId": "p1", "labwareId": "fixedTrash", "wellName": "A1"}))
        .step(
            "s1",
            json!({
                "stepType": "moveLiquid",
                "id": "s1",
                "pipette": "p1",
                "tipRack": tips,
                "aspirate_labware": res,
                "aspirate_wells": ["A1"],
                "dispense_labware": plate,
                "dispense_wells": ["B1"],
                "volume": 20,
                "blowout_checkbox": true,
                "blowout_location": "fixedTrash"
            }),
        )
        .step(
            "s2",
            json!({
                "stepType": "heaterShaker",
                "id": "s2",
                "moduleId": "hs:heaterShakerModuleType",
                "targetHeaterShakerTemperature": "37"
            }),
        )
        .deck_setup(&plate, "hs:heaterShakerModuleType")
        .deck_setup(&tips, "2")
        .deck_setup(&res, "4")
        .deck_setup("fixedTrash", "12")
        .ingred(&res, json!({"A1": {"0": {"volume": 1000}}}))
}

/// Schema 7.0 Flex protocol with an already-split adapter pair
///
/// Steps still drop tips into the sentinel trash.
pub fn v7_flex_heater_shaker() -> ProtocolDocument {
    v7_flex_builder().build()
}

pub fn v7_flex_builder() -> DocumentBuilder {
    let adapter = entity("adapter", PCR_ADAPTER);
    let plate = entity("plate", PCR_PLATE);
    let tips = entity("tips", TIPRACK_FLEX_1000);

    DocumentBuilder::new("7.0.0", RobotType::Flex)
        .pipette("p1", "left", "p1000_single_flex")
        .module("hs:heaterShakerModuleType", "heaterShakerModuleV1", slot("D1"))
        .adapter(&adapter, PCR_ADAPTER, on_module("hs:heaterShakerModuleType"), "PCR Adapter")
        .labware(&plate, PCR_PLATE, on_labware(&adapter), "PCR plate")
        .labware(&tips, TIPRACK_FLEX_1000, slot("C2"), "Tips")
        .command("pickUpTip", json!({"pipetteId": "p1", "labwareId": tips, "wellName": "A1"}))
        .command(
            "aspirate",
            json!({"pipetteId": "p1", "labwareId": plate, "wellName": "A1", "volume": 50, "flowRate": 160}),
        )
        .command(
            "dispense",
            json!({"pipetteId": "p1", "labwareId": plate, "wellName": "B2", "volume": 50, "flowRate": 160}),
        )
        .command("dropTip", json!({"pipetteId": "p1", "labwareId": "fixedTrash", "wellName": "A1"}))
        .step(
            "s1",
            json!({
                "stepType": "moveLiquid",
                "id": "s1",
                "pipette": "p1",
                "tipRack": tips,
                "aspirate_labware": plate,
                "aspirate_wells": ["A1"],
                "dispense_labware": plate,
                "dispense_wells": ["B2"],
                "volume": 50,
                "dropTip_location": "fixedTrash"
            }),
        )
        .step(
            "s2",
            json!({
                "stepType": "mix",
                "id": "s2",
                "pipette": "p1",
                "labware": plate,
                "wells": ["A1"],
                "times": 3,
                "dropTip_location": "fixedTrash"
            }),
        )
        .deck_setup(&adapter, "hs:heaterShakerModuleType")
        .deck_setup(&plate, &adapter)
        .deck_setup(&tips, "C2")
        .deck_setup("fixedTrash", "A3")
        .ingred(&plate, json!({"A1": {"0": {"volume": 100}}}))
}
