//! Definition bodies used across tests

use pd_catalog::InMemoryCatalog;
use serde_json::{json, Value};

pub const TIPRACK_300: &str = "opentrons/opentrons_96_tiprack_300ul/1";
pub const TIPRACK_FLEX_1000: &str = "opentrons/opentrons_flex_96_tiprack_1000ul/1";
pub const RESERVOIR: &str = "opentrons/nest_12_reservoir_15ml/1";
pub const PCR_ADAPTER: &str = "opentrons/opentrons_96_pcr_adapter/1";
pub const PCR_PLATE: &str = "opentrons/nest_96_wellplate_100ul_pcr_full_skirt/2";
pub const COMBINED_PCR: &str =
    "opentrons/opentrons_96_pcr_adapter_nest_wellplate_100ul_pcr_full_skirt/1";
pub const TRASH_OT2: &str = "opentrons/opentrons_1_trash_1100ml_fixed/1";
pub const TRASH_FLEX: &str = "opentrons/opentrons_1_trash_3200ml_fixed/1";

/// Plain labware body with four circular wells
pub fn labware_body(load_name: &str, version: u32, display_name: &str, category: &str) -> Value {
    let mut wells = serde_json::Map::new();
    for (name, x, y) in [("A1", 14.38, 74.24), ("B1", 14.38, 65.24), ("A2", 23.38, 74.24), ("B2", 23.38, 65.24)] {
        wells.insert(
            name.to_string(),
            json!({
                "depth": 14.78,
                "totalLiquidVolume": 100,
                "shape": "circular",
                "diameter": 5.5,
                "x": x,
                "y": y,
                "z": 1.0
            }),
        );
    }
    json!({
        "namespace": "opentrons",
        "version": version,
        "schemaVersion": 2,
        "parameters": {"loadName": load_name, "format": "96Standard", "isTiprack": category == "tipRack"},
        "metadata": {"displayName": display_name, "displayCategory": category},
        "wells": wells
    })
}

/// Adapter body
pub fn adapter_body(load_name: &str, version: u32, display_name: &str) -> Value {
    json!({
        "namespace": "opentrons",
        "version": version,
        "schemaVersion": 2,
        "parameters": {"loadName": load_name, "format": "96Standard", "isTiprack": false},
        "metadata": {"displayName": display_name, "displayCategory": "adapter"},
        "allowedRoles": ["adapter"],
        "wells": {}
    })
}

/// Fixed trash body
pub fn trash_body(load_name: &str, display_name: &str) -> Value {
    json!({
        "namespace": "opentrons",
        "version": 1,
        "schemaVersion": 2,
        "parameters": {"loadName": load_name, "format": "trash", "isTiprack": false},
        "metadata": {"displayName": display_name, "displayCategory": "trash"},
        "wells": {
            "A1": {
                "depth": 0,
                "totalLiquidVolume": 1_100_000,
                "shape": "rectangular",
                "xDimension": 172.86,
                "yDimension": 165.86,
                "x": 82.84, "y": 80, "z": 82
            }
        }
    })
}

/// Every body the fixture catalog knows, keyed by URI
pub fn all_bodies() -> Vec<(&'static str, Value)> {
    vec![
        (TIPRACK_300, labware_body("opentrons_96_tiprack_300ul", 1, "Opentrons 96 Tip Rack 300 µL", "tipRack")),
        (TIPRACK_FLEX_1000, labware_body("opentrons_flex_96_tiprack_1000ul", 1, "Opentrons Flex 96 Tip Rack 1000 µL", "tipRack")),
        (RESERVOIR, labware_body("nest_12_reservoir_15ml", 1, "NEST 12 Well Reservoir 15 mL", "reservoir")),
        (PCR_ADAPTER, adapter_body("opentrons_96_pcr_adapter", 1, "Opentrons 96 PCR Heater-Shaker Adapter")),
        (PCR_PLATE, labware_body("nest_96_wellplate_100ul_pcr_full_skirt", 2, "NEST 96 Well Plate 100 µL PCR Full Skirt", "wellPlate")),
        (COMBINED_PCR, labware_body(
            "opentrons_96_pcr_adapter_nest_wellplate_100ul_pcr_full_skirt",
            1,
            "Opentrons 96 PCR Heater-Shaker Adapter with NEST Well Plate 100 µl",
            "aluminumBlock",
        )),
        (TRASH_OT2, trash_body("opentrons_1_trash_1100ml_fixed", "Opentrons Fixed Trash")),
        (TRASH_FLEX, trash_body("opentrons_1_trash_3200ml_fixed", "Opentrons Fixed Trash")),
    ]
}

/// Body for one fixture URI, `None` for anything else
pub fn body(uri: &str) -> Option<Value> {
    all_bodies()
        .into_iter()
        .find(|(u, _)| *u == uri)
        .map(|(_, b)| b)
}

/// Catalog with every fixture body and the built-in split table
pub fn fixture_catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::with_builtin_splits();
    for (_, body) in all_bodies() {
        catalog
            .insert_value(body)
            .expect("fixture definitions parse");
    }
    catalog
}
