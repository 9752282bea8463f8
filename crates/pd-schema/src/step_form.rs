//! Step-form conventions
//!
//! Step forms are free-form records keyed by field name. The names below are
//! the ones that hold entity references; everything else is opaque.

use crate::entity::EntityRef;
use serde_json::{Map, Value};

/// A saved step form
pub type StepForm = Map<String, Value>;

/// Id of the manual "initial deck setup" step
pub const INITIAL_DECK_SETUP_STEP_ID: &str = "__INITIAL_DECK_SETUP_STEP__";

/// Labware/adapter id → location string
pub const LABWARE_LOCATION_UPDATE: &str = "labwareLocationUpdate";
/// Module id → slot
pub const MODULE_LOCATION_UPDATE: &str = "moduleLocationUpdate";
/// Pipette id → mount
pub const PIPETTE_LOCATION_UPDATE: &str = "pipetteLocationUpdate";

/// Deck setup maps whose keys are entity ids
pub const LOCATION_UPDATE_FIELDS: &[&str] = &[
    LABWARE_LOCATION_UPDATE,
    MODULE_LOCATION_UPDATE,
    PIPETTE_LOCATION_UPDATE,
];

/// Fields that always name a loaded entity
pub const ENTITY_REFERENCE_FIELDS: &[&str] = &[
    "labware",
    "aspirate_labware",
    "dispense_labware",
    "pipette",
    "moduleId",
    "tipRack",
    "dropTip_location",
];

/// Fields that name an entity or hold a keyword/slot
pub const LOCATION_REFERENCE_FIELDS: &[&str] = &["blowout_location", "newLocation"];

/// Operation-command params keys holding entity ids
pub const COMMAND_ID_KEYS: &[&str] = &["labwareId", "pipetteId", "moduleId", "adapterId"];

/// `stepType` field name
pub const STEP_TYPE: &str = "stepType";
/// Drop-tip location field, explicit since 7.1
pub const DROP_TIP_LOCATION: &str = "dropTip_location";

/// Step types that drop tips after running
pub const TIP_DROPPING_STEP_TYPES: &[&str] = &["moveLiquid", "mix"];

/// Check if a field holds a reference by naming convention
#[inline]
#[must_use]
pub fn is_reference_field(name: &str) -> bool {
    ENTITY_REFERENCE_FIELDS.contains(&name) || LOCATION_REFERENCE_FIELDS.contains(&name)
}

/// Step type of a form, if set
#[must_use]
pub fn step_type(form: &StepForm) -> Option<&str> {
    form.get(STEP_TYPE).and_then(Value::as_str)
}

/// Every string reference held by the convention fields of a form
///
/// Yields `(field, reference)`; `null` and non-string values are skipped.
pub fn references(form: &StepForm) -> impl Iterator<Item = (&str, EntityRef)> {
    form.iter().filter_map(|(field, value)| {
        if !is_reference_field(field) {
            return None;
        }
        value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| (field.as_str(), EntityRef::parse(s)))
    })
}
