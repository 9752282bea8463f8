//! Post-migration invariant checks
//!
//! [`check`] collects every violation in a document rather than stopping at
//! the first; [`validate`] turns a non-empty list into
//! [`MigrationError::InvariantViolation`].

use crate::error::{MigrationError, Violation};
use indexmap::IndexMap;
use pd_schema::step_form::{
    self, COMMAND_ID_KEYS, ENTITY_REFERENCE_FIELDS, LABWARE_LOCATION_UPDATE,
};
use pd_schema::{
    EntityId, EntityRef, LoadedKind, LocationReference, ProtocolDocument, SchemaVersion,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// First version in which the fixed-trash sentinel is no longer allowed
pub const SENTINEL_RETIRED_IN: SchemaVersion = SchemaVersion::new(7, 1, 0);

/// Check `doc` and fail with every violation found
///
/// # Errors
/// Returns [`MigrationError::InvariantViolation`] if any check fails
pub fn validate(doc: &ProtocolDocument) -> Result<(), MigrationError> {
    let violations = check(doc);
    if violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!("Document failed validation: {} violation(s)", violations.len());
        Err(MigrationError::InvariantViolation(violations))
    }
}

/// All invariant violations in `doc`
#[must_use]
pub fn check(doc: &ProtocolDocument) -> Vec<Violation> {
    let sentinel_allowed = doc.declared_version() < SENTINEL_RETIRED_IN;
    let mut checker = Checker {
        sentinel_allowed,
        loaded: IndexMap::new(),
        violations: Vec::new(),
    };
    checker.load_commands(doc);
    checker.operation_commands(doc);
    checker.step_forms(doc);
    checker.liquid_placement(doc);
    checker.violations
}

/// Places where the fixed-trash sentinel still appears
#[must_use]
pub fn sentinel_occurrences(doc: &ProtocolDocument) -> Vec<Violation> {
    let mut checker = Checker {
        sentinel_allowed: false,
        loaded: IndexMap::new(),
        violations: Vec::new(),
    };
    // Everything is "loaded" so only the sentinel is reported
    checker.step_forms_with(doc, |_| true);
    checker.operation_commands_with(doc, |_| true);
    checker.violations
}

struct Checker<'a> {
    sentinel_allowed: bool,
    loaded: IndexMap<&'a str, LoadedKind>,
    violations: Vec<Violation>,
}

impl<'a> Checker<'a> {
    fn is_loaded(&self, id: &str) -> bool {
        self.loaded.contains_key(id)
    }

    fn loaded_ids(&self) -> HashSet<&'a str> {
        self.loaded.keys().copied().collect()
    }

    fn sentinel(&mut self, at: String) {
        if !self.sentinel_allowed {
            self.violations.push(Violation::SurvivingSentinel { at });
        }
    }

    fn load_commands(&mut self, doc: &'a ProtocolDocument) {
        let mut slots: HashMap<&str, &EntityId> = HashMap::new();
        let mut on_module: HashMap<&EntityId, &EntityId> = HashMap::new();
        let mut on_adapter: HashMap<&EntityId, &EntityId> = HashMap::new();

        for command in &doc.commands {
            let Some((id, kind)) = command.loaded_entity() else {
                continue;
            };

            match command.location() {
                Some(LocationReference::Slot(slot)) => {
                    if let Some(first) = slots.insert(slot.as_str(), id) {
                        self.violations.push(Violation::SlotOccupied {
                            slot: slot.clone(),
                            first: first.to_string(),
                            second: id.to_string(),
                        });
                    }
                }
                Some(LocationReference::Module(module)) => match self.loaded.get(module.as_str()) {
                    None => self.violations.push(Violation::UnknownLocation {
                        entity: id.to_string(),
                        target: module.to_string(),
                    }),
                    Some(LoadedKind::Module) => {
                        if let Some(first) = on_module.insert(module, id) {
                            self.violations.push(Violation::ModuleOccupied {
                                module: module.to_string(),
                                first: first.to_string(),
                                second: id.to_string(),
                            });
                        }
                    }
                    Some(_) => self.violations.push(Violation::NotAModule {
                        entity: id.to_string(),
                        target: module.to_string(),
                    }),
                },
                Some(LocationReference::Labware(adapter)) => match self.loaded.get(adapter.as_str()) {
                    None => self.violations.push(Violation::UnknownLocation {
                        entity: id.to_string(),
                        target: adapter.to_string(),
                    }),
                    Some(LoadedKind::Adapter) => {
                        if let Some(first) = on_adapter.insert(adapter, id) {
                            self.violations.push(Violation::AdapterOccupied {
                                adapter: adapter.to_string(),
                                first: first.to_string(),
                                second: id.to_string(),
                            });
                        }
                    }
                    Some(_) => self.violations.push(Violation::NotAnAdapter {
                        entity: id.to_string(),
                        target: adapter.to_string(),
                    }),
                },
                Some(LocationReference::OffDeck) | None => {}
            }

            if self.loaded.insert(id.as_str(), kind).is_some() {
                self.violations
                    .push(Violation::DuplicateLoad { id: id.to_string() });
            }
        }
    }

    fn operation_commands(&mut self, doc: &ProtocolDocument) {
        let loaded = self.loaded_ids();
        self.operation_commands_with(doc, |id| loaded.contains(id));
    }

    fn operation_commands_with(&mut self, doc: &ProtocolDocument, known: impl Fn(&str) -> bool) {
        for command in &doc.commands {
            let Some(params) = command.operation_params() else {
                continue;
            };
            let key = command.key.clone().unwrap_or_default();
            let mut ids = Vec::new();
            collect_param_ids(params, &mut ids);
            for id in ids {
                match EntityRef::parse(id) {
                    EntityRef::FixedTrash => self.sentinel(format!(
                        "{} command '{key}'",
                        command.command_type()
                    )),
                    EntityRef::Entity(entity) if !known(entity.as_str()) => {
                        self.violations.push(Violation::DanglingCommandReference {
                            command_type: command.command_type().to_string(),
                            key: key.clone(),
                            id: entity.to_string(),
                        });
                    }
                    EntityRef::Entity(_) => {}
                }
            }
        }
    }

    fn step_forms(&mut self, doc: &ProtocolDocument) {
        let loaded = self.loaded_ids();
        self.step_forms_with(doc, |id| loaded.contains(id));
    }

    fn step_forms_with(&mut self, doc: &ProtocolDocument, known: impl Fn(&str) -> bool) {
        for (step, form) in &doc.designer_data().saved_step_forms {
            for (field, reference) in step_form::references(form) {
                match reference {
                    EntityRef::FixedTrash => {
                        self.sentinel(format!("step '{step}' field {field}"));
                    }
                    EntityRef::Entity(id) => {
                        // Location fields also hold keywords and slot names
                        let names_entity = ENTITY_REFERENCE_FIELDS.contains(&field)
                            || id.as_str().contains(':');
                        if names_entity && !known(id.as_str()) {
                            self.violations.push(Violation::DanglingStepReference {
                                step: step.clone(),
                                field: field.to_string(),
                                id: id.to_string(),
                            });
                        }
                    }
                }
            }

            if let Some(Value::Object(update)) = form.get(LABWARE_LOCATION_UPDATE) {
                for key in update.keys() {
                    match EntityRef::parse(key) {
                        EntityRef::FixedTrash => {
                            self.sentinel(format!("step '{step}' {LABWARE_LOCATION_UPDATE}"));
                        }
                        EntityRef::Entity(id) if !known(id.as_str()) => {
                            self.violations.push(Violation::DanglingMapKey {
                                map: LABWARE_LOCATION_UPDATE.to_string(),
                                id: id.to_string(),
                            });
                        }
                        EntityRef::Entity(_) => {}
                    }
                }
            }
        }
    }

    fn liquid_placement(&mut self, doc: &ProtocolDocument) {
        for key in doc.designer_data().ingred_locations.keys() {
            if !self.is_loaded(key) {
                self.violations.push(Violation::DanglingMapKey {
                    map: "ingredLocations".to_string(),
                    id: key.clone(),
                });
            }
        }
    }
}

/// String values under id keys, at any depth
fn collect_param_ids<'v>(params: &'v Map<String, Value>, out: &mut Vec<&'v str>) {
    for (key, value) in params {
        match value {
            Value::String(s) if COMMAND_ID_KEYS.contains(&key.as_str()) => out.push(s),
            Value::Object(map) => collect_param_ids(map, out),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item {
                        collect_param_ids(map, out);
                    }
                }
            }
            _ => {}
        }
    }
}
