//! Identity rewriting
//!
//! Mints `<instance>:<definitionURI>` ids that are unique within one
//! migration run, and propagates old-id → new-id renames through every place
//! a document can hold an entity id:
//!
//! - load command ids and their locations
//! - operation command params (`labwareId`, `pipetteId`, `moduleId`,
//!   `adapterId`) at any depth
//! - liquid placement (`ingredLocations`) keys
//! - step-form reference fields, deck setup maps, tiprack assignments

use indexmap::IndexMap;
use pd_schema::step_form::{
    is_reference_field, COMMAND_ID_KEYS, LABWARE_LOCATION_UPDATE, LOCATION_UPDATE_FIELDS,
};
use pd_schema::{
    CommandBody, DefinitionUri, EntityId, EntityRef, LocationReference, ProtocolDocument,
};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Source of fresh instance strings
pub trait IdSource: Send {
    /// Next candidate instance string
    fn next_instance(&mut self) -> String;
}

/// Random UUID v4 instances
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn next_instance(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Counter-based instances (`<prefix>-<n>`) for reproducible output
#[derive(Debug, Clone)]
pub struct SequentialIdSource {
    prefix: String,
    next: u64,
}

impl SequentialIdSource {
    /// Create new sequential source starting at 1
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_instance(&mut self) -> String {
        let instance = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        instance
    }
}

/// Hands out entity ids and command keys unique within one run
pub struct IdMinter {
    source: Box<dyn IdSource>,
    ids: HashSet<String>,
    keys: HashSet<String>,
}

impl IdMinter {
    /// Create minter over an id source
    #[must_use]
    pub fn new(source: Box<dyn IdSource>) -> Self {
        Self {
            source,
            ids: HashSet::new(),
            keys: HashSet::new(),
        }
    }

    /// Mark every id and command key already present in `doc` as taken
    pub fn reserve_document(&mut self, doc: &ProtocolDocument) {
        for id in doc.loaded_ids() {
            self.ids.insert(id.as_str().to_string());
        }
        for key in doc.commands.iter().filter_map(|c| c.key.as_deref()) {
            self.keys.insert(key.to_string());
        }
    }

    /// Fresh entity id for an instance of `uri`
    pub fn mint_entity(&mut self, uri: &DefinitionUri) -> EntityId {
        loop {
            let id = EntityId::compose(&self.source.next_instance(), uri);
            if self.ids.insert(id.as_str().to_string()) {
                tracing::debug!("Minted entity id: {}", id);
                return id;
            }
        }
    }

    /// Fresh command key
    pub fn mint_key(&mut self) -> String {
        loop {
            let key = self.source.next_instance();
            if self.keys.insert(key.clone()) {
                return key;
            }
        }
    }

    /// Record an id chosen by a migrator so later mints avoid it
    ///
    /// Returns `false` if the id was already reserved or handed out.
    #[must_use]
    pub fn claim(&mut self, id: &EntityId) -> bool {
        self.ids.insert(id.as_str().to_string())
    }
}

/// Old reference → new entity id
///
/// Keys are [`EntityRef`] so the fixed-trash sentinel can be renamed the
/// same way as a real id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameMap(IndexMap<EntityRef, EntityId>);

impl RenameMap {
    /// Create empty rename map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `old` → `new`
    pub fn insert(&mut self, old: impl Into<EntityRef>, new: EntityId) {
        let old = old.into();
        tracing::debug!("Rename: {} -> {}", old, new);
        self.0.insert(old, new);
    }

    /// New id for a raw reference string, if renamed
    #[must_use]
    pub fn lookup(&self, raw: &str) -> Option<&EntityId> {
        self.0.get(&EntityRef::parse(raw))
    }

    /// New id for an entity id, if renamed
    #[must_use]
    pub fn lookup_id(&self, id: &EntityId) -> Option<&EntityId> {
        self.lookup(id.as_str())
    }

    /// Number of renames
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no renames are recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn rename_id(&self, id: &mut EntityId) {
        if let Some(new) = self.lookup_id(id) {
            *id = new.clone();
        }
    }

    fn rename_location(&self, location: &mut LocationReference) {
        match location {
            LocationReference::Module(id) | LocationReference::Labware(id) => self.rename_id(id),
            LocationReference::OffDeck | LocationReference::Slot(_) => {}
        }
    }

    fn rename_string(&self, value: &mut Value) {
        if let Some(new) = value.as_str().and_then(|s| self.lookup(s)) {
            *value = Value::String(new.to_string());
        }
    }

    fn rename_keys<V>(&self, map: IndexMap<String, V>) -> IndexMap<String, V> {
        map.into_iter()
            .map(|(k, v)| match self.lookup(&k) {
                Some(new) => (new.to_string(), v),
                None => (k, v),
            })
            .collect()
    }

    fn rename_object_keys(&self, map: &mut Map<String, Value>) {
        let renamed: Map<String, Value> = std::mem::take(map)
            .into_iter()
            .map(|(k, v)| match self.lookup(&k) {
                Some(new) => (new.to_string(), v),
                None => (k, v),
            })
            .collect();
        *map = renamed;
    }

    fn rename_params(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, v) in map.iter_mut() {
                    if COMMAND_ID_KEYS.contains(&key.as_str()) && v.is_string() {
                        self.rename_string(v);
                    } else {
                        self.rename_params(v);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.rename_params(v)),
            _ => {}
        }
    }
}

/// Top-level schema 6 tables keyed by entity id
const LEGACY_ID_TABLES: &[&str] = &["labware", "pipettes", "modules"];

/// Apply `renames` to every id-holding field of `doc`
#[must_use]
pub fn rewrite_references(mut doc: ProtocolDocument, renames: &RenameMap) -> ProtocolDocument {
    if renames.is_empty() {
        return doc;
    }

    for command in &mut doc.commands {
        match &mut command.body {
            CommandBody::LoadPipette(p) => renames.rename_id(&mut p.pipette_id),
            CommandBody::LoadModule(p) => {
                renames.rename_id(&mut p.module_id);
                renames.rename_location(&mut p.location);
            }
            CommandBody::LoadLabware(p) => {
                renames.rename_id(&mut p.labware_id);
                renames.rename_location(&mut p.location);
            }
            CommandBody::LoadAdapter(p) => {
                renames.rename_id(&mut p.adapter_id);
                renames.rename_location(&mut p.location);
            }
            CommandBody::Operation { params, .. } => {
                for (key, v) in params.iter_mut() {
                    if COMMAND_ID_KEYS.contains(&key.as_str()) && v.is_string() {
                        renames.rename_string(v);
                    } else {
                        renames.rename_params(v);
                    }
                }
            }
        }
    }

    let data = &mut doc.designer_application.data;
    data.ingred_locations = renames.rename_keys(std::mem::take(&mut data.ingred_locations));
    data.pipette_tiprack_assignments =
        renames.rename_keys(std::mem::take(&mut data.pipette_tiprack_assignments));

    for form in data.saved_step_forms.values_mut() {
        for (field, value) in form.iter_mut() {
            if is_reference_field(field) {
                renames.rename_string(value);
            } else if LOCATION_UPDATE_FIELDS.contains(&field.as_str()) {
                if let Value::Object(map) = value {
                    renames.rename_object_keys(map);
                    // Values of the labware map can name an adapter or module
                    if field == LABWARE_LOCATION_UPDATE {
                        map.values_mut().for_each(|v| renames.rename_string(v));
                    }
                }
            }
        }
    }

    for table in LEGACY_ID_TABLES {
        if let Some(Value::Object(map)) = doc.extra.get_mut(*table) {
            renames.rename_object_keys(map);
        }
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_schema::FIXED_TRASH_SENTINEL;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc() -> ProtocolDocument {
        serde_json::from_value(json!({
            "schemaVersion": 7,
            "designerApplication": {
                "name": "opentrons/protocol-designer",
                "version": "7.0.0",
                "data": {
                    "ingredLocations": {"old:opentrons/combo/1": {"A1": {"0": {"volume": 10}}}},
                    "savedStepForms": {
                        "__INITIAL_DECK_SETUP_STEP__": {
                            "stepType": "manualIntervention",
                            "labwareLocationUpdate": {"old:opentrons/combo/1": "1", "fixedTrash": "12"}
                        },
                        "s1": {
                            "stepType": "moveLiquid",
                            "aspirate_labware": "old:opentrons/combo/1",
                            "dropTip_location": "fixedTrash",
                            "aspirate_wells": ["A1"]
                        }
                    },
                    "orderedStepIds": ["s1"]
                }
            },
            "commands": [
                {"key": "k1", "commandType": "loadLabware", "params": {"labwareId": "old:opentrons/combo/1", "location": {"slotName": "1"}}},
                {"key": "k2", "commandType": "aspirate", "params": {"labwareId": "old:opentrons/combo/1", "wellName": "A1"}},
                {"key": "k3", "commandType": "moveLabware", "params": {"labwareId": "x", "newLocation": {"labwareId": "old:opentrons/combo/1"}}},
                {"key": "k4", "commandType": "dropTip", "params": {"labwareId": "fixedTrash"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn sequential_source_counts_up() {
        let mut source = SequentialIdSource::new("t");
        assert_eq!(source.next_instance(), "t-1");
        assert_eq!(source.next_instance(), "t-2");
    }

    #[test]
    fn minter_skips_reserved_ids() {
        let uri: DefinitionUri = "opentrons/plate/1".parse().unwrap();
        let mut minter = IdMinter::new(Box::new(SequentialIdSource::new("id")));
        let taken = EntityId::compose("id-1", &uri);
        assert!(minter.claim(&taken));
        assert!(!minter.claim(&taken));
        assert_eq!(minter.mint_entity(&uri).as_str(), "id-2:opentrons/plate/1");
        assert_eq!(minter.mint_entity(&uri).as_str(), "id-3:opentrons/plate/1");
    }

    #[test]
    fn minter_reserves_document_keys() {
        let mut minter = IdMinter::new(Box::new(SequentialIdSource::new("k")));
        let mut d = doc();
        d.commands[0].key = Some("k-1".to_string());
        minter.reserve_document(&d);
        assert_eq!(minter.mint_key(), "k-2");
    }

    #[test]
    fn uuid_ids_are_distinct() {
        let uri: DefinitionUri = "opentrons/plate/1".parse().unwrap();
        let mut minter = IdMinter::new(Box::new(UuidIdSource));
        assert_ne!(minter.mint_entity(&uri), minter.mint_entity(&uri));
    }

    #[test]
    fn rewrite_is_total() {
        let mut renames = RenameMap::new();
        renames.insert(EntityId::new("old:opentrons/combo/1"), EntityId::new("old:opentrons/plate/2"));
        renames.insert(EntityRef::FixedTrash, EntityId::new("t:opentrons/trash/1"));

        let out = rewrite_references(doc(), &renames);
        let encoded = serde_json::to_string(&out).unwrap();

        assert!(!encoded.contains("old:opentrons/combo/1\""));
        assert!(!encoded.contains(&format!("\"{FIXED_TRASH_SENTINEL}\"")));

        let data = out.designer_data();
        assert!(data.ingred_locations.contains_key("old:opentrons/plate/2"));
        let setup = &data.saved_step_forms["__INITIAL_DECK_SETUP_STEP__"]["labwareLocationUpdate"];
        assert_eq!(setup, &json!({"old:opentrons/plate/2": "1", "t:opentrons/trash/1": "12"}));

        let step = &data.saved_step_forms["s1"];
        assert_eq!(step["dropTip_location"], json!("t:opentrons/trash/1"));
        assert_eq!(step["aspirate_labware"], json!("old:opentrons/plate/2"));
        assert_eq!(step["aspirate_wells"], json!(["A1"]));

        let moved = out.commands[2].operation_params().unwrap();
        assert_eq!(moved["newLocation"], json!({"labwareId": "old:opentrons/plate/2"}));
        assert_eq!(
            out.commands[3].operation_params().unwrap()["labwareId"],
            json!("t:opentrons/trash/1")
        );
    }

    #[test]
    fn empty_rename_map_is_identity() {
        assert_eq!(rewrite_references(doc(), &RenameMap::new()), doc());
    }
}
