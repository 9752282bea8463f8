//! Document assembly
//!
//! Every stage finishes by handing its rewritten parts to a
//! [`DocumentAssembler`], which puts them back into one versioned document:
//!
//! 1. replaced parts (commands, definitions, designer data) are swapped in
//! 2. version and schema tags are stamped
//! 3. commands are regrouped so every load precedes anything placed on it
//! 4. the initial deck setup step is brought in line with the load commands

use indexmap::IndexMap;
use pd_schema::step_form::{INITIAL_DECK_SETUP_STEP_ID, LABWARE_LOCATION_UPDATE};
use pd_schema::{
    Command, CommandBody, DesignerData, EntityId, LocationReference, ProtocolDocument,
    SchemaVersion,
};
use serde_json::{Map, Value};

/// Top-level key of the command schema id
pub const COMMAND_SCHEMA_ID: &str = "commandSchemaId";

/// Schema identifiers stamped on a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaTags {
    /// `schemaVersion`
    pub schema_version: u32,
    /// `$otSharedSchema`
    pub shared_schema: &'static str,
    /// `commandSchemaId`
    pub command_schema_id: &'static str,
}

impl SchemaTags {
    /// Schema 6 documents
    pub const V6: Self = Self {
        schema_version: 6,
        shared_schema: "#/protocol/schemas/6",
        command_schema_id: "opentronsCommandSchemaV6",
    };

    /// Schema 7 documents (designer 7.0 and 7.1)
    pub const V7: Self = Self {
        schema_version: 7,
        shared_schema: "#/protocol/schemas/7",
        command_schema_id: "opentronsCommandSchemaV7",
    };

    /// Schema 8 documents
    pub const V8: Self = Self {
        schema_version: 8,
        shared_schema: "#/protocol/schemas/8",
        command_schema_id: "opentronsCommandSchemaV8",
    };

    /// Tags for a designer version
    #[must_use]
    pub fn for_version(version: SchemaVersion) -> Option<Self> {
        match version.major() {
            6 => Some(Self::V6),
            7 => Some(Self::V7),
            8 => Some(Self::V8),
            _ => None,
        }
    }

    fn apply(self, doc: &mut ProtocolDocument) {
        doc.schema_version = self.schema_version;
        doc.shared_schema = Some(self.shared_schema.to_string());
        doc.extra.insert(
            COMMAND_SCHEMA_ID.to_string(),
            Value::String(self.command_schema_id.to_string()),
        );
    }
}

/// Builder that turns rewritten parts into a finished document
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    base: ProtocolDocument,
    commands: Option<Vec<Command>>,
    labware_definitions: Option<IndexMap<String, Value>>,
    designer_data: Option<DesignerData>,
    version: Option<SchemaVersion>,
    tags: Option<SchemaTags>,
}

impl DocumentAssembler {
    /// Start from a document; parts not replaced are kept as they are
    #[must_use]
    pub fn new(base: ProtocolDocument) -> Self {
        Self {
            base,
            commands: None,
            labware_definitions: None,
            designer_data: None,
            version: None,
            tags: None,
        }
    }

    /// With command list
    #[inline]
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// With definition table
    #[inline]
    #[must_use]
    pub fn with_labware_definitions(mut self, definitions: IndexMap<String, Value>) -> Self {
        self.labware_definitions = Some(definitions);
        self
    }

    /// With designer data
    #[inline]
    #[must_use]
    pub fn with_designer_data(mut self, data: DesignerData) -> Self {
        self.designer_data = Some(data);
        self
    }

    /// With version tag; schema tags follow from it unless set explicitly
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// With explicit schema tags
    #[inline]
    #[must_use]
    pub fn with_schema_tags(mut self, tags: SchemaTags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Build the document
    #[must_use]
    pub fn assemble(self) -> ProtocolDocument {
        let mut doc = self.base;

        if let Some(commands) = self.commands {
            doc.commands = commands;
        }
        if let Some(definitions) = self.labware_definitions {
            doc.labware_definitions = definitions;
        }
        if let Some(data) = self.designer_data {
            doc.designer_application.data = data;
        }

        if let Some(version) = self.version {
            doc.designer_application.version = Some(version);
        }
        if let Some(tags) = self
            .tags
            .or_else(|| self.version.and_then(SchemaTags::for_version))
        {
            tags.apply(&mut doc);
        }

        doc.commands = order_commands(std::mem::take(&mut doc.commands));
        sync_deck_setup(&mut doc);
        doc
    }
}

/// Regroup commands into load order
///
/// `loadPipette*`, `loadModule*`, each `loadAdapter` followed by the labware
/// stacked on it, remaining `loadLabware*`, then every other command. Order
/// within a group is preserved.
#[must_use]
pub fn order_commands(commands: Vec<Command>) -> Vec<Command> {
    let total = commands.len();
    let mut pipettes = Vec::new();
    let mut modules = Vec::new();
    let mut adapters = Vec::new();
    let mut labware = Vec::new();
    let mut operations = Vec::new();

    for command in commands {
        match &command.body {
            CommandBody::LoadPipette(_) => pipettes.push(command),
            CommandBody::LoadModule(_) => modules.push(command),
            CommandBody::LoadAdapter(_) => adapters.push(command),
            CommandBody::LoadLabware(_) => labware.push(command),
            CommandBody::Operation { .. } => operations.push(command),
        }
    }

    let adapter_ids: Vec<EntityId> = adapters
        .iter()
        .filter_map(|c| c.loaded_entity().map(|(id, _)| id.clone()))
        .collect();

    let mut stacked: IndexMap<EntityId, Vec<Command>> = IndexMap::new();
    let mut simple = Vec::new();
    for command in labware {
        match command.location() {
            Some(LocationReference::Labware(on)) if adapter_ids.contains(on) => {
                stacked.entry(on.clone()).or_default().push(command);
            }
            _ => simple.push(command),
        }
    }

    let mut ordered = Vec::with_capacity(total);
    ordered.extend(pipettes);
    ordered.extend(modules);
    for (adapter, id) in adapters.into_iter().zip(adapter_ids) {
        ordered.push(adapter);
        if let Some(group) = stacked.shift_remove(&id) {
            ordered.extend(group);
        }
    }
    ordered.extend(simple);
    ordered.extend(operations);
    ordered
}

/// Upsert every labware/adapter location into the initial deck setup step
fn sync_deck_setup(doc: &mut ProtocolDocument) {
    let commands = &doc.commands;
    let Some(form) = doc
        .designer_application
        .data
        .saved_step_forms
        .get_mut(INITIAL_DECK_SETUP_STEP_ID)
    else {
        return;
    };

    let entry = form
        .entry(LABWARE_LOCATION_UPDATE)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    let Value::Object(update) = entry else {
        return;
    };

    for command in commands {
        let placed = match &command.body {
            CommandBody::LoadLabware(p) => Some((&p.labware_id, &p.location)),
            CommandBody::LoadAdapter(p) => Some((&p.adapter_id, &p.location)),
            _ => None,
        };
        if let Some((id, location)) = placed {
            update.insert(
                id.to_string(),
                Value::String(location.to_deck_setup_value()),
            );
        }
    }
}
