//! 6.x → 7.0.0
//!
//! - fills the descriptive load-command fields that schema 7 requires
//! - drops the schema 6 `labware`/`pipettes`/`modules` tables
//! - splits combined adapter+labware loads into `loadAdapter` + `loadLabware`
//! - turns `loadLabware` of an adapter definition into `loadAdapter`

use super::{embedded_catalog, labware_params, resolve};
use crate::assembler::DocumentAssembler;
use crate::error::MigrationError;
use crate::identity::{rewrite_references, IdMinter, RenameMap};
use crate::migrator::{MigrationContext, Migrator};
use indexmap::IndexMap;
use pd_catalog::{DefinitionCatalog, DefinitionKind, LabwareDefinition, LayeredCatalog};
use pd_schema::{
    Command, CommandBody, EntityId, LoadAdapterParams, LoadLabwareParams, LocationReference,
    ProtocolDocument, SchemaVersion,
};
use serde_json::{Map, Value};

const FROM: SchemaVersion = SchemaVersion::new(6, 0, 0);
const TO: SchemaVersion = SchemaVersion::new(7, 0, 0);

/// Schema ids introduced with schema 7, set when absent
const SCHEMA_SEVEN_IDS: &[(&str, &str)] = &[
    ("labwareDefinitionSchemaId", "opentronsLabwareSchemaV2"),
    ("liquidSchemaId", "opentronsLiquidSchemaV1"),
    ("commandAnnotationSchemaId", "opentronsCommandAnnotationSchemaV1"),
];

/// Stage `7.0.0`
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitStackedLabware;

impl Migrator for SplitStackedLabware {
    fn name(&self) -> &'static str {
        "7.0.0"
    }

    fn from_version(&self) -> SchemaVersion {
        FROM
    }

    fn to_version(&self) -> SchemaVersion {
        TO
    }

    fn migrate(
        &self,
        mut doc: ProtocolDocument,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<ProtocolDocument, MigrationError> {
        let embedded = embedded_catalog(&doc);
        let catalog = LayeredCatalog::new(ctx.catalog, &embedded);
        let legacy = LegacyTables::take(&mut doc.extra);
        ctx.minter.reserve_document(&doc);

        let mut upgrade = Upgrade {
            catalog: &catalog,
            legacy: &legacy,
            minter: &mut *ctx.minter,
            definitions: std::mem::take(&mut doc.labware_definitions),
            renames: RenameMap::new(),
            commands: Vec::with_capacity(doc.commands.len() + 1),
            splits: 0,
        };

        for command in std::mem::take(&mut doc.commands) {
            upgrade.command(command)?;
        }

        let Upgrade {
            definitions,
            renames,
            commands,
            splits,
            ..
        } = upgrade;
        tracing::info!("Split {} combined labware load(s)", splits);

        let mut doc = rewrite_references(doc, &renames);
        for (key, id) in SCHEMA_SEVEN_IDS {
            doc.extra
                .entry((*key).to_string())
                .or_insert_with(|| Value::String((*id).to_string()));
        }
        doc.extra
            .entry("commandAnnotations".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        Ok(DocumentAssembler::new(doc)
            .with_commands(commands)
            .with_labware_definitions(definitions)
            .with_version(TO)
            .assemble())
    }
}

/// Schema 6 per-entity tables, removed from the document
struct LegacyTables {
    labware: Map<String, Value>,
    pipettes: Map<String, Value>,
    modules: Map<String, Value>,
}

impl LegacyTables {
    fn take(extra: &mut Map<String, Value>) -> Self {
        let mut table = |name: &str| match extra.shift_remove(name) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            labware: table("labware"),
            pipettes: table("pipettes"),
            modules: table("modules"),
        }
    }

    fn field(table: &Map<String, Value>, id: &EntityId, field: &str) -> Option<String> {
        table
            .get(id.as_str())
            .and_then(|entry| entry.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn pipette_name(&self, id: &EntityId) -> Option<String> {
        Self::field(&self.pipettes, id, "name")
    }

    fn module_model(&self, id: &EntityId) -> Option<String> {
        Self::field(&self.modules, id, "model")
    }

    fn labware_display_name(&self, id: &EntityId) -> Option<String> {
        Self::field(&self.labware, id, "displayName")
    }

    fn labware_definition_id(&self, id: &EntityId) -> Option<String> {
        Self::field(&self.labware, id, "definitionId")
    }
}

struct Upgrade<'a> {
    catalog: &'a dyn DefinitionCatalog,
    legacy: &'a LegacyTables,
    minter: &'a mut IdMinter,
    definitions: IndexMap<String, Value>,
    renames: RenameMap,
    commands: Vec<Command>,
    splits: usize,
}

impl Upgrade<'_> {
    fn command(&mut self, command: Command) -> Result<(), MigrationError> {
        let Command { key, body } = command;
        let body = match body {
            CommandBody::LoadPipette(mut p) => {
                if p.pipette_name.is_none() {
                    p.pipette_name = self.legacy.pipette_name(&p.pipette_id);
                }
                CommandBody::LoadPipette(p)
            }
            CommandBody::LoadModule(mut p) => {
                if p.model.is_none() {
                    p.model = self.legacy.module_model(&p.module_id);
                }
                CommandBody::LoadModule(p)
            }
            CommandBody::LoadLabware(p) => return self.labware(key, p),
            other => other,
        };
        self.commands.push(Command { key, body });
        Ok(())
    }

    fn labware(&mut self, key: Option<String>, p: LoadLabwareParams) -> Result<(), MigrationError> {
        let entity = p.labware_id.as_str();
        let uri = self
            .legacy
            .labware_definition_id(&p.labware_id)
            .or_else(|| p.labware_id.definition_uri().map(|u| u.to_string()))
            .ok_or_else(|| MigrationError::unresolvable("<none>", entity))?;
        let kind = self
            .catalog
            .kind_of(&uri)
            .map_err(|_| MigrationError::unresolvable(&uri, entity))?;
        let display_name = self
            .legacy
            .labware_display_name(&p.labware_id)
            .or_else(|| p.display_name.clone());

        match kind {
            DefinitionKind::Stacked { adapter, labware } => {
                let adapter_def = resolve(self.catalog, adapter.as_str(), entity)?;
                let labware_def = resolve(self.catalog, labware.as_str(), entity)?;

                let adapter_id = self.minter.mint_entity(&adapter);
                let preserved = EntityId::compose(p.labware_id.instance(), &labware);
                let labware_id = if self.minter.claim(&preserved) {
                    preserved
                } else {
                    let fresh = self.minter.mint_entity(&labware);
                    tracing::warn!(
                        "{} is already taken, using {} for the split labware",
                        preserved,
                        fresh
                    );
                    fresh
                };
                tracing::debug!(
                    "Splitting {} into adapter {} and labware {}",
                    p.labware_id,
                    adapter_id,
                    labware_id
                );

                let adapter_key = self.minter.mint_key();
                self.commands.push(Command::new(
                    adapter_key,
                    CommandBody::LoadAdapter(adapter_params(
                        adapter_id.clone(),
                        p.location,
                        adapter_def,
                    )),
                ));

                let mut params = labware_params(
                    labware_id.clone(),
                    LocationReference::Labware(adapter_id),
                    labware_def,
                    display_name,
                );
                params.extra = p.extra;
                self.commands.push(Command {
                    key,
                    body: CommandBody::LoadLabware(params),
                });

                self.definitions.shift_remove(&uri);
                self.add_definition(adapter_def);
                self.add_definition(labware_def);
                self.renames.insert(p.labware_id, labware_id);
                self.splits += 1;
            }
            DefinitionKind::Adapter => {
                let def = resolve(self.catalog, &uri, entity)?;
                let mut params = adapter_params(p.labware_id, p.location, def);
                if let Some(name) = display_name {
                    params.display_name = Some(name);
                }
                params.extra = p.extra;
                self.add_definition(def);
                self.commands.push(Command {
                    key,
                    body: CommandBody::LoadAdapter(params),
                });
            }
            DefinitionKind::Labware | DefinitionKind::Module => {
                let def = resolve(self.catalog, &uri, entity)?;
                let mut params = labware_params(p.labware_id, p.location, def, display_name);
                params.extra = p.extra;
                self.add_definition(def);
                self.commands.push(Command {
                    key,
                    body: CommandBody::LoadLabware(params),
                });
            }
        }
        Ok(())
    }

    fn add_definition(&mut self, def: &LabwareDefinition) {
        self.definitions
            .entry(def.uri.to_string())
            .or_insert_with(|| def.body.clone());
    }
}

fn adapter_params(
    id: EntityId,
    location: LocationReference,
    def: &LabwareDefinition,
) -> LoadAdapterParams {
    LoadAdapterParams {
        adapter_id: id,
        location,
        load_name: Some(def.load_name.clone()),
        namespace: Some(def.namespace.clone()),
        version: Some(def.version),
        display_name: Some(def.display_name.clone()),
        extra: Map::new(),
    }
}
