//! Built-in migration stages
//!
//! | stage   | from  | to    | responsibility                                  |
//! |---------|-------|-------|-------------------------------------------------|
//! | `7.0.0` | 6.0.0 | 7.0.0 | split combined adapter+labware, fill load fields |
//! | `7.1.0` | 7.0.0 | 7.1.0 | promote the fixed trash to a loaded labware      |
//! | `8.0.0` | 7.1.0 | 8.0.0 | schema 8 tags                                    |

mod v7_0_0;
mod v7_1_0;
mod v8_0_0;

pub use v7_0_0::SplitStackedLabware;
pub use v7_1_0::{trash_placement, FixedTrashPromotion, TrashPlacement};
pub use v8_0_0::SchemaEightTags;

use crate::error::MigrationError;
use pd_catalog::{DefinitionCatalog, InMemoryCatalog, LabwareDefinition};
use pd_schema::{DefinitionUri, LoadLabwareParams, ProtocolDocument};

/// Catalog over the definitions embedded in `doc`
///
/// Bodies that do not parse are skipped with a warning; a load command that
/// needs one fails later with an unresolvable-definition error.
fn embedded_catalog(doc: &ProtocolDocument) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for (uri, body) in &doc.labware_definitions {
        if let Err(e) = catalog.insert_value(body.clone()) {
            tracing::warn!("Skipping embedded definition {}: {}", uri, e);
        }
    }
    catalog
}

/// Resolve `uri` on behalf of `entity`
fn resolve<'c>(
    catalog: &'c dyn DefinitionCatalog,
    uri: &str,
    entity: &str,
) -> Result<&'c LabwareDefinition, MigrationError> {
    catalog
        .resolve(uri)
        .map_err(|_| MigrationError::unresolvable(uri, entity))
}

/// Definition URI a `loadLabware` command loads
///
/// Explicit `namespace`/`loadName`/`version` win over the id's URI half.
fn loaded_uri(params: &LoadLabwareParams) -> Option<DefinitionUri> {
    match (&params.namespace, &params.load_name, params.version) {
        (Some(namespace), Some(load_name), Some(version)) => {
            Some(DefinitionUri::from_parts(namespace, load_name, version))
        }
        _ => params.labware_id.definition_uri(),
    }
}

/// `loadLabware` params describing an instance of `def`
fn labware_params(
    id: pd_schema::EntityId,
    location: pd_schema::LocationReference,
    def: &LabwareDefinition,
    display_name: Option<String>,
) -> LoadLabwareParams {
    LoadLabwareParams {
        labware_id: id,
        location,
        load_name: Some(def.load_name.clone()),
        namespace: Some(def.namespace.clone()),
        version: Some(def.version),
        display_name: Some(display_name.unwrap_or_else(|| def.display_name.clone())),
        extra: serde_json::Map::new(),
    }
}
