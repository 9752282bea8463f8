//! Protocol commands
//!
//! A command is `{ key?, commandType, params }` on the wire. The four load
//! command types decode into typed parameter records; every other command is
//! kept as an opaque [`CommandBody::Operation`] with its params as JSON.

use crate::entity::EntityId;
use crate::error::SchemaError;
use crate::location::LocationReference;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `commandType` of [`CommandBody::LoadPipette`]
pub const LOAD_PIPETTE: &str = "loadPipette";
/// `commandType` of [`CommandBody::LoadModule`]
pub const LOAD_MODULE: &str = "loadModule";
/// `commandType` of [`CommandBody::LoadLabware`]
pub const LOAD_LABWARE: &str = "loadLabware";
/// `commandType` of [`CommandBody::LoadAdapter`]
pub const LOAD_ADAPTER: &str = "loadAdapter";

/// Params of a `loadPipette` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPipetteParams {
    /// Pipette id
    pub pipette_id: EntityId,
    /// `left` or `right`
    pub mount: String,
    /// Pipette model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipette_name: Option<String>,
    /// Params this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Params of a `loadModule` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModuleParams {
    /// Module id
    pub module_id: EntityId,
    /// Where the entity is placed
    pub location: LocationReference,
    /// Module model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Params this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Params of a `loadLabware` command
///
/// Schema 6 documents only carry `labwareId` and `location`; the descriptive
/// fields are filled in when the document is upgraded to schema 7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadLabwareParams {
    /// Labware id
    pub labware_id: EntityId,
    /// Where the entity is placed
    pub location: LocationReference,
    /// Definition load name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_name: Option<String>,
    /// Definition namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Definition version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// User-facing name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Params this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Params of a `loadAdapter` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAdapterParams {
    /// Adapter id
    pub adapter_id: EntityId,
    /// Where the entity is placed
    pub location: LocationReference,
    /// Definition load name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_name: Option<String>,
    /// Definition namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Definition version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// User-facing name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Params this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed body of a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandBody {
    /// `loadPipette`
    LoadPipette(LoadPipetteParams),
    /// `loadModule`
    LoadModule(LoadModuleParams),
    /// `loadLabware`
    LoadLabware(LoadLabwareParams),
    /// `loadAdapter`
    LoadAdapter(LoadAdapterParams),
    /// Any non-load command, params untouched
    Operation {
        /// `commandType`
        command_type: String,
        /// Raw params
        params: Map<String, Value>,
    },
}

/// Which kind of entity a load command introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadedKind {
    /// `loadPipette`
    Pipette,
    /// `loadModule`
    Module,
    /// `loadLabware`
    Labware,
    /// `loadAdapter`
    Adapter,
}

/// One entry of the command list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCommand", into = "RawCommand")]
pub struct Command {
    /// Stable key within one document
    pub key: Option<String>,
    /// Typed body
    pub body: CommandBody,
}

impl Command {
    /// Create command from key and body
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, body: CommandBody) -> Self {
        Self {
            key: Some(key.into()),
            body,
        }
    }

    /// Wire `commandType`
    #[must_use]
    pub fn command_type(&self) -> &str {
        match &self.body {
            CommandBody::LoadPipette(_) => LOAD_PIPETTE,
            CommandBody::LoadModule(_) => LOAD_MODULE,
            CommandBody::LoadLabware(_) => LOAD_LABWARE,
            CommandBody::LoadAdapter(_) => LOAD_ADAPTER,
            CommandBody::Operation { command_type, .. } => command_type,
        }
    }

    /// Check if this is one of the load commands
    #[inline]
    #[must_use]
    pub fn is_load(&self) -> bool {
        !matches!(self.body, CommandBody::Operation { .. })
    }

    /// Entity introduced by this command, if it is a load command
    #[must_use]
    pub fn loaded_entity(&self) -> Option<(&EntityId, LoadedKind)> {
        match &self.body {
            CommandBody::LoadPipette(p) => Some((&p.pipette_id, LoadedKind::Pipette)),
            CommandBody::LoadModule(p) => Some((&p.module_id, LoadedKind::Module)),
            CommandBody::LoadLabware(p) => Some((&p.labware_id, LoadedKind::Labware)),
            CommandBody::LoadAdapter(p) => Some((&p.adapter_id, LoadedKind::Adapter)),
            CommandBody::Operation { .. } => None,
        }
    }

    /// Location of the loaded entity, for load commands that have one
    #[must_use]
    pub fn location(&self) -> Option<&LocationReference> {
        match &self.body {
            CommandBody::LoadModule(p) => Some(&p.location),
            CommandBody::LoadLabware(p) => Some(&p.location),
            CommandBody::LoadAdapter(p) => Some(&p.location),
            CommandBody::LoadPipette(_) | CommandBody::Operation { .. } => None,
        }
    }

    /// Operation params, for non-load commands
    #[must_use]
    pub fn operation_params(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            CommandBody::Operation { params, .. } => Some(params),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    command_type: String,
    #[serde(default)]
    params: Value,
}

fn decode_params<T: serde::de::DeserializeOwned>(
    command_type: &str,
    params: Value,
) -> Result<T, SchemaError> {
    serde_json::from_value(params)
        .map_err(|e| SchemaError::invalid_command(command_type, e.to_string()))
}

impl TryFrom<RawCommand> for Command {
    type Error = SchemaError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let ty = raw.command_type.as_str();
        let body = match ty {
            LOAD_PIPETTE => CommandBody::LoadPipette(decode_params(ty, raw.params)?),
            LOAD_MODULE => CommandBody::LoadModule(decode_params(ty, raw.params)?),
            LOAD_LABWARE => CommandBody::LoadLabware(decode_params(ty, raw.params)?),
            LOAD_ADAPTER => CommandBody::LoadAdapter(decode_params(ty, raw.params)?),
            _ => {
                let params = match raw.params {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => {
                        return Err(SchemaError::invalid_command(
                            ty,
                            format!("params must be an object, got {other}"),
                        ))
                    }
                };
                CommandBody::Operation {
                    command_type: raw.command_type.clone(),
                    params,
                }
            }
        };

        Ok(Self {
            key: raw.key,
            body,
        })
    }
}

impl From<Command> for RawCommand {
    fn from(command: Command) -> Self {
        let command_type = command.command_type().to_string();
        // Typed params are plain structs with string keys; encoding cannot fail.
        let params = match command.body {
            CommandBody::LoadPipette(p) => serde_json::to_value(p).unwrap_or_default(),
            CommandBody::LoadModule(p) => serde_json::to_value(p).unwrap_or_default(),
            CommandBody::LoadLabware(p) => serde_json::to_value(p).unwrap_or_default(),
            CommandBody::LoadAdapter(p) => serde_json::to_value(p).unwrap_or_default(),
            CommandBody::Operation { params, .. } => Value::Object(params),
        };

        Self {
            key: command.key,
            command_type,
            params,
        }
    }
}
