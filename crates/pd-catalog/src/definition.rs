//! Labware definition metadata
//!
//! A [`LabwareDefinition`] is the resolved, read-only view of one definition
//! body: identity (load name, namespace, version), display name, what kind of
//! thing it is, and its well geometry. The raw body is kept so migrators can
//! copy it into a document's definition table.

use crate::error::CatalogError;
use indexmap::IndexMap;
use pd_schema::DefinitionUri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role a definition plays on the deck
///
/// Read from the definition itself, or from the catalog's explicit split
/// table for historical combined definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Ordinary labware (plates, tipracks, reservoirs, trash)
    Labware,
    /// Stacking intermediary that holds another labware
    Adapter,
    /// Hardware module definition
    Module,
    /// Legacy single definition that bundled an adapter with the labware on it
    Stacked {
        /// Adapter half
        adapter: DefinitionUri,
        /// Labware half
        labware: DefinitionUri,
    },
}

impl DefinitionKind {
    /// Check if entities of this kind are adapter-class
    #[inline]
    #[must_use]
    pub fn is_adapter(&self) -> bool {
        matches!(self, Self::Adapter)
    }
}

/// Well cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum WellShape {
    /// Round well
    Circular {
        /// Diameter, in mm
        diameter: f64,
    },
    /// Square or rectangular well
    Rectangular {
        /// Width, in mm
        #[serde(rename = "xDimension")]
        x_dimension: f64,
        /// Length, in mm
        #[serde(rename = "yDimension")]
        y_dimension: f64,
    },
}

/// Geometry of one well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Well {
    /// Well depth, in mm
    pub depth: f64,
    /// Capacity, in µL
    pub total_liquid_volume: f64,
    /// Cross-section
    #[serde(flatten)]
    pub shape: WellShape,
}

/// Well name → geometry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WellGeometry(IndexMap<String, Well>);

impl WellGeometry {
    /// Number of wells
    #[inline]
    #[must_use]
    pub fn well_count(&self) -> usize {
        self.0.len()
    }
}

/// Resolved definition
#[derive(Debug, Clone, PartialEq)]
pub struct LabwareDefinition {
    /// `<namespace>/<loadName>/<version>`
    pub uri: DefinitionUri,
    /// `parameters.loadName`
    pub load_name: String,
    /// Definition namespace
    pub namespace: String,
    /// Definition version
    pub version: u32,
    /// `metadata.displayName`, falling back to the load name
    pub display_name: String,
    /// Deck role
    pub kind: DefinitionKind,
    /// Wells by name
    pub well_geometry: WellGeometry,
    /// Raw definition body
    pub body: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    namespace: String,
    version: u32,
    parameters: RawParameters,
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    allowed_roles: Vec<String>,
    #[serde(default)]
    module_type: Option<String>,
    #[serde(default)]
    wells: Option<WellGeometry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameters {
    load_name: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    display_category: Option<String>,
}

const ADAPTER_ROLE: &str = "adapter";

impl LabwareDefinition {
    /// Parse a definition body
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidDefinition`] if identity fields are missing
    pub fn from_value(body: Value) -> Result<Self, CatalogError> {
        let raw: RawDefinition = serde_json::from_value(body.clone())
            .map_err(|e| CatalogError::invalid(describe(&body), e.to_string()))?;

        let uri = DefinitionUri::from_parts(&raw.namespace, &raw.parameters.load_name, raw.version);

        let kind = if raw.module_type.is_some() {
            DefinitionKind::Module
        } else if raw.allowed_roles.iter().any(|r| r == ADAPTER_ROLE)
            || raw.metadata.display_category.as_deref() == Some(ADAPTER_ROLE)
        {
            DefinitionKind::Adapter
        } else {
            DefinitionKind::Labware
        };

        Ok(Self {
            display_name: raw
                .metadata
                .display_name
                .unwrap_or_else(|| raw.parameters.load_name.clone()),
            uri,
            load_name: raw.parameters.load_name,
            namespace: raw.namespace,
            version: raw.version,
            kind,
            well_geometry: raw.wells.unwrap_or_default(),
            body,
        })
    }

    /// Override the kind (used for catalog-registered splits)
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: DefinitionKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Best-effort label for error messages about an unparseable body
fn describe(body: &Value) -> String {
    let load_name = body
        .pointer("/parameters/loadName")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>");
    let namespace = body
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>");
    format!("{namespace}/{load_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plate_body() -> Value {
        json!({
            "namespace": "opentrons",
            "version": 2,
            "parameters": {"loadName": "nest_96_wellplate_200ul_flat"},
            "metadata": {"displayName": "NEST 96 Well Plate 200 µL Flat", "displayCategory": "wellPlate"},
            "wells": {
                "A1": {"depth": 10.8, "totalLiquidVolume": 200, "shape": "circular", "diameter": 6.85, "x": 14.38, "y": 74.24, "z": 3.4},
                "A2": {"depth": 10.8, "totalLiquidVolume": 200, "shape": "circular", "diameter": 6.85, "x": 23.38, "y": 74.24, "z": 3.4}
            }
        })
    }

    #[test]
    fn parses_labware_identity_and_geometry() {
        let def = LabwareDefinition::from_value(plate_body()).unwrap();
        assert_eq!(def.uri.as_str(), "opentrons/nest_96_wellplate_200ul_flat/2");
        assert_eq!(def.load_name, "nest_96_wellplate_200ul_flat");
        assert_eq!(def.kind, DefinitionKind::Labware);
        assert_eq!(def.well_geometry.well_count(), 2);
    }

    #[test]
    fn adapter_role_is_explicit() {
        let def = LabwareDefinition::from_value(json!({
            "namespace": "opentrons",
            "version": 1,
            "parameters": {"loadName": "opentrons_96_pcr_adapter"},
            "metadata": {"displayName": "PCR Adapter", "displayCategory": "adapter"},
            "allowedRoles": ["adapter"],
            "wells": {}
        }))
        .unwrap();
        assert!(def.kind.is_adapter());
    }

    #[test]
    fn module_type_marks_module() {
        let def = LabwareDefinition::from_value(json!({
            "namespace": "opentrons",
            "version": 1,
            "parameters": {"loadName": "heaterShakerModuleV1"},
            "moduleType": "heaterShakerModuleType"
        }))
        .unwrap();
        assert_eq!(def.kind, DefinitionKind::Module);
        assert_eq!(def.display_name, "heaterShakerModuleV1");
    }

    #[test]
    fn missing_load_name_is_invalid() {
        let err = LabwareDefinition::from_value(json!({"namespace": "custom", "version": 1}))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDefinition { .. }));
    }
}
