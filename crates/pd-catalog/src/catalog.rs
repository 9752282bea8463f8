//! Definition catalogs
//!
//! [`DefinitionCatalog`] is the read-only lookup migrators resolve URIs
//! through. [`InMemoryCatalog`] owns definitions; [`LayeredCatalog`] chains
//! two catalogs so a shared library can be backed by a document's own
//! embedded definitions.

use crate::definition::{DefinitionKind, LabwareDefinition};
use crate::error::CatalogError;
use crate::splits::{builtin_splits, SplitPair};
use indexmap::IndexMap;
use pd_schema::DefinitionUri;
use serde_json::Value;

/// Read-only definition lookup
pub trait DefinitionCatalog: Send + Sync {
    /// Definition registered under `uri`
    fn get(&self, uri: &str) -> Option<&LabwareDefinition>;

    /// Halves of a combined definition, if `uri` is one
    fn split(&self, _uri: &str) -> Option<&SplitPair> {
        None
    }

    /// Definition registered under `uri`, or [`CatalogError::NotFound`]
    fn resolve(&self, uri: &str) -> Result<&LabwareDefinition, CatalogError> {
        self.get(uri)
            .ok_or_else(|| CatalogError::NotFound(uri.to_string()))
    }

    /// Kind of the definition under `uri`
    ///
    /// Combined definitions classify as [`DefinitionKind::Stacked`] even when
    /// their body is not registered.
    fn kind_of(&self, uri: &str) -> Result<DefinitionKind, CatalogError> {
        if let Some(pair) = self.split(uri) {
            return Ok(DefinitionKind::Stacked {
                adapter: pair.adapter.clone(),
                labware: pair.labware.clone(),
            });
        }
        Ok(self.resolve(uri)?.kind.clone())
    }
}

/// Catalog held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    definitions: IndexMap<DefinitionUri, LabwareDefinition>,
    splits: IndexMap<DefinitionUri, SplitPair>,
}

impl InMemoryCatalog {
    /// Create empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create catalog that knows the built-in combined definitions
    #[must_use]
    pub fn with_builtin_splits() -> Self {
        let mut catalog = Self::new();
        for (combined, pair) in builtin_splits() {
            catalog.register_split(combined, pair);
        }
        catalog
    }

    /// Register a parsed definition, replacing any previous one
    pub fn insert(&mut self, definition: LabwareDefinition) {
        let definition = match self.splits.get(&definition.uri) {
            Some(pair) => definition.with_kind(DefinitionKind::Stacked {
                adapter: pair.adapter.clone(),
                labware: pair.labware.clone(),
            }),
            None => definition,
        };
        tracing::debug!(
            "Registered definition: {} ({} wells)",
            definition.uri,
            definition.well_geometry.well_count()
        );
        self.definitions.insert(definition.uri.clone(), definition);
    }

    /// Parse and register a raw body, returning its URI
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidDefinition`] if the body does not parse
    pub fn insert_value(&mut self, body: Value) -> Result<DefinitionUri, CatalogError> {
        let definition = LabwareDefinition::from_value(body)?;
        let uri = definition.uri.clone();
        self.insert(definition);
        Ok(uri)
    }

    /// Mark `combined` as a combined definition
    pub fn register_split(&mut self, combined: DefinitionUri, pair: SplitPair) {
        if let Some(def) = self.definitions.get_mut(&combined) {
            def.kind = DefinitionKind::Stacked {
                adapter: pair.adapter.clone(),
                labware: pair.labware.clone(),
            };
        }
        self.splits.insert(combined, pair);
    }

    /// Number of registered definitions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if no definitions are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionCatalog for InMemoryCatalog {
    fn get(&self, uri: &str) -> Option<&LabwareDefinition> {
        self.definitions.get(uri)
    }

    fn split(&self, uri: &str) -> Option<&SplitPair> {
        self.splits.get(uri)
    }
}

/// Two catalogs consulted in order
pub struct LayeredCatalog<'a> {
    primary: &'a dyn DefinitionCatalog,
    fallback: &'a dyn DefinitionCatalog,
}

impl<'a> LayeredCatalog<'a> {
    /// Create layered catalog; `primary` wins on conflicts
    #[must_use]
    pub fn new(primary: &'a dyn DefinitionCatalog, fallback: &'a dyn DefinitionCatalog) -> Self {
        Self { primary, fallback }
    }
}

impl DefinitionCatalog for LayeredCatalog<'_> {
    fn get(&self, uri: &str) -> Option<&LabwareDefinition> {
        self.primary.get(uri).or_else(|| self.fallback.get(uri))
    }

    fn split(&self, uri: &str) -> Option<&SplitPair> {
        self.primary.split(uri).or_else(|| self.fallback.split(uri))
    }
}
