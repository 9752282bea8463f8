//! Error types for definition lookup

/// Errors from the definition catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// No definition registered under the URI
    #[error("definition not found: {0}")]
    NotFound(String),

    /// Definition body is missing required fields
    #[error("invalid definition {uri}: {reason}")]
    InvalidDefinition { uri: String, reason: String },
}

impl CatalogError {
    /// Create invalid definition error
    pub fn invalid(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}
