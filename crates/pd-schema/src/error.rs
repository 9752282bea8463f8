//! Error types for the document model

/// Errors raised while decoding or interpreting a protocol document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Version tag could not be parsed
    #[error("invalid schema version '{input}': {reason}")]
    InvalidVersion {
        /// Text that failed to parse
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// Location reference did not match any known shape
    #[error("invalid location reference: {0}")]
    InvalidLocation(String),

    /// Definition URI is not `<namespace>/<loadName>/<version>`
    #[error("invalid definition uri '{0}'")]
    InvalidDefinitionUri(String),

    /// Command params did not match the typed record for its command type
    #[error("invalid params for command '{command_type}': {message}")]
    InvalidCommand {
        /// `commandType` of the offending command
        command_type: String,
        /// Decoder message
        message: String,
    },
}

impl SchemaError {
    /// Create invalid version error
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create invalid command error
    pub fn invalid_command(command_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command_type: command_type.into(),
            message: message.into(),
        }
    }
}
