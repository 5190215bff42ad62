//! Tool error types.

use thiserror::Error;

/// A tool's argument schema could not be derived from its signature.
///
/// Raised at registration time. It aborts the registration of the one tool
/// it names and leaves the rest of the registry untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SchemaDerivationError {
    /// A declared parameter carries no type.
    #[error("cannot derive schema for {function}: parameter '{parameter}' has no declared type")]
    UntypedParameter { function: String, parameter: String },

    /// Two parameters share a name.
    #[error("cannot derive schema for {function}: parameter '{parameter}' is declared twice")]
    DuplicateParameter { function: String, parameter: String },

    /// An explicit JSON schema could not be read.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Errors raised while resolving, binding, validating or running a tool call.
///
/// All variants are recoverable from the point of view of a conversation:
/// the agent loop turns them into tool messages the model can read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The supplied arguments do not fit the declared parameter list.
    #[error("{message}")]
    Binding { tool: String, message: String },

    /// A bound argument violates the tool's schema.
    #[error("invalid arguments for {tool}: {message}")]
    Validation { tool: String, message: String },

    /// The tool body itself failed.
    #[error("{message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn binding(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Binding {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn validation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Registry errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Schema(#[from] SchemaDerivationError),
}

/// Failure to read a single argument inside a tool body.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("missing argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' has the wrong shape: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_displays_bare_message() {
        let err = ToolError::execution("calculate", "Unsupported character included(^)");
        assert_eq!(err.to_string(), "Unsupported character included(^)");
    }

    #[test]
    fn derivation_error_names_function_and_parameter() {
        let err = SchemaDerivationError::UntypedParameter {
            function: "add".into(),
            parameter: "b".into(),
        };
        let text = err.to_string();
        assert!(text.contains("add"));
        assert!(text.contains("'b'"));
    }
}
