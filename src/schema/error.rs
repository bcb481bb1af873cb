//! Errors produced by the command codec.

use thiserror::Error;

use super::option::CommandOption;

/// Command codec errors.
///
/// None of these are retried by the codec; a failed decode never yields a
/// partial tree.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The bytes are not the expected JSON shape.
    #[error("failed to decode {context}")]
    Decode {
        /// What was being decoded when the failure happened.
        context: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a command tree failed.
    #[error("failed to encode {context}")]
    Encode {
        /// What was being encoded when the failure happened.
        context: String,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A decoded option sits under a parent that cannot hold it, e.g. a
    /// subcommand nested directly inside another subcommand.
    #[error("error at option name {name:?}: expected {expected}, got {}", .actual.option_type())]
    TypeMismatch {
        /// Name of the offending option.
        name: String,
        /// The option as it was decoded.
        actual: Box<CommandOption>,
        /// Capability the parent requires of its children.
        expected: &'static str,
    },
}

impl SchemaError {
    pub(crate) fn decode(context: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let context = context.into();
        move |source| Self::Decode { context, source }
    }

    pub(crate) fn encode(context: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let context = context.into();
        move |source| Self::Encode { context, source }
    }

    /// Name of the offending option for a [`SchemaError::TypeMismatch`].
    #[must_use]
    pub fn option_name(&self) -> Option<&str> {
        match self {
            Self::TypeMismatch { name, .. } => Some(name),
            _ => None,
        }
    }
}
