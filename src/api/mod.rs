//! Request/response client for the command endpoints.
//!
//! Every call is bound to the client's [`CancellationToken`]; cancelling it
//! aborts in-flight requests with [`ApiError::Cancelled`]. Request and
//! response bodies go through the schema codec, so unknown option kinds
//! survive a fetch-edit-upload cycle unchanged.

mod client;

use std::fmt;

use thiserror::Error;

use crate::schema::{SchemaError, Snowflake};

pub use client::Client;

/// Errors returned by [`Client`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },
    /// A request or response body did not match the command schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The client's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,
}

/// Which command list a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    /// Commands visible in every guild.
    Global,
    /// Commands registered for one guild.
    Guild(Snowflake),
}

impl CommandScope {
    /// Path of the command collection for `application_id`.
    #[must_use]
    pub fn path(self, application_id: Snowflake) -> String {
        match self {
            Self::Global => format!("/applications/{application_id}/commands"),
            Self::Guild(guild) => {
                format!("/applications/{application_id}/guilds/{guild}/commands")
            }
        }
    }
}

impl fmt::Display for CommandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_paths() {
        let app = Snowflake(10);
        assert_eq!(CommandScope::Global.path(app), "/applications/10/commands");
        assert_eq!(
            CommandScope::Guild(Snowflake(20)).path(app),
            "/applications/10/guilds/20/commands"
        );
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status {
            status: 403,
            body: "Missing Access".into(),
        };
        assert_eq!(err.to_string(), "server returned 403: Missing Access");
    }
}
