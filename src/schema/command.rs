//! Application command model.

use std::fmt;

use chrono::{DateTime, Utc};

use super::option::CommandOption;
use super::snowflake::Snowflake;

/// Where a command can be invoked from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Typed into the chat input box. The wire default.
    #[default]
    ChatInput,
    /// Context menu on a user.
    User,
    /// Context menu on a message.
    Message,
    /// Invocation source this crate does not know.
    Unknown(u8),
}

impl CommandType {
    /// Map a wire discriminant to its command type.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::ChatInput,
            2 => Self::User,
            3 => Self::Message,
            other => Self::Unknown(other),
        }
    }

    /// The wire discriminant.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ChatInput => 1,
            Self::User => 2,
            Self::Message => 3,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatInput => f.write_str("ChatInput"),
            Self::User => f.write_str("User"),
            Self::Message => f.write_str("Message"),
            Self::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

/// An application command.
///
/// `no_default_permission` is the local, inverted form of the wire field
/// `default_permission`: the zero value of this struct describes a command
/// that is enabled by default. The codec flips it at the boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    /// Command id, assigned by the platform.
    pub id: Snowflake,
    /// Invocation source.
    pub kind: CommandType,
    /// Owning application.
    pub application_id: Snowflake,
    /// Guild the command is scoped to; `None` for global commands.
    pub guild_id: Option<Snowflake>,
    /// Command name.
    pub name: String,
    /// Command description. Empty for context-menu commands.
    pub description: String,
    /// Top-level options, in order.
    pub options: Vec<CommandOption>,
    /// Disabled for everyone until permissions are granted.
    pub no_default_permission: bool,
    /// Version stamp, bumped by the platform on every update.
    pub version: Snowflake,
}

impl Command {
    /// A chat-input command with a name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Whether the command is visible in every guild.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Creation time, derived from the command id.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.id.created_at()
    }
}
