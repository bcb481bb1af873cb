//! Application command schema.
//!
//! Typed model of commands and their option tree, plus the JSON codec that
//! moves them across the wire. Nothing here touches the network.

mod codec;
mod command;
mod error;
mod option;
mod snowflake;
mod validate;

pub use codec::{
    decode_command, decode_commands, decode_option, encode_command, encode_commands,
    encode_option,
};
pub use command::{Command, CommandType};
pub use error::SchemaError;
pub use option::{
    BooleanOption, ChannelOption, Choice, CommandOption, IntegerOption, MentionableOption,
    NumberOption, OptionType, OptionValue, RoleOption, StringOption, SubcommandGroupOption,
    SubcommandOption, UnknownOption, UserOption, ValueOption,
};
pub use snowflake::{ChannelType, Snowflake};
pub use validate::{validate_command, ValidationError};
