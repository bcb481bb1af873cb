//! JSON codec for commands and option trees.
//!
//! Decoding is two-phase at every level of the tree. Phase one reads only
//! `name` and `type` of a node to pick the concrete variant; phase two parses
//! the same bytes into that variant and recurses into its children. Unknown
//! discriminants never fail: the node is kept as an [`UnknownOption`] with its
//! raw bytes.
//!
//! Encoding mirrors this by injecting each variant's discriminant next to its
//! fields. Unknown options re-emit their original bytes unchanged.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::command::{Command, CommandType};
use super::error::SchemaError;
use super::option::{
    CommandOption, OptionType, OptionValue, SubcommandGroupOption, SubcommandOption,
    UnknownOption,
};
use super::snowflake::Snowflake;

/// Capability name reported when a subcommand holds a non-leaf child.
const VALUE_CAPABILITY: &str = "OptionValue";

/// Capability name reported when a group holds something other than a subcommand.
const SUBCOMMAND_CAPABILITY: &str = "Subcommand";

// ============================================================================
// Public entry points
// ============================================================================

/// Decode a single command.
pub fn decode_command(bytes: &[u8]) -> Result<Command, SchemaError> {
    let raw: Box<RawValue> = serde_json::from_slice(bytes).map_err(SchemaError::decode("command"))?;
    command_from_raw(&raw)
}

/// Decode a JSON array of commands.
pub fn decode_commands(bytes: &[u8]) -> Result<Vec<Command>, SchemaError> {
    let raws: Vec<Box<RawValue>> =
        serde_json::from_slice(bytes).map_err(SchemaError::decode("command list"))?;
    raws.iter().map(|raw| command_from_raw(raw)).collect()
}

/// Decode a single option node (and everything below it).
pub fn decode_option(bytes: &[u8]) -> Result<CommandOption, SchemaError> {
    let raw: Box<RawValue> = serde_json::from_slice(bytes).map_err(SchemaError::decode("option"))?;
    option_from_raw(&raw)
}

/// Encode a command.
pub fn encode_command(command: &Command) -> Result<Vec<u8>, SchemaError> {
    serde_json::to_vec(&CommandWire::from(command))
        .map_err(SchemaError::encode(format!("command {:?}", command.name)))
}

/// Encode a list of commands as a JSON array.
pub fn encode_commands(commands: &[Command]) -> Result<Vec<u8>, SchemaError> {
    let wires: Vec<CommandWire<'_>> = commands.iter().map(CommandWire::from).collect();
    serde_json::to_vec(&wires).map_err(SchemaError::encode("command list"))
}

/// Encode a single option node.
pub fn encode_option(option: &CommandOption) -> Result<Vec<u8>, SchemaError> {
    serde_json::to_vec(option).map_err(SchemaError::encode(format!("option {:?}", option.name())))
}

// ============================================================================
// Decoding
// ============================================================================

/// Phase one view of an option: just enough to pick the variant.
#[derive(Deserialize)]
struct OptionHeader {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    code: u64,
}

#[derive(Deserialize)]
struct RawSubcommand {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    options: Option<Vec<Box<RawValue>>>,
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(default)]
    id: Snowflake,
    #[serde(rename = "type", default)]
    kind: Option<u8>,
    #[serde(default)]
    application_id: Snowflake,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    options: Option<Vec<Box<RawValue>>>,
    #[serde(default)]
    default_permission: Option<bool>,
    #[serde(default)]
    version: Snowflake,
}

fn parse<'a, T: Deserialize<'a>>(raw: &'a RawValue, context: impl FnOnce() -> String) -> Result<T, SchemaError> {
    serde_json::from_str(raw.get()).map_err(|source| SchemaError::Decode {
        context: context(),
        source,
    })
}

fn command_from_raw(raw: &RawValue) -> Result<Command, SchemaError> {
    let wire: RawCommand = parse(raw, || "command".to_string())?;

    let options = wire
        .options
        .unwrap_or_default()
        .iter()
        .map(|child| option_from_raw(child))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Command {
        id: wire.id,
        // The wire omits the type for chat-input commands.
        kind: match wire.kind {
            None | Some(0) => CommandType::ChatInput,
            Some(code) => CommandType::from_code(code),
        },
        application_id: wire.application_id,
        guild_id: wire.guild_id.filter(|id| !id.is_zero()),
        name: wire.name,
        description: wire.description,
        options,
        // Absent means enabled; the local flag is the inverse.
        no_default_permission: !wire.default_permission.unwrap_or(true),
        version: wire.version,
    })
}

pub(crate) fn option_from_raw(raw: &RawValue) -> Result<CommandOption, SchemaError> {
    let header: OptionHeader = parse(raw, || "option header".to_string())?;
    let kind = OptionType::from_code(header.code);
    let context = || format!("option {:?} of type {}", header.name, kind);

    let option = match kind {
        OptionType::Subcommand => CommandOption::Subcommand(subcommand_from_raw(raw)?),
        OptionType::SubcommandGroup => CommandOption::SubcommandGroup(group_from_raw(raw)?),
        OptionType::String => OptionValue::String(parse(raw, context)?).into(),
        OptionType::Integer => OptionValue::Integer(parse(raw, context)?).into(),
        OptionType::Boolean => OptionValue::Boolean(parse(raw, context)?).into(),
        OptionType::User => OptionValue::User(parse(raw, context)?).into(),
        OptionType::Channel => OptionValue::Channel(parse(raw, context)?).into(),
        OptionType::Role => OptionValue::Role(parse(raw, context)?).into(),
        OptionType::Mentionable => OptionValue::Mentionable(parse(raw, context)?).into(),
        OptionType::Number => OptionValue::Number(parse(raw, context)?).into(),
        OptionType::Unknown(code) => {
            log::debug!("[Schema] keeping option {:?} with unknown type {} verbatim", header.name, code);
            OptionValue::Unknown(UnknownOption::new(header.name, code, raw.to_owned())).into()
        }
    };

    Ok(option)
}

fn subcommand_from_raw(raw: &RawValue) -> Result<SubcommandOption, SchemaError> {
    let wire: RawSubcommand = parse(raw, || "subcommand".to_string())?;

    let mut options = Vec::new();
    for child in wire.options.unwrap_or_default() {
        match option_from_raw(&child)? {
            CommandOption::Value(value) => options.push(value),
            other => {
                return Err(SchemaError::TypeMismatch {
                    name: other.name().to_string(),
                    actual: Box::new(other),
                    expected: VALUE_CAPABILITY,
                })
            }
        }
    }

    Ok(SubcommandOption {
        name: wire.name,
        description: wire.description,
        required: wire.required,
        options,
    })
}

fn group_from_raw(raw: &RawValue) -> Result<SubcommandGroupOption, SchemaError> {
    let wire: RawSubcommand = parse(raw, || "subcommand group".to_string())?;

    let mut subcommands = Vec::new();
    for child in wire.options.unwrap_or_default() {
        match option_from_raw(&child)? {
            CommandOption::Subcommand(sub) => subcommands.push(sub),
            other => {
                return Err(SchemaError::TypeMismatch {
                    name: other.name().to_string(),
                    actual: Box::new(other),
                    expected: SUBCOMMAND_CAPABILITY,
                })
            }
        }
    }

    Ok(SubcommandGroupOption {
        name: wire.name,
        description: wire.description,
        required: wire.required,
        subcommands,
    })
}

// ============================================================================
// Encoding
// ============================================================================

/// Adds the `type` discriminant in front of a variant's own fields.
#[derive(Serialize)]
struct Tagged<'a, T> {
    #[serde(rename = "type")]
    code: u64,
    #[serde(flatten)]
    body: &'a T,
}

fn tagged<T: Serialize, S: Serializer>(kind: OptionType, body: &T, serializer: S) -> Result<S::Ok, S::Error> {
    Tagged {
        code: kind.code(),
        body,
    }
    .serialize(serializer)
}

#[derive(Serialize)]
struct ParentWire<'a, C> {
    name: &'a str,
    description: &'a str,
    required: bool,
    #[serde(skip_serializing_if = "<[C]>::is_empty")]
    options: &'a [C],
}

#[derive(Serialize)]
struct CommandWire<'a> {
    #[serde(skip_serializing_if = "Snowflake::is_zero")]
    id: Snowflake,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Snowflake::is_zero")]
    application_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    guild_id: Option<Snowflake>,
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "<[CommandOption]>::is_empty")]
    options: &'a [CommandOption],
    default_permission: bool,
    #[serde(skip_serializing_if = "Snowflake::is_zero")]
    version: Snowflake,
}

impl<'a> From<&'a Command> for CommandWire<'a> {
    fn from(c: &'a Command) -> Self {
        Self {
            id: c.id,
            kind: c.kind.code(),
            application_id: c.application_id,
            guild_id: c.guild_id,
            name: &c.name,
            description: &c.description,
            options: &c.options,
            default_permission: !c.no_default_permission,
            version: c.version,
        }
    }
}

impl Serialize for SubcommandOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = ParentWire {
            name: &self.name,
            description: &self.description,
            required: self.required,
            options: &self.options,
        };
        tagged(OptionType::Subcommand, &body, serializer)
    }
}

impl Serialize for SubcommandGroupOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = ParentWire {
            name: &self.name,
            description: &self.description,
            required: self.required,
            options: &self.subcommands,
        };
        tagged(OptionType::SubcommandGroup, &body, serializer)
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.option_type();
        match self {
            Self::String(o) => tagged(kind, o, serializer),
            Self::Integer(o) => tagged(kind, o, serializer),
            Self::Boolean(o) => tagged(kind, o, serializer),
            Self::User(o) | Self::Role(o) | Self::Mentionable(o) => tagged(kind, o, serializer),
            Self::Channel(o) => tagged(kind, o, serializer),
            Self::Number(o) => tagged(kind, o, serializer),
            Self::Unknown(o) => o.raw_value().serialize(serializer),
        }
    }
}

impl Serialize for CommandOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Subcommand(o) => o.serialize(serializer),
            Self::SubcommandGroup(o) => o.serialize(serializer),
            Self::Value(v) => v.serialize(serializer),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CommandWire::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        command_from_raw(&raw).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CommandOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        option_from_raw(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::option::{Choice, StringOption};

    #[test]
    fn test_option_type_is_injected_first() {
        let option = CommandOption::Value(OptionValue::String(StringOption {
            name: "query".into(),
            description: "what to search".into(),
            ..StringOption::default()
        }));
        let json = String::from_utf8(encode_option(&option).unwrap()).unwrap();
        assert!(json.starts_with(r#"{"type":3,"name":"query""#), "{json}");
    }

    #[test]
    fn test_missing_type_and_permission_get_wire_defaults() {
        let command = decode_command(br#"{"id":"1","application_id":"2","name":"ping","description":"pong"}"#).unwrap();
        assert_eq!(command.kind, CommandType::ChatInput);
        assert!(!command.no_default_permission);
        assert!(command.options.is_empty());
        assert!(command.guild_id.is_none());
    }

    #[test]
    fn test_zero_type_defaults_to_chat_input() {
        let command = decode_command(br#"{"type":0,"name":"ping","description":"pong"}"#).unwrap();
        assert_eq!(command.kind, CommandType::ChatInput);
    }

    #[test]
    fn test_default_permission_false_sets_local_flag() {
        let command =
            decode_command(br#"{"name":"ban","description":"ban","default_permission":false}"#).unwrap();
        assert!(command.no_default_permission);
    }

    #[test]
    fn test_group_rejects_leaf_child() {
        let err = decode_option(
            br#"{"type":2,"name":"config","description":"d","options":[{"type":3,"name":"key","description":"k"}]}"#,
        )
        .unwrap_err();
        match err {
            SchemaError::TypeMismatch { name, expected, actual } => {
                assert_eq!(name, "key");
                assert_eq!(expected, SUBCOMMAND_CAPABILITY);
                assert_eq!(actual.option_type(), OptionType::String);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_leaf_is_decode_error() {
        let err = decode_option(br#"{"type":4,"name":"n","choices":[{"name":"a","value":"nope"}]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Decode { .. }), "{err}");
        assert!(err.to_string().contains("\"n\""));
    }

    #[test]
    fn test_choice_values_are_typed() {
        let option = decode_option(
            br#"{"type":6,"name":"who","description":"d","choices":[{"name":"me","value":"80351110224678912"}]}"#,
        )
        .unwrap();
        let CommandOption::Value(OptionValue::User(user)) = option else {
            panic!("expected user option");
        };
        assert_eq!(user.choices, vec![Choice::new("me", Snowflake(80_351_110_224_678_912))]);
    }

    #[test]
    fn test_command_serde_impls_match_codec() {
        let bytes = br#"{"id":"5","type":2,"application_id":"7","name":"Report","description":"","default_permission":true}"#;
        let via_serde: Command = serde_json::from_slice(bytes).unwrap();
        let via_codec = decode_command(bytes).unwrap();
        assert_eq!(via_serde, via_codec);
        assert_eq!(serde_json::to_vec(&via_serde).unwrap(), encode_command(&via_codec).unwrap());
    }
}
