//! Command option tree.
//!
//! Options form a closed, three-level tree:
//!
//! ```text
//! Command
//!   ├── SubcommandGroup ── Subcommand ── OptionValue*
//!   ├── Subcommand ── OptionValue*
//!   └── OptionValue
//! ```
//!
//! [`OptionValue`] is the leaf capability: every variant that is neither a
//! subcommand nor a group. [`UnknownOption`] belongs to it as well, so a
//! subcommand may carry option kinds newer than this crate.
//!
//! Leaf structs derive serde without the `type` discriminant. Go through
//! [`CommandOption`] or [`OptionValue`] (or the functions in
//! [`super::codec`]) to get the wire shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::snowflake::{ChannelType, Snowflake};

/// Wire discriminant of an option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionType {
    /// `1`
    Subcommand,
    /// `2`
    SubcommandGroup,
    /// `3`
    String,
    /// `4`
    Integer,
    /// `5`
    Boolean,
    /// `6`
    User,
    /// `7`
    Channel,
    /// `8`
    Role,
    /// `9`
    Mentionable,
    /// `10`
    Number,
    /// Any discriminant this crate does not know.
    Unknown(u64),
}

impl OptionType {
    /// Map a wire discriminant to its option type.
    #[must_use]
    pub const fn from_code(code: u64) -> Self {
        match code {
            1 => Self::Subcommand,
            2 => Self::SubcommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            other => Self::Unknown(other),
        }
    }

    /// The wire discriminant.
    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::Subcommand => 1,
            Self::SubcommandGroup => 2,
            Self::String => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
            Self::Mentionable => 9,
            Self::Number => 10,
            Self::Unknown(code) => code,
        }
    }

    /// Whether options of this type may appear under a subcommand.
    #[must_use]
    pub const fn is_value(self) -> bool {
        !matches!(self, Self::Subcommand | Self::SubcommandGroup)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subcommand => f.write_str("Subcommand"),
            Self::SubcommandGroup => f.write_str("SubcommandGroup"),
            Self::String => f.write_str("String"),
            Self::Integer => f.write_str("Integer"),
            Self::Boolean => f.write_str("Boolean"),
            Self::User => f.write_str("User"),
            Self::Channel => f.write_str("Channel"),
            Self::Role => f.write_str("Role"),
            Self::Mentionable => f.write_str("Mentionable"),
            Self::Number => f.write_str("Number"),
            Self::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

/// Any node of the option tree.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOption {
    /// A subcommand with leaf-value children.
    Subcommand(SubcommandOption),
    /// A group of subcommands.
    SubcommandGroup(SubcommandGroupOption),
    /// A leaf value (including unknown kinds).
    Value(OptionValue),
}

impl CommandOption {
    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Subcommand(o) => &o.name,
            Self::SubcommandGroup(o) => &o.name,
            Self::Value(v) => v.name(),
        }
    }

    /// Wire discriminant.
    #[must_use]
    pub fn option_type(&self) -> OptionType {
        match self {
            Self::Subcommand(_) => OptionType::Subcommand,
            Self::SubcommandGroup(_) => OptionType::SubcommandGroup,
            Self::Value(v) => v.option_type(),
        }
    }
}

impl From<SubcommandOption> for CommandOption {
    fn from(o: SubcommandOption) -> Self {
        Self::Subcommand(o)
    }
}

impl From<SubcommandGroupOption> for CommandOption {
    fn from(o: SubcommandGroupOption) -> Self {
        Self::SubcommandGroup(o)
    }
}

impl From<OptionValue> for CommandOption {
    fn from(v: OptionValue) -> Self {
        Self::Value(v)
    }
}

/// A group of subcommands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubcommandGroupOption {
    /// Group name.
    pub name: String,
    /// Group description.
    pub description: String,
    /// Required flag.
    pub required: bool,
    /// Subcommands, in order.
    pub subcommands: Vec<SubcommandOption>,
}

/// A subcommand whose children are leaf values only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubcommandOption {
    /// Subcommand name.
    pub name: String,
    /// Subcommand description.
    pub description: String,
    /// Required flag.
    pub required: bool,
    /// Leaf values, in order.
    pub options: Vec<OptionValue>,
}

/// Leaf-value capability: everything that can sit under a subcommand.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    /// Text value.
    String(StringOption),
    /// Integer value.
    Integer(IntegerOption),
    /// Boolean value.
    Boolean(BooleanOption),
    /// User reference.
    User(UserOption),
    /// Channel reference.
    Channel(ChannelOption),
    /// Role reference.
    Role(RoleOption),
    /// User or role reference.
    Mentionable(MentionableOption),
    /// Floating point value.
    Number(NumberOption),
    /// Option kind this crate does not know, kept verbatim.
    Unknown(UnknownOption),
}

impl OptionValue {
    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::String(o) => &o.name,
            Self::Integer(o) => &o.name,
            Self::Boolean(o) => &o.name,
            Self::User(o) => &o.name,
            Self::Channel(o) => &o.name,
            Self::Role(o) => &o.name,
            Self::Mentionable(o) => &o.name,
            Self::Number(o) => &o.name,
            Self::Unknown(o) => o.name(),
        }
    }

    /// Wire discriminant.
    #[must_use]
    pub fn option_type(&self) -> OptionType {
        match self {
            Self::String(_) => OptionType::String,
            Self::Integer(_) => OptionType::Integer,
            Self::Boolean(_) => OptionType::Boolean,
            Self::User(_) => OptionType::User,
            Self::Channel(_) => OptionType::Channel,
            Self::Role(_) => OptionType::Role,
            Self::Mentionable(_) => OptionType::Mentionable,
            Self::Number(_) => OptionType::Number,
            Self::Unknown(o) => o.option_type(),
        }
    }

    /// Required flag, or `None` for unknown kinds whose shape is opaque.
    #[must_use]
    pub fn required(&self) -> Option<bool> {
        match self {
            Self::String(o) => Some(o.required),
            Self::Integer(o) => Some(o.required),
            Self::Boolean(o) => Some(o.required),
            Self::User(o) => Some(o.required),
            Self::Channel(o) => Some(o.required),
            Self::Role(o) => Some(o.required),
            Self::Mentionable(o) => Some(o.required),
            Self::Number(o) => Some(o.required),
            Self::Unknown(_) => None,
        }
    }

    /// Option description, or `None` for unknown kinds.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::String(o) => Some(&o.description),
            Self::Integer(o) => Some(&o.description),
            Self::Boolean(o) => Some(&o.description),
            Self::User(o) => Some(&o.description),
            Self::Channel(o) => Some(&o.description),
            Self::Role(o) => Some(&o.description),
            Self::Mentionable(o) => Some(&o.description),
            Self::Number(o) => Some(&o.description),
            Self::Unknown(_) => None,
        }
    }
}

/// A display name paired with a value of the owning option's kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice<T> {
    /// Name shown to the user.
    pub name: String,
    /// Value sent back when the choice is picked.
    pub value: T,
}

impl<T> Choice<T> {
    /// Build a choice.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Leaf option whose only extra field is its choice list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueOption<T> {
    /// Option name.
    pub name: String,
    /// Option description.
    #[serde(default)]
    pub description: String,
    /// Required flag.
    #[serde(default)]
    pub required: bool,
    /// Allowed values; empty means free input.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice<T>>,
}

/// Integer option.
pub type IntegerOption = ValueOption<i64>;
/// Boolean option.
pub type BooleanOption = ValueOption<bool>;
/// User option; choices carry user ids.
pub type UserOption = ValueOption<Snowflake>;
/// Role option; choices carry role ids.
pub type RoleOption = ValueOption<Snowflake>;
/// Mentionable option; choices carry user or role ids.
pub type MentionableOption = ValueOption<Snowflake>;
/// Number option.
pub type NumberOption = ValueOption<f64>;

/// Text option.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StringOption {
    /// Option name.
    pub name: String,
    /// Option description.
    #[serde(default)]
    pub description: String,
    /// Required flag.
    #[serde(default)]
    pub required: bool,
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice<String>>,
    /// Whether the client asks the application for suggestions while typing.
    #[serde(default)]
    pub autocomplete: bool,
}

/// Channel option.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelOption {
    /// Option name.
    pub name: String,
    /// Option description.
    #[serde(default)]
    pub description: String,
    /// Required flag.
    #[serde(default)]
    pub required: bool,
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice<Snowflake>>,
    /// Channel kinds the user may pick; empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<ChannelType>,
}

/// An option with a discriminant this crate does not recognize.
///
/// The original bytes are kept and re-emitted unchanged on encode.
#[derive(Clone, Debug)]
pub struct UnknownOption {
    name: String,
    code: u64,
    raw: Box<RawValue>,
}

impl UnknownOption {
    pub(crate) fn new(name: String, code: u64, raw: Box<RawValue>) -> Self {
        Self { name, code, raw }
    }

    /// Name read from the raw object.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discriminant read from the raw object.
    #[must_use]
    pub fn option_type(&self) -> OptionType {
        OptionType::Unknown(self.code)
    }

    /// The exact bytes this option was decoded from.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        self.raw.get().as_bytes()
    }

    pub(crate) fn raw_value(&self) -> &RawValue {
        &self.raw
    }
}

impl PartialEq for UnknownOption {
    fn eq(&self, other: &Self) -> bool {
        self.raw.get() == other.raw.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_type_codes_round_trip() {
        for code in 0..=12 {
            assert_eq!(OptionType::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_only_subcommands_lack_value_capability() {
        assert!(!OptionType::Subcommand.is_value());
        assert!(!OptionType::SubcommandGroup.is_value());
        assert!(OptionType::String.is_value());
        assert!(OptionType::Unknown(42).is_value());
    }

    #[test]
    fn test_value_option_omits_empty_choices() {
        let opt = IntegerOption {
            name: "count".into(),
            description: "how many".into(),
            required: true,
            choices: Vec::new(),
        };
        let json = serde_json::to_value(&opt).unwrap();
        assert!(json.get("choices").is_none());
    }

    #[test]
    fn test_unknown_option_reports_name_and_code() {
        let raw = RawValue::from_string(r#"{"name":"x","type":11}"#.to_string()).unwrap();
        let unknown = UnknownOption::new("x".into(), 11, raw);
        assert_eq!(unknown.name(), "x");
        assert_eq!(unknown.option_type(), OptionType::Unknown(11));
        assert_eq!(unknown.raw(), br#"{"name":"x","type":11}"#);
    }
}
