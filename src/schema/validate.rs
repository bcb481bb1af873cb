//! Structural validation of commands.
//!
//! The codec accepts anything the wire can carry. These checks catch the
//! commands the platform would reject on registration: bad names, long
//! descriptions, oversized option lists, and required options placed after
//! optional ones.
//!
//! # Examples
//!
//! ```
//! use gatewire::schema::{validate_command, Command};
//!
//! assert!(validate_command(&Command::new("ping", "Replies with pong")).is_empty());
//! assert!(!validate_command(&Command::new("Bad Name!", "x")).is_empty());
//! ```

use thiserror::Error;

use super::command::{Command, CommandType};
use super::option::{CommandOption, OptionValue, SubcommandOption};
use crate::constants::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_OPTIONS};

/// Command validation errors.
///
/// `scope` is the dotted path to the offending node, starting at the command
/// name (e.g. `config.set.key`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name is empty, too long, or uses characters outside `[\w-]`.
    #[error("invalid name at {0}")]
    InvalidName(String),
    /// Description is empty or longer than the platform allows.
    #[error("invalid description at {0}")]
    InvalidDescription(String),
    /// An option sequence is longer than the platform allows.
    #[error("too many options at {scope}: {count}")]
    TooManyOptions {
        /// Path of the parent node.
        scope: String,
        /// Number of options found.
        count: usize,
    },
    /// A required option follows an optional one.
    #[error("required option {option} follows an optional one at {scope}")]
    RequiredAfterOptional {
        /// Path of the parent node.
        scope: String,
        /// Name of the misplaced option.
        option: String,
    },
}

/// Validate a command and its whole option tree.
///
/// Returns every problem found; an empty vector means the command is valid.
/// Context-menu commands only get their option count checked, since the
/// platform accepts free-form names and no description for them.
#[must_use]
pub fn validate_command(command: &Command) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let scope = command.name.clone();

    if command.kind == CommandType::ChatInput {
        check_text(&command.name, &command.description, &scope, &mut errors);
    }

    check_count(command.options.len(), &scope, &mut errors);
    check_order(
        command.options.iter().map(|o| (o.name(), option_required(o))),
        &scope,
        &mut errors,
    );

    for option in &command.options {
        let path = format!("{scope}.{}", option.name());
        match option {
            CommandOption::Subcommand(sub) => validate_subcommand(sub, &path, &mut errors),
            CommandOption::SubcommandGroup(group) => {
                check_text(&group.name, &group.description, &path, &mut errors);
                check_count(group.subcommands.len(), &path, &mut errors);
                for sub in &group.subcommands {
                    validate_subcommand(sub, &format!("{path}.{}", sub.name), &mut errors);
                }
            }
            CommandOption::Value(value) => validate_value(value, &path, &mut errors),
        }
    }

    errors
}

fn validate_subcommand(sub: &SubcommandOption, path: &str, errors: &mut Vec<ValidationError>) {
    check_text(&sub.name, &sub.description, path, errors);
    check_count(sub.options.len(), path, errors);
    check_order(
        sub.options.iter().map(|v| (v.name(), v.required())),
        path,
        errors,
    );
    for value in &sub.options {
        validate_value(value, &format!("{path}.{}", value.name()), errors);
    }
}

fn validate_value(value: &OptionValue, path: &str, errors: &mut Vec<ValidationError>) {
    // Opaque options are passed through as received.
    if let Some(description) = value.description() {
        check_text(value.name(), description, path, errors);
    }
}

fn option_required(option: &CommandOption) -> Option<bool> {
    match option {
        CommandOption::Subcommand(o) => Some(o.required),
        CommandOption::SubcommandGroup(o) => Some(o.required),
        CommandOption::Value(v) => v.required(),
    }
}

fn check_text(name: &str, description: &str, path: &str, errors: &mut Vec<ValidationError>) {
    if !is_valid_name(name) {
        errors.push(ValidationError::InvalidName(path.to_string()));
    }
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        errors.push(ValidationError::InvalidDescription(path.to_string()));
    }
}

fn check_count(count: usize, scope: &str, errors: &mut Vec<ValidationError>) {
    if count > MAX_OPTIONS {
        errors.push(ValidationError::TooManyOptions {
            scope: scope.to_string(),
            count,
        });
    }
}

fn check_order<'a>(
    options: impl Iterator<Item = (&'a str, Option<bool>)>,
    scope: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen_optional = false;
    for (name, required) in options {
        match required {
            Some(true) if seen_optional => errors.push(ValidationError::RequiredAfterOptional {
                scope: scope.to_string(),
                option: name.to_string(),
            }),
            Some(false) => seen_optional = true,
            _ => {}
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_NAME_LEN).contains(&len)
        && name
            .chars()
            .all(|c| c == '-' || c == '_' || c.is_alphanumeric())
}
