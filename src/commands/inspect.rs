//! Offline command inspection.
//!
//! Reads a command, or an array of commands, from a JSON file; reports
//! validation problems on stderr and writes the re-encoded JSON to stdout.
//! Unknown option kinds are re-emitted byte for byte.
//!
//! ```bash
//! gatewire inspect commands.json > normalized.json
//! ```

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};

use crate::schema::{self, validate_command, Command};

/// Result of inspecting one JSON document.
#[derive(Debug)]
pub struct Report {
    /// Number of commands decoded.
    pub commands: usize,
    /// One line per validation problem, prefixed with the command name.
    pub problems: Vec<String>,
    /// The document re-encoded through the codec.
    pub encoded: Vec<u8>,
}

/// Decode, validate and re-encode a JSON document.
///
/// # Errors
///
/// Returns an error if the document is not a valid command or command list.
pub fn inspect_bytes(bytes: &[u8]) -> Result<Report> {
    let is_list = bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'[');

    let (commands, encoded) = if is_list {
        let commands = schema::decode_commands(bytes).context("Failed to decode command list")?;
        let encoded = schema::encode_commands(&commands)?;
        (commands, encoded)
    } else {
        let command = schema::decode_command(bytes).context("Failed to decode command")?;
        let encoded = schema::encode_command(&command)?;
        (vec![command], encoded)
    };

    Ok(Report {
        commands: commands.len(),
        problems: commands.iter().flat_map(problems).collect(),
        encoded,
    })
}

fn problems(command: &Command) -> Vec<String> {
    validate_command(command)
        .into_iter()
        .map(|e| format!("{}: {e}", command.name))
        .collect()
}

/// Inspect `file_path` and print the results.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn run(file_path: &str) -> Result<()> {
    let bytes = fs::read(file_path).with_context(|| format!("Failed to read {}", file_path))?;
    let report = inspect_bytes(&bytes)?;

    for problem in &report.problems {
        eprintln!("warning: {problem}");
    }
    eprintln!(
        "{} command(s), {} problem(s)",
        report.commands,
        report.problems.len()
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&report.encoded)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_single_command() {
        let report = inspect_bytes(br#"{"name":"ping","description":"Replies with pong"}"#).unwrap();
        assert_eq!(report.commands, 1);
        assert!(report.problems.is_empty());
        assert!(report.encoded.starts_with(b"{"));
    }

    #[test]
    fn test_inspect_list_reports_problems() {
        let report = inspect_bytes(br#"  [{"name":"Bad Name","description":"x"},{"name":"ok","description":""}]"#).unwrap();
        assert_eq!(report.commands, 2);
        assert_eq!(
            report.problems,
            vec![
                "Bad Name: invalid name at Bad Name".to_string(),
                "ok: invalid description at ok".to_string(),
            ]
        );
        assert!(report.encoded.starts_with(b"["));
    }

    #[test]
    fn test_inspect_rejects_malformed_input() {
        let err = inspect_bytes(b"{\"name\":").unwrap_err();
        assert!(err.to_string().contains("Failed to decode command"));
    }
}
