//! CLI subcommand implementations for gatewire.
//!
//! - [`inspect`] - Decode, validate and re-encode command JSON
//! - [`listen`] - Open a gateway session and log every event
//!
//! # Usage
//!
//! ```ignore
//! use gatewire::commands;
//!
//! commands::inspect::run("commands.json")?;
//! commands::listen::run(config).await?;
//! ```

pub mod inspect;
pub mod listen;
