//! Gatewire - protocol boundary layer for a chat-platform gateway client.
//!
//! This crate keeps a long-lived, compressed gateway connection alive and
//! ordered, and moves application commands across the wire without losing
//! option kinds it does not know yet.
//!
//! # Architecture
//!
//! ```text
//! socket ─> WsConnection read worker ─> bounded queue ─> Session dispatch ─> Handler
//!                                                            │
//!                                       Client (HTTP) <──────┘
//!                      \____________ schema codec ____________/
//! ```
//!
//! # Modules
//!
//! - [`schema`] - Command/option tree and its JSON codec
//! - [`transport`] - `Connection` trait and the WebSocket implementation
//! - [`session`] - Lifecycle, dispatch worker and handler registry
//! - [`api`] - Request/response client for command endpoints
//! - [`config`] - Configuration loading/saving

pub mod api;
pub mod commands;
pub mod config;
pub mod constants;
pub mod schema;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use api::{ApiError, Client, CommandScope};
pub use config::Config;
pub use schema::{Command, CommandOption, OptionValue, SchemaError, Snowflake};
pub use session::{
    Closed, Handler, HandlerRegistry, ScopedSession, Session, SessionError, SessionEvent,
};
pub use transport::{Connection, Event, Events, TransportError, WsConnection};
