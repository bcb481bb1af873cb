//! Crate-wide constants and tunable defaults.
//!
//! This module centralizes the magic numbers used by the transport, the
//! session and the request/response client. Anything a caller may want to
//! change is surfaced again through [`crate::config`]; the values here are
//! only the documented defaults.
//!
//! # Categories
//!
//! - **Transport**: event queue sizing, read ceilings, close frames
//! - **Timeouts**: dial, close and HTTP request timeouts
//! - **Schema**: wire limits for application commands

use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// Default capacity of the bounded event queue between the read worker and
/// its consumer.
///
/// Kept small on purpose: a slow consumer throttles the read worker instead
/// of letting frames pile up in memory.
pub const EVENT_QUEUE_CAPACITY: usize = 12;

/// Default ceiling for a single inbound message, in bytes.
///
/// Applies both to the raw WebSocket message and to its inflated size.
pub const READ_LIMIT: usize = 8_192_000;

/// Maximum length of a WebSocket close reason, in bytes.
pub const CLOSE_REASON_LIMIT: usize = 125;

/// Header sent during the handshake to ask for compressed payloads.
pub const COMPRESSION_HEADER: (&str, &str) = ("Accept-Encoding", "zlib");

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for establishing the gateway connection during `Session::open`.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client request timeout for command API calls.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `close` waits for the close frame to be written.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Schema
// ============================================================================

/// Maximum number of options in a single option sequence.
pub const MAX_OPTIONS: usize = 25;

/// Maximum command or option name length, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum command or option description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_values_are_reasonable() {
        assert!(HTTP_REQUEST_TIMEOUT >= Duration::from_secs(5));
        assert!(HTTP_REQUEST_TIMEOUT <= Duration::from_secs(60));
        assert!(DIAL_TIMEOUT >= HTTP_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_queue_and_read_limits_are_bounded() {
        assert!(EVENT_QUEUE_CAPACITY > 0);
        assert!(EVENT_QUEUE_CAPACITY <= 64);
        assert!(READ_LIMIT >= 1024 * 1024);
    }
}
