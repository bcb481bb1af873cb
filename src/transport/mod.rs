//! Duplex gateway connection.
//!
//! The [`Connection`] trait is the seam between the session and the wire.
//! [`WsConnection`] is the default implementation; tests plug in their own.
//!
//! # Architecture
//!
//! ```text
//! socket ──> read worker ──> bounded queue ──> Events::recv()
//!                 │
//!                 └── on exit: close hook (exactly once per dial)
//! ```
//!
//! The queue belongs to the connection, not to a dial: the [`Events`] handle
//! returned by [`Connection::listen`] stays valid across re-dials. Events
//! left over from a previous dial are discarded when the next dial starts.

pub mod compression;
pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub use websocket::{close_frame, WsConnection, WsConnectionBuilder};

/// Callback fired once when a dialed connection terminates.
///
/// Receives `None` for a normal or local closure and the terminal error
/// otherwise.
pub type CloseHook = Arc<dyn Fn(Option<TransportError>) + Send + Sync>;

/// Transport errors.
///
/// Payloads are plain strings so events can be cloned and fanned out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Handshake or TCP/TLS setup failed.
    #[error("dial failed: {0}")]
    Dial(String),
    /// A single frame could not be decoded. The connection stays up.
    #[error("bad frame: {0}")]
    Frame(String),
    /// A message exceeded the read ceiling, raw or inflated.
    #[error("message exceeds read limit of {limit} bytes")]
    ReadLimit {
        /// Configured ceiling in bytes.
        limit: usize,
    },
    /// The peer closed with a non-normal close code.
    #[error("remote closed with code {code}: {reason}")]
    RemoteClosed {
        /// Close code sent by the peer.
        code: u16,
        /// Close reason sent by the peer.
        reason: String,
    },
    /// The socket failed underneath the read worker.
    #[error("socket error: {0}")]
    Socket(String),
    /// Writing a message failed.
    #[error("send failed: {0}")]
    Send(String),
    /// Sending the close frame failed. The connection is torn down regardless.
    #[error("close failed: {0}")]
    Close(String),
    /// No dialed connection.
    #[error("not connected")]
    NotConnected,
    /// A previous dial is still live.
    #[error("already connected")]
    AlreadyConnected,
    /// The operation did not finish in time.
    #[error("operation timed out")]
    Timeout,
    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether this error ends the read worker.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Frame(_))
    }
}

/// One item of the inbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete, decompressed message.
    Data(Vec<u8>),
    /// A transient or terminal read error.
    Error(TransportError),
}

/// Receiving end of a connection's event queue.
///
/// Cheap to clone. Clones share the same queue, so each event is observed
/// by exactly one receiver.
#[derive(Debug, Clone)]
pub struct Events {
    rx: Arc<Mutex<mpsc::Receiver<Event>>>,
}

impl Events {
    /// Create a bounded queue and its receiving handle.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<Event>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let events = Self {
            rx: Arc::new(Mutex::new(rx)),
        };
        (tx, events)
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&self) -> Option<Event> {
        self.rx.lock().await.recv().await
    }

    /// Take the next event if one is already queued.
    pub async fn try_recv(&self) -> Option<Event> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Drop everything currently queued and return how many events went.
    ///
    /// Does nothing while another task is waiting in [`Events::recv`], since
    /// a waiting receiver means the queue is already empty.
    pub(crate) fn discard_pending(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Abstract duplex connection to the gateway.
///
/// A connection is dialed once, used, closed, and may then be dialed again.
/// It is never dialed twice while live.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the socket and start the read worker.
    ///
    /// `cancel` governs the handshake only.
    async fn dial(&self, cancel: &CancellationToken, addr: &str) -> Result<(), TransportError>;

    /// Handle to the ordered event queue.
    fn listen(&self) -> Events;

    /// Write one message. `cancel` governs this write only.
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError>;

    /// Close the live connection.
    ///
    /// `None` closes normally; `Some(err)` closes with a protocol error
    /// carrying the error's message.
    async fn close(
        &self,
        err: Option<&(dyn std::error::Error + Send + Sync)>,
    ) -> Result<(), TransportError>;

    /// Install or clear the close hook for subsequent terminations.
    fn set_close_hook(&self, hook: Option<CloseHook>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_frame_errors_are_transient() {
        assert!(!TransportError::Frame("bad zlib".into()).is_fatal());
        assert!(TransportError::ReadLimit { limit: 10 }.is_fatal());
        assert!(TransportError::Socket("reset".into()).is_fatal());
    }

    #[tokio::test]
    async fn test_events_clones_share_one_queue() {
        let (tx, events) = Events::channel(4);
        let other = events.clone();

        tx.send(Event::Data(b"a".to_vec())).await.unwrap();
        tx.send(Event::Data(b"b".to_vec())).await.unwrap();
        drop(tx);

        assert_eq!(other.recv().await, Some(Event::Data(b"a".to_vec())));
        assert_eq!(events.recv().await, Some(Event::Data(b"b".to_vec())));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_discard_pending_empties_queue() {
        let (tx, events) = Events::channel(4);
        tx.send(Event::Data(b"stale".to_vec())).await.unwrap();
        tx.send(Event::Data(b"older".to_vec())).await.unwrap();

        assert_eq!(events.discard_pending(), 2);
        assert_eq!(events.try_recv().await, None);

        tx.send(Event::Data(b"fresh".to_vec())).await.unwrap();
        assert_eq!(events.try_recv().await, Some(Event::Data(b"fresh".to_vec())));
    }
}
