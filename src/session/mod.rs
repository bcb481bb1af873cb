//! Managed gateway session.
//!
//! A [`Session`] ties together a [`Connection`], a request/response
//! [`Client`] and a [`Handler`]. It owns the open/close lifecycle and the
//! dispatch worker that moves events from the connection's queue to the
//! handler.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened ──open()──> Open ──close()──> Closed
//!                       ^                  │
//!                       └──────open()──────┘
//! ```
//!
//! A failed dial inside `open` lands in `Closed` as well, with the dispatch
//! worker already stopped.
//!
//! A connection that ends on its own (remote close, socket error) does not
//! change the state: the session stays `Open` until [`Session::close`] is
//! called, and only then can it be opened again.
//!
//! # Dispatch
//!
//! Every handler call happens on the dispatch worker, one at a time. When
//! the connection terminates, the worker first delivers whatever is still
//! queued and then a single [`SessionEvent::Closed`], after which it exits.

pub mod handler;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, Client};
use crate::config::Config;
use crate::constants::{CLOSE_TIMEOUT, DIAL_TIMEOUT};
use crate::transport::{CloseHook, Connection, Event, Events, TransportError, WsConnection};

pub use handler::{Handler, HandlerId, HandlerRegistry};

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `open` was called on a session that is already open.
    #[error("session is already open")]
    AlreadyOpen,
    /// Dialing the gateway failed; the session is closed again.
    #[error("failed to dial gateway")]
    Dial(#[source] TransportError),
    /// A required builder field was not set.
    #[error("missing {0}")]
    Missing(&'static str),
    /// The request/response client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Terminal notification for a dialed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closed {
    /// Why the connection ended; `None` for a normal or local close.
    pub error: Option<TransportError>,
}

/// What the handler receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An event read from the connection, in order.
    Frame(Event),
    /// The connection terminated.
    Closed(Closed),
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never opened.
    Unopened,
    /// Open, or opening.
    Open,
    /// Closed, or failed to open.
    Closed,
}

const UNOPENED: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Dispatch worker of one open generation.
struct Generation {
    stop: CancellationToken,
    dispatch: JoinHandle<()>,
}

/// Tri-state lifecycle plus the dispatch worker of the current generation.
///
/// Transitions happen under the `current` lock so an open and a close can
/// never interleave between the state change and the worker hand-off.
#[derive(Default)]
struct Lifecycle {
    state: AtomicU8,
    current: Mutex<Option<Generation>>,
}

impl Lifecycle {
    fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            UNOPENED => SessionState::Unopened,
            OPEN => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    /// Move into `Open` from either resting state and start a dispatch
    /// worker with a fresh stop signal.
    fn begin_open<F>(&self, spawn: F) -> Result<CancellationToken, SessionError>
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let opened = [UNOPENED, CLOSED].into_iter().any(|from| {
            self.state
                .compare_exchange(from, OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        });
        if !opened {
            return Err(SessionError::AlreadyOpen);
        }

        let stop = CancellationToken::new();
        *current = Some(Generation {
            stop: stop.clone(),
            dispatch: spawn(stop.clone()),
        });
        Ok(stop)
    }

    /// Single `Open -> Closed` transition. Only the winner gets the
    /// generation back.
    fn finish(&self) -> Option<Generation> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        self.state
            .compare_exchange(OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        current.take()
    }
}

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    connection: Option<Arc<dyn Connection>>,
    client: Option<Client>,
    handler: Option<Arc<dyn Handler>>,
    gateway_url: Option<String>,
    dial_timeout: Option<Duration>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("gateway_url", &self.gateway_url)
            .field("dial_timeout", &self.dial_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionBuilder {
    /// Connection to dial on `open`.
    #[must_use]
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Request/response client.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Receiver of every session event.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Gateway address passed to `dial`.
    #[must_use]
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Upper bound on dialing inside `open`.
    #[must_use]
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = Some(timeout);
        self
    }

    /// Build the session. Nothing is dialed until [`Session::open`].
    pub fn build(self) -> Result<Session, SessionError> {
        Ok(Session {
            conn: self.connection.ok_or(SessionError::Missing("connection"))?,
            client: self.client.ok_or(SessionError::Missing("client"))?,
            handler: self.handler.ok_or(SessionError::Missing("handler"))?,
            gateway_url: self.gateway_url.ok_or(SessionError::Missing("gateway URL"))?,
            dial_timeout: self.dial_timeout.unwrap_or(DIAL_TIMEOUT),
            lifecycle: Lifecycle::default(),
        })
    }
}

/// A gateway connection with managed lifecycle and event dispatch.
pub struct Session {
    conn: Arc<dyn Connection>,
    client: Client,
    handler: Arc<dyn Handler>,
    gateway_url: String,
    dial_timeout: Duration,
    lifecycle: Lifecycle,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("gateway_url", &self.gateway_url)
            .field("state", &self.state())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start configuring a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Session over a WebSocket connection configured from `config`.
    pub fn from_config(config: &Config, handler: Arc<dyn Handler>) -> Result<Self, SessionError> {
        let connection = WsConnection::builder()
            .read_limit(config.connection.read_limit)
            .event_queue_capacity(config.connection.event_queue_capacity)
            .build();

        Self::builder()
            .connection(Arc::new(connection))
            .client(Client::from_config(config)?)
            .handler(handler)
            .gateway_url(config.gateway_url.clone())
            .dial_timeout(config.dial_timeout())
            .build()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Request/response client bound to this session's scope.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Open the session: start dispatching and dial the gateway.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyOpen`] if the session is open, including
    ///   after the connection ended on its own and before [`Session::close`]
    /// - [`SessionError::Dial`] if dialing fails or times out; the session
    ///   is left closed and may be opened again
    pub async fn open(&self) -> Result<(), SessionError> {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let events = self.conn.listen();
        let handler = Arc::clone(&self.handler);
        let stop = self
            .lifecycle
            .begin_open(|stop| tokio::spawn(dispatch(events, closed_rx, handler, stop)))?;

        let hook: CloseHook = Arc::new(move |error| {
            // The receiver is gone once this generation has been dispatched.
            let _ = closed_tx.send(Closed { error });
        });
        self.conn.set_close_hook(Some(hook));

        log::info!("[Session] Opening {}", self.gateway_url);
        let dialed = tokio::time::timeout(self.dial_timeout, self.conn.dial(&stop, &self.gateway_url))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        if let Err(e) = dialed {
            log::warn!("[Session] Dial failed: {e}");
            self.conn.set_close_hook(None);
            if let Some(generation) = self.lifecycle.finish() {
                generation.stop.cancel();
            }
            return Err(SessionError::Dial(e));
        }

        log::info!("[Session] Open");
        Ok(())
    }

    /// Write one message to the gateway.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.conn.send(self.client.cancel_token(), data).await
    }

    /// Close the session.
    ///
    /// The first call closes the connection and waits for the dispatch
    /// worker to hand the remaining events and the final
    /// [`SessionEvent::Closed`] to the handler. Later and concurrent calls,
    /// and calls on a session that was never opened, do nothing.
    /// Connection errors during close are logged, not returned.
    ///
    /// If the connection had already ended on its own, the handler has seen
    /// `Closed` for it and this only resets the state so the session can be
    /// opened again.
    pub async fn close(&self) {
        let Some(mut generation) = self.lifecycle.finish() else {
            log::debug!("[Session] Close ignored in state {:?}", self.state());
            return;
        };

        log::info!("[Session] Closing");
        let ended = generation.dispatch.is_finished();
        match self.conn.close(None).await {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                log::debug!("[Session] Connection was not live");
                generation.stop.cancel();
            }
            Err(e) if ended => log::debug!("[Session] Connection had already ended: {e}"),
            Err(e) => log::warn!("[Session] Error while closing connection: {e}"),
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut generation.dispatch)
            .await
            .is_err()
        {
            log::warn!("[Session] Dispatch worker did not finish, stopping it");
            generation.stop.cancel();
        }
    }

    /// A view of this session whose requests are bound to `cancel`.
    ///
    /// The view shares the connection and handler. It has no lifecycle of
    /// its own; closing stays with the original session.
    #[must_use]
    pub fn with_context(&self, cancel: CancellationToken) -> ScopedSession {
        ScopedSession {
            conn: Arc::clone(&self.conn),
            handler: Arc::clone(&self.handler),
            client: self.client.with_cancel(cancel),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let current = self.lifecycle.current.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(generation) = current.take() {
            generation.stop.cancel();
        }
    }
}

/// Session view bound to a caller's cancellation scope.
#[derive(Clone)]
pub struct ScopedSession {
    conn: Arc<dyn Connection>,
    handler: Arc<dyn Handler>,
    client: Client,
}

impl fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedSession")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ScopedSession {
    /// Request/response client bound to this view's scope.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// The shared handler.
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Write one message; aborted when this view's scope is cancelled.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.conn.send(self.client.cancel_token(), data).await
    }
}

/// Forward queued events to the handler.
///
/// Runs until the connection's termination has been delivered or `stop`
/// fires.
async fn dispatch(
    events: Events,
    mut closed: mpsc::UnboundedReceiver<Closed>,
    handler: Arc<dyn Handler>,
    stop: CancellationToken,
) {
    log::debug!("[Session] Dispatch worker started");
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => handler.call(SessionEvent::Frame(event)),
                None => break,
            },
            Some(done) = closed.recv() => {
                // The read worker has queued everything it will ever queue.
                while let Some(event) = events.try_recv().await {
                    handler.call(SessionEvent::Frame(event));
                }
                handler.call(SessionEvent::Closed(done));
                break;
            }
        }
    }
    log::debug!("[Session] Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { stop.cancelled().await })
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state(), SessionState::Unopened);
        assert!(lifecycle.finish().is_none());

        let stop = lifecycle.begin_open(idle).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Open);
        assert!(matches!(lifecycle.begin_open(idle), Err(SessionError::AlreadyOpen)));

        let generation = lifecycle.finish().unwrap();
        assert!(!stop.is_cancelled(), "finish hands the worker back without stopping it");
        assert!(lifecycle.finish().is_none());
        assert_eq!(lifecycle.state(), SessionState::Closed);
        generation.stop.cancel();
        generation.dispatch.await.unwrap();

        let again = lifecycle.begin_open(idle).unwrap();
        assert!(!again.is_cancelled());
        assert!(stop.is_cancelled());
    }

    #[tokio::test]
    async fn test_dispatch_delivers_closed_after_queued_events() {
        let (tx, events) = Events::channel(4);
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let handler: Arc<dyn Handler> = Arc::new(move |event: SessionEvent| {
            recorder.lock().unwrap().push(event);
        });

        tx.send(Event::Data(b"a".to_vec())).await.unwrap();
        tx.send(Event::Data(b"b".to_vec())).await.unwrap();
        closed_tx.send(Closed { error: None }).unwrap();

        dispatch(events, closed_rx, handler, CancellationToken::new()).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionEvent::Frame(Event::Data(b"a".to_vec())),
                SessionEvent::Frame(Event::Data(b"b".to_vec())),
                SessionEvent::Closed(Closed { error: None }),
            ]
        );
    }

    #[test]
    fn test_builder_reports_missing_fields() {
        let err = Session::builder().build().unwrap_err();
        assert!(matches!(err, SessionError::Missing("connection")));
    }
}
