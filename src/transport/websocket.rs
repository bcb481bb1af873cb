//! WebSocket implementation of [`Connection`].
//!
//! Thin layer over `tokio-tungstenite`. The handshake asks for compressed
//! payloads; binary frames are inflated one by one, text frames pass through
//! untouched.
//!
//! Each dial spawns one read worker that owns the read half of the socket.
//! The write half stays behind a mutex for [`Connection::send`] and
//! [`Connection::close`].

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::compression::inflate;
use super::{CloseHook, Connection, Event, Events, TransportError};
use crate::constants::{
    CLOSE_REASON_LIMIT, CLOSE_TIMEOUT, COMPRESSION_HEADER, EVENT_QUEUE_CAPACITY, READ_LIMIT,
};

/// Concrete WebSocket stream type (avoids repeating the generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type WsSink = SplitSink<WsStream, Message>;

type HookSlot = Arc<StdMutex<Option<CloseHook>>>;

/// State of one dial.
struct Active {
    writer: Arc<Mutex<WsSink>>,
    stop: CancellationToken,
    worker: JoinHandle<()>,
}

/// Builder for [`WsConnection`].
#[derive(Debug, Clone)]
pub struct WsConnectionBuilder {
    read_limit: usize,
    event_queue_capacity: usize,
    headers: Vec<(String, String)>,
}

impl Default for WsConnectionBuilder {
    fn default() -> Self {
        Self {
            read_limit: READ_LIMIT,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
            headers: Vec::new(),
        }
    }
}

impl WsConnectionBuilder {
    /// Ceiling for one inbound message, raw and inflated.
    #[must_use]
    pub fn read_limit(mut self, bytes: usize) -> Self {
        self.read_limit = bytes;
        self
    }

    /// Capacity of the bounded event queue.
    #[must_use]
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Extra handshake header, sent on every dial.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the connection. Nothing is dialed yet.
    #[must_use]
    pub fn build(self) -> WsConnection {
        let (tx, events) = Events::channel(self.event_queue_capacity);
        WsConnection {
            read_limit: self.read_limit,
            headers: self.headers,
            tx,
            events,
            active: Mutex::new(None),
            hook: Arc::new(StdMutex::new(None)),
        }
    }
}

/// Gateway connection over WebSocket with per-frame zlib compression.
pub struct WsConnection {
    read_limit: usize,
    headers: Vec<(String, String)>,
    tx: mpsc::Sender<Event>,
    events: Events,
    active: Mutex<Option<Active>>,
    hook: HookSlot,
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("read_limit", &self.read_limit)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Default for WsConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl WsConnection {
    /// Connection with default read limit and queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a connection.
    #[must_use]
    pub fn builder() -> WsConnectionBuilder {
        WsConnectionBuilder::default()
    }

    fn request(&self, addr: &str) -> Result<tungstenite::handshake::client::Request, TransportError> {
        use tungstenite::client::IntoClientRequest;
        use tungstenite::http::{HeaderName, HeaderValue};

        let url = http_to_ws_scheme(addr);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Dial(format!("invalid gateway URL {url}: {e}")))?;

        let (name, value) = COMPRESSION_HEADER;
        let extra = self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        for (name, value) in std::iter::once((name, value)).chain(extra) {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Dial(format!("invalid header name {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Dial(format!("invalid header value for {name}: {e}")))?;
            request.headers_mut().insert(header_name, header_value);
        }

        Ok(request)
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            log::debug!("[Gateway] Dropped while connected, stopping read worker");
            active.stop.cancel();
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn dial(&self, cancel: &CancellationToken, addr: &str) -> Result<(), TransportError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| !a.worker.is_finished()) {
            return Err(TransportError::AlreadyConnected);
        }

        let stale = self.events.discard_pending();
        if stale > 0 {
            log::debug!("[Gateway] Discarded {stale} events from the previous connection");
        }

        let request = self.request(addr)?;
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.read_limit);
        config.max_frame_size = Some(self.read_limit);

        log::info!("[Gateway] Connecting to {addr}");
        let connect = tokio_tungstenite::connect_async_with_config(request, Some(config), false);
        let (stream, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = connect => result.map_err(|e| TransportError::Dial(e.to_string()))?,
        };
        log::info!("[Gateway] Connected");

        let (sink, stream) = stream.split();
        let stop = CancellationToken::new();
        let worker = tokio::spawn(read_loop(
            stream,
            self.tx.clone(),
            stop.clone(),
            self.read_limit,
            Arc::clone(&self.hook),
        ));

        *active = Some(Active {
            writer: Arc::new(Mutex::new(sink)),
            stop,
            worker,
        });
        Ok(())
    }

    fn listen(&self) -> Events {
        self.events.clone()
    }

    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError> {
        let writer = {
            let active = self.active.lock().await;
            let active = active.as_ref().ok_or(TransportError::NotConnected)?;
            Arc::clone(&active.writer)
        };

        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::Send(format!("payload is not UTF-8: {e}")))?
            .to_string();
        log::trace!("[Gateway] -> {text}");

        let mut sink = writer.lock().await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = sink.send(Message::Text(text)) => {
                result.map_err(|e| TransportError::Send(e.to_string()))
            }
        }
    }

    async fn close(
        &self,
        err: Option<&(dyn std::error::Error + Send + Sync)>,
    ) -> Result<(), TransportError> {
        let active = self
            .active
            .lock()
            .await
            .take()
            .ok_or(TransportError::NotConnected)?;

        let frame = close_frame(err);
        log::info!(
            "[Gateway] Closing with code {} ({})",
            u16::from(frame.code),
            frame.reason
        );

        let sent = {
            let mut sink = active.writer.lock().await;
            tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await
        };

        // The worker fires the close hook on its way out.
        active.stop.cancel();
        if let Err(e) = active.worker.await {
            log::warn!("[Gateway] Read worker ended abnormally: {e}");
        }

        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Close(e.to_string())),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    fn set_close_hook(&self, hook: Option<CloseHook>) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = hook;
    }
}

/// Close frame for a local close.
///
/// `None` is a normal closure. An error becomes a protocol-error closure
/// whose reason is the error message cut to the frame limit on a char
/// boundary.
#[must_use]
pub fn close_frame(err: Option<&(dyn std::error::Error + Send + Sync)>) -> CloseFrame<'static> {
    match err {
        None => CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        },
        Some(err) => {
            let message = err.to_string();
            let reason = truncate(&message, CLOSE_REASON_LIMIT).to_string();
            CloseFrame {
                code: CloseCode::Protocol,
                reason: Cow::Owned(reason),
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Convert an HTTP(S) URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

// ============================================================================
// Read worker
// ============================================================================

/// What the read worker does with one item from the socket.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Queue a complete message.
    Deliver(Vec<u8>),
    /// Queue an error and keep reading.
    Transient(TransportError),
    /// Control frame, nothing to queue.
    Skip,
    /// Stop reading; `Some` is queued as the terminal event.
    Stop(Option<TransportError>),
}

fn classify(item: Result<Message, tungstenite::Error>, limit: usize) -> Step {
    match item {
        Ok(Message::Binary(data)) => {
            if data.len() > limit {
                return Step::Stop(Some(TransportError::ReadLimit { limit }));
            }
            match inflate(&data, limit) {
                Ok(inflated) => Step::Deliver(inflated),
                Err(e) if e.is_fatal() => Step::Stop(Some(e)),
                Err(e) => Step::Transient(e),
            }
        }
        Ok(Message::Text(text)) => {
            if text.len() > limit {
                return Step::Stop(Some(TransportError::ReadLimit { limit }));
            }
            Step::Deliver(text.into_bytes())
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => Step::Skip,
        Ok(Message::Close(Some(frame))) if frame.code == CloseCode::Normal => Step::Stop(None),
        Ok(Message::Close(frame)) => {
            let (code, reason) = frame
                .map(|cf| (u16::from(cf.code), cf.reason.into_owned()))
                .unwrap_or((1005, String::new()));
            Step::Stop(Some(TransportError::RemoteClosed { code, reason }))
        }
        Err(tungstenite::Error::Capacity(_)) => Step::Stop(Some(TransportError::ReadLimit { limit })),
        Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Step::Stop(None),
        Err(e) => Step::Stop(Some(TransportError::Socket(e.to_string()))),
    }
}

/// Push one event, giving up if the connection is closed locally.
async fn push(tx: &mpsc::Sender<Event>, stop: &CancellationToken, event: Event) -> bool {
    tokio::select! {
        () = stop.cancelled() => false,
        result = tx.send(event) => result.is_ok(),
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    tx: mpsc::Sender<Event>,
    stop: CancellationToken,
    limit: usize,
    hook: HookSlot,
) {
    let outcome = loop {
        let next = tokio::select! {
            () = stop.cancelled() => break None,
            next = stream.next() => next,
        };
        let Some(item) = next else {
            break None;
        };

        let event = match classify(item, limit) {
            Step::Skip => continue,
            Step::Deliver(data) => {
                log::trace!("[Gateway] <- {} bytes", data.len());
                Event::Data(data)
            }
            Step::Transient(err) => {
                log::warn!("[Gateway] Dropping frame: {err}");
                Event::Error(err)
            }
            Step::Stop(None) => break None,
            Step::Stop(Some(err)) => {
                log::warn!("[Gateway] Read worker stopping: {err}");
                push(&tx, &stop, Event::Error(err.clone())).await;
                break Some(err);
            }
        };

        if !push(&tx, &stop, event).await {
            break None;
        }
    };

    log::debug!("[Gateway] Read worker exited");
    let hook = hook.lock().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(hook) = hook {
        hook(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::compression::deflate;

    #[test]
    fn test_normal_close_frame() {
        let frame = close_frame(None);
        assert_eq!(frame.code, CloseCode::Normal);
        assert!(frame.reason.is_empty());
    }

    #[test]
    fn test_error_close_frame_truncates_reason() {
        let err = TransportError::Socket("x".repeat(200));
        let frame = close_frame(Some(&err));
        assert_eq!(frame.code, CloseCode::Protocol);
        assert_eq!(frame.reason.len(), CLOSE_REASON_LIMIT);
        assert!(frame.reason.starts_with("socket error: xxx"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // "é" is two bytes; cutting at 3 would split the second one.
        assert_eq!(truncate("éé", 3), "é");
        assert_eq!(truncate("short", 125), "short");
    }

    #[test]
    fn test_http_to_ws_scheme() {
        assert_eq!(http_to_ws_scheme("https://gateway.example"), "wss://gateway.example");
        assert_eq!(http_to_ws_scheme("http://localhost:3000"), "ws://localhost:3000");
        assert_eq!(http_to_ws_scheme("wss://gateway.example/?v=9"), "wss://gateway.example/?v=9");
    }

    #[test]
    fn test_classify_binary_is_inflated() {
        let step = classify(Ok(Message::Binary(deflate(b"hello"))), 1024);
        assert_eq!(step, Step::Deliver(b"hello".to_vec()));
    }

    #[test]
    fn test_classify_bad_binary_is_transient() {
        let step = classify(Ok(Message::Binary(b"garbage".to_vec())), 1024);
        assert!(matches!(step, Step::Transient(TransportError::Frame(_))));
    }

    #[test]
    fn test_classify_text_passes_through() {
        let step = classify(Ok(Message::Text("{\"op\":11}".into())), 1024);
        assert_eq!(step, Step::Deliver(b"{\"op\":11}".to_vec()));
    }

    #[test]
    fn test_classify_close_codes() {
        let normal = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        }));
        assert_eq!(classify(Ok(normal), 1024), Step::Stop(None));

        let abnormal = Message::Close(Some(CloseFrame {
            code: CloseCode::from(4004),
            reason: Cow::Borrowed("authentication failed"),
        }));
        assert_eq!(
            classify(Ok(abnormal), 1024),
            Step::Stop(Some(TransportError::RemoteClosed {
                code: 4004,
                reason: "authentication failed".into(),
            }))
        );
    }

    #[test]
    fn test_classify_oversized_message_is_fatal() {
        let step = classify(Ok(Message::Text("x".repeat(11))), 10);
        assert_eq!(step, Step::Stop(Some(TransportError::ReadLimit { limit: 10 })));

        let inflated_too_big = classify(Ok(Message::Binary(deflate(&[b'a'; 4096]))), 100);
        assert_eq!(inflated_too_big, Step::Stop(Some(TransportError::ReadLimit { limit: 100 })));
    }

    #[test]
    fn test_classify_control_frames_are_skipped() {
        assert_eq!(classify(Ok(Message::Ping(vec![1])), 1024), Step::Skip);
        assert_eq!(classify(Ok(Message::Pong(vec![])), 1024), Step::Skip);
    }

    #[test]
    fn test_classify_connection_closed_exits_quietly() {
        assert_eq!(classify(Err(tungstenite::Error::ConnectionClosed), 1024), Step::Stop(None));
    }

    #[tokio::test]
    async fn test_send_and_close_without_dial() {
        let conn = WsConnection::new();
        let cancel = CancellationToken::new();
        assert_eq!(conn.send(&cancel, b"{}").await, Err(TransportError::NotConnected));
        assert_eq!(conn.close(None).await, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_dial_unreachable_host_fails() {
        let conn = WsConnection::new();
        let result = conn.dial(&CancellationToken::new(), "ws://127.0.0.1:1/gateway").await;
        assert!(matches!(result, Err(TransportError::Dial(_))));
    }

    #[tokio::test]
    async fn test_dial_invalid_url_fails() {
        let conn = WsConnection::new();
        let result = conn.dial(&CancellationToken::new(), "not a url").await;
        assert!(matches!(result, Err(TransportError::Dial(_))));
    }
}
