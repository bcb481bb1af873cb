//! Live gateway listener.
//!
//! Opens a session against the configured gateway and logs every event until
//! Ctrl-C or until the connection ends.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Notify;

use crate::config::Config;
use crate::session::{HandlerRegistry, Session, SessionEvent};
use crate::transport::Event;

/// Human-readable one-line summary of an event.
pub fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Frame(Event::Data(data)) => {
            let text = String::from_utf8_lossy(data);
            let preview: String = text.chars().take(120).collect();
            format!("frame ({} bytes): {preview}", data.len())
        }
        SessionEvent::Frame(Event::Error(err)) => format!("frame error: {err}"),
        SessionEvent::Closed(closed) => match &closed.error {
            Some(err) => format!("closed: {err}"),
            None => "closed".to_string(),
        },
    }
}

/// Problem with `config` worth telling the user before connecting.
fn token_warning(config: &Config) -> Option<&'static str> {
    (!config.has_token())
        .then_some("No token configured; API requests will be rejected (set GATEWIRE_TOKEN)")
}

/// Listen on the gateway until interrupted.
///
/// # Errors
///
/// Returns an error if the session cannot be built or opened.
pub async fn run(config: Config) -> Result<()> {
    if let Some(warning) = token_warning(&config) {
        log::warn!("[Listen] {warning}");
    }

    let registry = Arc::new(HandlerRegistry::new());
    let ended = Arc::new(Notify::new());

    let notify = Arc::clone(&ended);
    registry.add_handler(move |event| {
        log::info!("[Listen] {}", describe(event));
        if matches!(event, SessionEvent::Closed(_)) {
            notify.notify_one();
        }
    });

    let session = Session::from_config(&config, registry).context("Failed to build session")?;
    session
        .open()
        .await
        .with_context(|| format!("Failed to open session to {}", config.gateway_url))?;
    println!("Listening on {} (Ctrl-C to stop)", config.gateway_url);

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        () = ended.notified() => println!("Connection ended"),
    }

    session.close().await;
    Ok(())
}
