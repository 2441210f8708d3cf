//! Realtime event stream with bounded auto-reconnect.
//!
//! Opens the backend's WebSocket endpoint with a bearer credential and
//! reports everything that happens on it as [`TransportEvent`]s through a
//! single `mpsc` receiver. Outbound frames are queued on an unbounded
//! sender and written whenever a socket is open.
//!
//! # Example
//!
//! ```rust,ignore
//! use yengou_api::realtime::{RealtimeHandle, ReconnectConfig, TransportEvent};
//! use yengou_api::wire::OutboundFrame;
//! use tokio_util::sync::CancellationToken;
//!
//! let url = Url::parse("wss://api.example.com/realtime")?;
//! let (handle, mut events) =
//!     RealtimeHandle::spawn(url, token, ReconnectConfig::default(), CancellationToken::new());
//!
//! while let Some(event) = events.recv().await {
//!     if matches!(event, TransportEvent::Connected) {
//!         handle.send(OutboundFrame::SubscribeDashboard)?;
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::wire::{InboundFrame, OutboundFrame};

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── TransportEvent ───────────────────────────────────────────────────

/// Everything the transport task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed; outbound frames will now be written.
    Connected,
    /// A parsed inbound frame.
    Frame(InboundFrame),
    /// An established socket went away.
    Disconnected { reason: String },
    /// A connection attempt failed. `will_retry` is `false` once the task
    /// has given up and exited.
    Failed { detail: String, will_retry: bool },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever. Default: 5.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(5),
        }
    }
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Handle to a running realtime transport task.
pub struct RealtimeHandle {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; its outcome
    /// arrives on the returned receiver as `Connected` or `Failed`.
    pub fn spawn(
        url: Url,
        token: SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            ws_loop(url, token, event_tx, outbound_rx, reconnect, task_cancel).await;
        });

        let handle = Self {
            outbound: outbound_tx,
            cancel,
            task,
        };
        (handle, event_rx)
    }

    /// Queue a frame for the socket.
    ///
    /// Frames queued while no socket is open are discarded at the next
    /// successful handshake.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), Error> {
        self.outbound
            .send(frame)
            .map_err(|_| Error::WebSocketConnect("transport task has exited".into()))
    }

    /// A clone of the outbound queue sender.
    pub fn sender(&self) -> mpsc::UnboundedSender<OutboundFrame> {
        self.outbound.clone()
    }

    /// Whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the background task to shut down and wait for it.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "realtime task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// A session that lasts this long resets the retry budget even if the
/// server never pushed anything.
const STABLE_SESSION: Duration = Duration::from_secs(10);

/// How a live session ended.
enum SessionEnd {
    Cancelled,
    Closed { reason: String, stable: bool },
    Dropped { error: Error, stable: bool },
}

/// Main loop: connect → read → backoff → reconnect.
///
/// Handshake failures and sessions that end before proving themselves
/// (no frame delivered, shorter than [`STABLE_SESSION`]) both spend the
/// retry budget, so a server that accepts and immediately hangs up is
/// retried on the same schedule as one that refuses the connection.
async fn ws_loop(
    url: Url,
    token: SecretString,
    event_tx: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // (detail, retryable, handshake failed)
        let (detail, retryable, refused) =
            match connect_and_read(&url, &token, &event_tx, &mut outbound, &cancel).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Closed { reason, stable }) => {
                    tracing::info!(%reason, stable, "realtime socket closed");
                    if stable {
                        attempt = 0;
                    }
                    let detail = reason.clone();
                    if !emit(&event_tx, TransportEvent::Disconnected { reason }).await {
                        break;
                    }
                    (detail, true, false)
                }
                Ok(SessionEnd::Dropped { error, stable }) => {
                    tracing::warn!(error = %error, stable, "realtime socket dropped");
                    if stable {
                        attempt = 0;
                    }
                    let detail = error.to_string();
                    let dropped = TransportEvent::Disconnected {
                        reason: detail.clone(),
                    };
                    if !emit(&event_tx, dropped).await {
                        break;
                    }
                    (detail, true, false)
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "realtime connect failed");
                    (e.to_string(), !e.is_auth_rejection(), true)
                }
            };

        let exhausted = reconnect.max_retries.is_some_and(|max| attempt >= max);
        let will_retry = retryable && !exhausted;
        if exhausted {
            tracing::error!(attempt, "realtime reconnection limit reached, giving up");
        }

        // A session end was already reported as `Disconnected`; it only
        // needs a `Failed` when the task is about to give up.
        if (refused || !will_retry)
            && !emit(&event_tx, TransportEvent::Failed { detail, will_retry }).await
        {
            break;
        }
        if !will_retry {
            break;
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }

    tracing::debug!("realtime loop exiting");
}

/// Forward an event to the owner. `false` means nobody is listening.
async fn emit(event_tx: &mpsc::Sender<TransportEvent>, event: TransportEvent) -> bool {
    event_tx.send(event).await.is_ok()
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Handshake, then pump frames both ways until the socket goes away.
///
/// Handshake failures are `Err`; anything after `Connected` is reported
/// as a [`SessionEnd`].
async fn connect_and_read(
    url: &Url,
    token: &SecretString,
    event_tx: &mpsc::Sender<TransportEvent>,
    outbound: &mut mpsc::UnboundedReceiver<OutboundFrame>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, Error> {
    tracing::info!(url = %url, "connecting to realtime endpoint");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri).with_header(
        "Authorization",
        format!("Bearer {}", token.expose_secret()),
    );

    let connect = tokio_tungstenite::connect_async(request);
    let (ws_stream, _response) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        result = connect => result.map_err(map_handshake_error)?,
    };

    // Anything queued while offline was addressed to a previous session.
    let mut stale = 0_usize;
    while outbound.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        tracing::debug!(stale, "discarded frames queued before handshake");
    }

    tracing::info!("realtime connected");
    if !emit(event_tx, TransportEvent::Connected).await {
        return Ok(SessionEnd::Cancelled);
    }

    let (mut write, mut read) = ws_stream.split();
    let opened = Instant::now();
    let mut delivered = false;
    let stable = |delivered: bool| delivered || opened.elapsed() >= STABLE_SESSION;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Frames queued before the stop request still go out.
                while let Ok(frame) = outbound.try_recv() {
                    let Ok(text) = frame.to_json() else { continue };
                    if write.send(tungstenite::Message::text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Handle dropped.
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                };
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, event = frame.event_name(), "failed to encode frame");
                        continue;
                    }
                };
                tracing::debug!(event = frame.event_name(), "sending frame");
                if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                    return Ok(SessionEnd::Dropped {
                        error: Error::WebSocketConnect(e.to_string()),
                        stable: stable(delivered),
                    });
                }
            }
            message = read.next() => {
                match message {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let Some(frame) = parse_frame(&text) else {
                            continue;
                        };
                        if !emit(event_tx, TransportEvent::Frame(frame)).await {
                            return Ok(SessionEnd::Cancelled);
                        }
                        delivered = true;
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong itself
                        tracing::trace!("realtime ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let reason = match frame {
                            Some(cf) => {
                                tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                                format!("closed by server ({}): {}", cf.code, cf.reason)
                            }
                            None => "closed by server".to_owned(),
                        };
                        return Ok(SessionEnd::Closed {
                            reason,
                            stable: stable(delivered),
                        });
                    }
                    Some(Err(e)) => {
                        return Ok(SessionEnd::Dropped {
                            error: Error::WebSocketConnect(e.to_string()),
                            stable: stable(delivered),
                        });
                    }
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(SessionEnd::Closed {
                            reason: "stream ended".to_owned(),
                            stable: stable(delivered),
                        });
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// A rejected credential is terminal; every other handshake failure is not.
fn map_handshake_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            Error::Authentication {
                message: format!("realtime handshake rejected (HTTP {})", response.status()),
            }
        }
        other => Error::WebSocketConnect(other.to_string()),
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame, skipping anything that is not a known event.
fn parse_frame(text: &str) -> Option<InboundFrame> {
    match InboundFrame::parse(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!(error = %e, "skipping unrecognised realtime frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(30) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
