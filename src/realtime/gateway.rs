//! Real streaming session over a gateway WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │  send_audio()   │────▶│  audio_tx (mpsc)  │────▶│  WebSocket Task │
//! └─────────────────┘     └───────────────────┘     └────────┬────────┘
//!                                                            │
//!                          ┌───────────────────┐             │
//!                          │  event_tx (mpsc)  │◀────────────┘
//!                          └─────────┬─────────┘
//!                                    │
//!                          ┌─────────▼─────────┐
//!                          │  Event Forward    │────▶ Subscriber Callback
//!                          │      Task         │
//!                          └───────────────────┘
//! ```
//!
//! The connection task owns the socket. `connect()` resolves once the
//! gateway acknowledges the start directive with `TranscriptionStarted`;
//! that acknowledgement is consumed here and never surfaced. A
//! `TranscriptionCompleted` event is forwarded and also closes the session
//! from the inside.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::form_urlencoded;
use uuid::Uuid;

use super::messages::{Envelope, GatewayEvent, decode_frame};
use super::{ErrorCallback, EventCallback, RealTimeSession};
use crate::auth::fetch_gateway_token;
use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};
use crate::types::{RealTimeEvent, SessionState, TranscriptionOptions};

/// Bound on transport connect plus start-directive acknowledgement.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on waiting for `TranscriptionStarted` after the start directive.
const START_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Type alias for the stored async event callback.
type AsyncEventCallback = Box<
    dyn Fn(RealTimeEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Type alias for the stored async error callback.
type AsyncErrorCallback = Box<
    dyn Fn(TranscribeError) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Streaming session against the real gateway.
pub struct GatewaySession {
    config: RecognitionConfig,
    options: TranscriptionOptions,

    /// Task id stable for the whole session, echoed in every envelope.
    task_id: String,

    /// Shared lifecycle state; the connection task moves it to `Closed`.
    state: Arc<StdMutex<SessionState>>,

    /// Fast gate for `send_audio`.
    open: Arc<AtomicBool>,

    /// Audio frames to the connection task. Bounded for backpressure.
    audio_tx: Option<mpsc::Sender<Bytes>>,

    /// Shutdown signal for graceful stop.
    shutdown_tx: Option<oneshot::Sender<()>>,

    connection_handle: Option<tokio::task::JoinHandle<()>>,
    event_forward_handle: Option<tokio::task::JoinHandle<()>>,
    error_forward_handle: Option<tokio::task::JoinHandle<()>>,

    event_callback: Arc<Mutex<Option<AsyncEventCallback>>>,
    error_callback: Arc<Mutex<Option<AsyncErrorCallback>>>,

    /// HTTP client for the token exchange.
    http: reqwest::Client,
}

impl GatewaySession {
    /// Create a session in the `Idle` state. Nothing touches the network
    /// until `connect()`.
    pub fn new(config: RecognitionConfig, options: TranscriptionOptions) -> Self {
        Self {
            config,
            options,
            task_id: Uuid::new_v4().simple().to_string(),
            state: Arc::new(StdMutex::new(SessionState::Idle)),
            open: Arc::new(AtomicBool::new(false)),
            audio_tx: None,
            shutdown_tx: None,
            connection_handle: None,
            event_forward_handle: None,
            error_forward_handle: None,
            event_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            http: reqwest::Client::new(),
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }

    /// Leave `Connecting`, unless the connection task already moved the
    /// session to a terminal state. The gateway may complete or fail the
    /// task between the start acknowledgement and `connect()` resuming;
    /// the task's terminal transition wins that race.
    fn finish_connecting(&self, next: SessionState) {
        let mut state = self.state.lock().expect("state lock poisoned");
        if *state == SessionState::Connecting {
            *state = next;
        }
    }

    /// Authenticate the WebSocket URL: a real token when access keys are
    /// configured, otherwise the raw application key.
    async fn websocket_url(&self) -> TranscribeResult<String> {
        let token = if self.config.has_access_keys() {
            fetch_gateway_token(&self.config, &self.http).await?.token
        } else {
            self.config.app_key.clone()
        };
        let encoded: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
        Ok(format!("{}?token={}", self.config.gateway_ws_url, encoded))
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

#[async_trait::async_trait]
impl RealTimeSession for GatewaySession {
    async fn connect(&mut self) -> TranscribeResult<()> {
        if self.state() != SessionState::Idle {
            return Err(TranscribeError::InvalidState(format!(
                "connect() called in state '{}'; a fresh session is required",
                self.state()
            )));
        }
        self.set_state(SessionState::Connecting);

        let ws_url = match self.websocket_url().await {
            Ok(url) => url,
            Err(e) => {
                self.set_state(SessionState::Failed);
                return Err(e);
            }
        };

        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(32);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        // Bounded channels for backpressure on bursty gateways
        let (event_tx, mut event_rx) = mpsc::channel::<RealTimeEvent>(256);
        let (error_tx, mut error_rx) = mpsc::channel::<TranscribeError>(64);
        let (connected_tx, connected_rx) = oneshot::channel::<()>();

        self.audio_tx = Some(audio_tx);
        self.shutdown_tx = Some(shutdown_tx);

        let start_frame =
            Envelope::start_transcription(&self.task_id, &self.config.app_key, &self.options)
                .to_wire()?;
        let task_id = self.task_id.clone();
        let app_key = self.config.app_key.clone();
        let state = self.state.clone();
        let open_flag = self.open.clone();

        let connection_handle = tokio::spawn(async move {
            let connect_result = match timeout(CONNECT_TIMEOUT, connect_async(&ws_url)).await {
                Ok(result) => result,
                Err(_) => {
                    let e = TranscribeError::Transport(
                        "gateway connection timed out after 30 seconds".to_string(),
                    );
                    error!("{e}");
                    let _ = error_tx.try_send(e);
                    *state.lock().expect("state lock poisoned") = SessionState::Failed;
                    return;
                }
            };

            let (ws_stream, _response) = match connect_result {
                Ok(ok) => ok,
                Err(e) => {
                    let e = TranscribeError::Transport(format!("gateway connect failed: {e}"));
                    error!("{e}");
                    let _ = error_tx.try_send(e);
                    *state.lock().expect("state lock poisoned") = SessionState::Failed;
                    return;
                }
            };

            info!("Connected to gateway streaming endpoint");
            let (mut ws_sink, mut ws_stream) = ws_stream.split();

            if let Err(e) = ws_sink.send(Message::Text(start_frame.into())).await {
                let e = TranscribeError::Transport(format!("failed to send start directive: {e}"));
                error!("{e}");
                let _ = error_tx.try_send(e);
                *state.lock().expect("state lock poisoned") = SessionState::Failed;
                return;
            }
            debug!("Sent StartTranscription directive");

            // Consume the session-started acknowledgement; never surfaced
            let acked = timeout(START_ACK_TIMEOUT, async {
                while let Some(Ok(Message::Text(text))) = ws_stream.next().await {
                    if let Ok(GatewayEvent::Started) = decode_frame(&text) {
                        return true;
                    }
                }
                false
            })
            .await;

            match acked {
                Ok(true) => {
                    info!("Gateway acknowledged transcription start");
                    open_flag.store(true, Ordering::Release);
                    let _ = connected_tx.send(());
                }
                _ => {
                    let e = TranscribeError::Transport(
                        "gateway did not acknowledge transcription start".to_string(),
                    );
                    error!("{e}");
                    let _ = error_tx.try_send(e);
                    *state.lock().expect("state lock poisoned") = SessionState::Failed;
                    return;
                }
            }

            loop {
                tokio::select! {
                    // Prioritize audio for lowest latency
                    biased;

                    Some(frame) = audio_rx.recv() => {
                        let envelope = Envelope::send_audio(&task_id, &app_key, &frame);
                        let wire = match envelope.to_wire() {
                            Ok(wire) => wire,
                            Err(e) => {
                                warn!("Dropping unencodable audio frame: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(wire.into())).await {
                            let e = TranscribeError::Transport(
                                format!("failed to send audio frame: {e}"));
                            error!("{e}");
                            let _ = error_tx.try_send(e);
                            break;
                        }
                    }

                    message = ws_stream.next() => {
                        match message {
                            Some(Ok(Message::Text(text))) => {
                                match decode_frame(&text) {
                                    Ok(GatewayEvent::Started) => {
                                        debug!("Duplicate start acknowledgement ignored");
                                    }
                                    Ok(GatewayEvent::SentenceBegin { timestamp }) => {
                                        let _ = event_tx
                                            .try_send(RealTimeEvent::SentenceBegin { timestamp });
                                    }
                                    Ok(GatewayEvent::ResultChanged { timestamp, result }) => {
                                        let _ = event_tx.try_send(
                                            RealTimeEvent::ResultChanged { timestamp, result });
                                    }
                                    Ok(GatewayEvent::SentenceEnd { timestamp, result }) => {
                                        let _ = event_tx.try_send(
                                            RealTimeEvent::SentenceEnd { timestamp, result });
                                    }
                                    Ok(GatewayEvent::Completed { timestamp }) => {
                                        info!("Gateway reported transcription completed");
                                        let _ = event_tx
                                            .try_send(RealTimeEvent::Completed { timestamp });
                                        break;
                                    }
                                    Err(e) => {
                                        warn!("Ignoring undecodable gateway frame: {e}");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("Gateway closed the stream: {frame:?}");
                                break;
                            }
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                                debug!("WebSocket keepalive frame");
                            }
                            Some(Ok(_)) => {
                                debug!("Ignoring non-text gateway frame");
                            }
                            Some(Err(e)) => {
                                let e = TranscribeError::Transport(
                                    format!("websocket error: {e}"));
                                error!("{e}");
                                let _ = error_tx.try_send(e);
                                break;
                            }
                            None => {
                                info!("Gateway stream ended");
                                break;
                            }
                        }
                    }

                    _ = &mut shutdown_rx => {
                        debug!("Shutdown requested, sending StopTranscription");
                        let stop = Envelope::stop_transcription(&task_id, &app_key);
                        if let Ok(wire) = stop.to_wire() {
                            let _ = ws_sink.send(Message::Text(wire.into())).await;
                        }
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            open_flag.store(false, Ordering::Release);
            {
                let mut state = state.lock().expect("state lock poisoned");
                if *state != SessionState::Failed {
                    *state = SessionState::Closed;
                }
            }
            info!("Gateway streaming session finished");
        });
        self.connection_handle = Some(connection_handle);

        // Forward data events to the subscriber
        let event_callback = self.event_callback.clone();
        self.event_forward_handle = Some(tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if let Some(callback) = event_callback.lock().await.as_ref() {
                    callback(event).await;
                } else {
                    debug!("Session event with no subscriber: {event:?}");
                }
            }
        }));

        // Forward transport/protocol errors to the subscriber
        let error_callback = self.error_callback.clone();
        self.error_forward_handle = Some(tokio::spawn(async move {
            while let Some(e) = error_rx.recv().await {
                if let Some(callback) = error_callback.lock().await.as_ref() {
                    callback(e).await;
                } else {
                    error!("Session error with no subscriber: {e}");
                }
            }
        }));

        match timeout(CONNECT_TIMEOUT, connected_rx).await {
            Ok(Ok(())) => {
                self.finish_connecting(SessionState::Open);
                Ok(())
            }
            Ok(Err(_)) => {
                self.finish_connecting(SessionState::Failed);
                Err(TranscribeError::Transport(
                    "connection task ended before acknowledgement".to_string(),
                ))
            }
            Err(_) => {
                self.finish_connecting(SessionState::Failed);
                Err(TranscribeError::Transport(
                    "timed out waiting for gateway acknowledgement".to_string(),
                ))
            }
        }
    }

    async fn send_audio(&mut self, frame: Bytes) -> TranscribeResult<()> {
        if !self.open.load(Ordering::Acquire) {
            // Tolerates races between audio capture and session teardown
            debug!("send_audio outside open state, dropping frame");
            return Ok(());
        }

        if let Some(audio_tx) = &self.audio_tx {
            if audio_tx.send(frame).await.is_err() {
                debug!("Connection task gone, dropping frame");
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> TranscribeResult<()> {
        let current = self.state();
        if current.is_terminal() {
            return Ok(());
        }
        if current == SessionState::Idle {
            self.set_state(SessionState::Closed);
            return Ok(());
        }

        self.set_state(SessionState::Closing);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.connection_handle.take() {
            let _ = timeout(Duration::from_secs(5), handle).await;
        }
        // The forwarders exit on their own once the connection task drops
        // its channel senders; awaiting them delivers everything still
        // queued, including a trailing Completed
        if let Some(mut handle) = self.event_forward_handle.take() {
            if timeout(Duration::from_secs(5), &mut handle).await.is_err() {
                handle.abort();
            }
        }
        if let Some(mut handle) = self.error_forward_handle.take() {
            if timeout(Duration::from_secs(5), &mut handle).await.is_err() {
                handle.abort();
            }
        }
        self.audio_tx = None;
        self.open.store(false, Ordering::Release);
        self.set_state(SessionState::Closed);
        info!("Streaming session closed");
        Ok(())
    }

    fn state(&self) -> SessionState {
        *self.state.lock().expect("state lock poisoned")
    }

    async fn on_event(&mut self, callback: EventCallback) -> TranscribeResult<()> {
        *self.event_callback.lock().await = Some(Box::new(move |event| {
            let cb = callback.clone();
            Box::pin(async move {
                cb(event).await;
            })
        }));
        Ok(())
    }

    async fn on_error(&mut self, callback: ErrorCallback) -> TranscribeResult<()> {
        *self.error_callback.lock().await = Some(Box::new(move |e| {
            let cb = callback.clone();
            Box::pin(async move {
                cb(e).await;
            })
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_before_connect_is_noop() {
        let mut session = GatewaySession::new(
            RecognitionConfig::new("app", "id", "secret", "cn-shanghai"),
            TranscriptionOptions::default(),
        );
        assert_eq!(session.state(), SessionState::Idle);
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        // Second close is also a no-op
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_after_close_rejected() {
        let mut session = GatewaySession::new(
            RecognitionConfig::new("app", "id", "secret", "cn-shanghai"),
            TranscriptionOptions::default(),
        );
        session.close().await.unwrap();
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_send_audio_outside_open_is_noop() {
        let mut session = GatewaySession::new(
            RecognitionConfig::new("app", "id", "secret", "cn-shanghai"),
            TranscriptionOptions::default(),
        );
        // Idle: dropped silently
        session.send_audio(Bytes::from_static(&[0u8; 4])).await.unwrap();
        session.close().await.unwrap();
        // Closed: still a no-op
        session.send_audio(Bytes::from_static(&[0u8; 4])).await.unwrap();
    }
}
