//! Simulated streaming session.
//!
//! Produces a plausible event stream with zero network dependency: after a
//! short delay, `SentenceBegin`, then partial `ResultChanged` updates as a
//! growing prefix of the current sample sentence, a `SentenceEnd` with full
//! word timings, a randomized pause, and the next sentence from the pool,
//! wrapping around indefinitely.
//!
//! Every timer lives under one [`CancellationToken`] acquired on
//! `connect()` and cancelled on `close()`: when the token fires the emitter
//! sends exactly one `Completed` and stops, so no event can ever follow
//! teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ErrorCallback, EventCallback, RealTimeSession};
use crate::error::{TranscribeError, TranscribeResult};
use crate::simulator::{SAMPLE_SENTENCES, build_result};
use crate::types::{RealTimeEvent, SessionState, TranscriptionOptions, TranscriptionResult};

/// Type alias for the stored async event callback.
type AsyncEventCallback = Box<
    dyn Fn(RealTimeEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Offline substitute for a gateway streaming session.
pub struct SimulatedSession {
    options: TranscriptionOptions,
    state: Arc<StdMutex<SessionState>>,
    open: Arc<AtomicBool>,
    /// Scopes every internal timer; cancelled on `close()`.
    cancel: CancellationToken,
    emitter_handle: Option<tokio::task::JoinHandle<()>>,
    event_callback: Arc<tokio::sync::Mutex<Option<AsyncEventCallback>>>,
}

impl SimulatedSession {
    /// Create a session in the `Idle` state.
    pub fn new(options: TranscriptionOptions) -> Self {
        Self {
            options,
            state: Arc::new(StdMutex::new(SessionState::Idle)),
            open: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            emitter_handle: None,
            event_callback: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }
}

/// Sleep that aborts when the session is cancelled. Returns false on cancel.
async fn cancellable_sleep(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// The emitter loop. Runs until cancelled, then emits one `Completed`.
async fn run_emitter(
    options: TranscriptionOptions,
    cancel: CancellationToken,
    callback: Arc<tokio::sync::Mutex<Option<AsyncEventCallback>>>,
    open: Arc<AtomicBool>,
) {
    let started = Instant::now();
    let now_ms = |started: Instant| started.elapsed().as_millis() as u64;

    let emit = |event: RealTimeEvent| {
        let callback = callback.clone();
        async move {
            if let Some(cb) = callback.lock().await.as_ref() {
                cb(event).await;
            } else {
                debug!("Simulated event with no subscriber: {event:?}");
            }
        }
    };

    // Models connection + first-audio latency
    let connect_delay = Duration::from_millis(rand::rng().random_range(200..=500));
    if !cancellable_sleep(&cancel, connect_delay).await {
        emit(RealTimeEvent::Completed {
            timestamp: now_ms(started),
        })
        .await;
        open.store(false, Ordering::Release);
        return;
    }

    let mut sentence_index = 0usize;

    'sentences: loop {
        let sentence = SAMPLE_SENTENCES[sentence_index % SAMPLE_SENTENCES.len()];
        sentence_index += 1;
        let sentence_start = now_ms(started);

        emit(RealTimeEvent::SentenceBegin {
            timestamp: sentence_start,
        })
        .await;

        // Growing character-prefix partials
        let chars: Vec<char> = sentence.chars().collect();
        let mut prefix_len = 1;
        while prefix_len < chars.len() {
            let tick = Duration::from_millis(rand::rng().random_range(100..=300));
            if !cancellable_sleep(&cancel, tick).await {
                break 'sentences;
            }
            let partial = partial_result(
                &chars[..prefix_len],
                sentence_start,
                now_ms(started),
                &options,
            );
            emit(RealTimeEvent::ResultChanged {
                timestamp: now_ms(started),
                result: partial,
            })
            .await;
            prefix_len += 1;
        }

        let full = build_result(sentence, sentence_start, &options);
        emit(RealTimeEvent::SentenceEnd {
            timestamp: full.end_time,
            result: full,
        })
        .await;

        let pause = Duration::from_millis(rand::rng().random_range(500..=1500));
        if !cancellable_sleep(&cancel, pause).await {
            break 'sentences;
        }
    }

    emit(RealTimeEvent::Completed {
        timestamp: now_ms(started),
    })
    .await;
    open.store(false, Ordering::Release);
    info!("Simulated streaming session completed");
}

/// A partial (unstable) result for a growing prefix. No word timings;
/// those arrive with `SentenceEnd`.
fn partial_result(
    prefix: &[char],
    start_time: u64,
    end_time: u64,
    options: &TranscriptionOptions,
) -> TranscriptionResult {
    let (speaker_id, speaker_name) = if options.enable_speaker_diarization {
        (
            Some(crate::simulator::SIM_SPEAKER_ID.to_string()),
            Some(crate::simulator::SIM_SPEAKER_NAME.to_string()),
        )
    } else {
        (None, None)
    };

    TranscriptionResult {
        text: prefix.iter().collect(),
        confidence: rand::rng().random_range(0.85..=0.99),
        speaker_id,
        speaker_name,
        start_time,
        end_time: end_time.max(start_time),
        words: None,
    }
}

#[async_trait::async_trait]
impl RealTimeSession for SimulatedSession {
    async fn connect(&mut self) -> TranscribeResult<()> {
        if self.state() != SessionState::Idle {
            return Err(TranscribeError::InvalidState(format!(
                "connect() called in state '{}'; a fresh session is required",
                self.state()
            )));
        }

        self.set_state(SessionState::Open);
        self.open.store(true, Ordering::Release);

        let options = self.options.clone();
        let cancel = self.cancel.clone();
        let callback = self.event_callback.clone();
        let open = self.open.clone();
        self.emitter_handle = Some(tokio::spawn(run_emitter(options, cancel, callback, open)));

        info!("Simulated streaming session opened");
        Ok(())
    }

    async fn send_audio(&mut self, frame: Bytes) -> TranscribeResult<()> {
        // The simulator consumes nothing; accept and drop while open
        if !self.open.load(Ordering::Acquire) {
            debug!("send_audio outside open state, dropping frame");
        } else {
            debug!("Simulated session absorbing {} audio bytes", frame.len());
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
        self.cancel.cancel();
        // Wait for the emitter to flush its final `Completed`
        if let Some(handle) = self.emitter_handle.take() {
            let _ = handle.await;
        }
        self.open.store(false, Ordering::Release);
        self.set_state(SessionState::Closed);
        info!("Simulated streaming session closed");
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

    async fn on_error(&mut self, _callback: ErrorCallback) -> TranscribeResult<()> {
        // The simulator never fails; the channel exists for interface parity
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
