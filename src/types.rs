//! Shared data types: per-call options, transcription results and
//! real-time session events.
//!
//! All time offsets are milliseconds relative to the start of the stream or
//! file. Confidence scores are normalized to `[0.0, 1.0]`.

use serde::{Deserialize, Serialize};

// =============================================================================
// Per-Call Options
// =============================================================================

/// Per-call transcription configuration.
///
/// Defaults target Mandarin meeting audio (16 kHz mono PCM); construct with
/// struct-update syntax to override individual fields:
///
/// ```rust
/// use asr_client::TranscriptionOptions;
///
/// let options = TranscriptionOptions {
///     language: "en-US".to_string(),
///     enable_speaker_diarization: true,
///     ..Default::default()
/// };
/// assert_eq!(options.sample_rate, 16000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// BCP-47 language tag, e.g. "zh-CN".
    pub language: String,
    /// Audio container/encoding identifier, e.g. "pcm", "wav".
    pub format: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Insert punctuation into the transcript.
    pub enable_punctuation: bool,
    /// Inverse text normalization ("twenty three" -> "23").
    pub enable_inverse_text_normalization: bool,
    /// Attribute speech segments to distinct speakers.
    pub enable_speaker_diarization: bool,
    /// Expected number of speakers, used as a diarization hint.
    pub speaker_count: u32,
    /// Gateway model identifier.
    pub model: String,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: "zh-CN".to_string(),
            format: "pcm".to_string(),
            sample_rate: 16000,
            enable_punctuation: true,
            enable_inverse_text_normalization: true,
            enable_speaker_diarization: false,
            speaker_count: 2,
            model: "paraformer-realtime-v2".to_string(),
        }
    }
}

// =============================================================================
// Transcription Results
// =============================================================================

/// Word-level timing within an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    /// The recognized word.
    pub word: String,
    /// Start offset in milliseconds.
    pub start_time: u64,
    /// End offset in milliseconds.
    pub end_time: u64,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
}

/// One recognized utterance.
///
/// Invariants: `end_time >= start_time`; if `words` is present, entries are
/// in non-decreasing time order and lie within `[start_time, end_time]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Recognized text.
    pub text: String,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
    /// Speaker identifier, present only when diarization is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    /// Human-readable speaker name, present only when diarization is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_name: Option<String>,
    /// Utterance start offset in milliseconds.
    pub start_time: u64,
    /// Utterance end offset in milliseconds.
    pub end_time: u64,
    /// Optional word-level timings, ordered by time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

impl TranscriptionResult {
    /// Check the structural invariants on timings and confidence.
    ///
    /// Used by tests and the simulator's self-checks; production parsing
    /// never rejects gateway data on this basis.
    pub fn is_well_formed(&self) -> bool {
        if self.end_time < self.start_time {
            return false;
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return false;
        }
        if let Some(words) = &self.words {
            let mut previous_start = self.start_time;
            for w in words {
                if w.end_time < w.start_time
                    || w.start_time < previous_start
                    || w.start_time < self.start_time
                    || w.end_time > self.end_time
                    || !(0.0..=1.0).contains(&w.confidence)
                {
                    return false;
                }
                previous_start = w.start_time;
            }
        }
        true
    }
}

// =============================================================================
// Real-Time Session Events
// =============================================================================

/// Event emitted by a streaming recognition session.
///
/// `ResultChanged` carries partial, unstable text and must never be treated
/// as final; consumers persist only `SentenceEnd` results.
#[derive(Debug, Clone)]
pub enum RealTimeEvent {
    /// The gateway detected the start of a new sentence.
    SentenceBegin {
        /// Offset in milliseconds from session start.
        timestamp: u64,
    },
    /// Partial recognition update for the in-progress sentence.
    ResultChanged {
        /// Offset in milliseconds from session start.
        timestamp: u64,
        /// The partial result. Text is unstable until `SentenceEnd`.
        result: TranscriptionResult,
    },
    /// A sentence was finalized.
    SentenceEnd {
        /// Offset in milliseconds from session start.
        timestamp: u64,
        /// The final result for the sentence.
        result: TranscriptionResult,
    },
    /// The session finished; no further events follow.
    Completed {
        /// Offset in milliseconds from session start.
        timestamp: u64,
    },
}

impl RealTimeEvent {
    /// The result attached to this event, if any.
    pub fn result(&self) -> Option<&TranscriptionResult> {
        match self {
            Self::ResultChanged { result, .. } | Self::SentenceEnd { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Whether this event carries text the consumer may persist.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::SentenceEnd { .. })
    }
}

// =============================================================================
// Session Lifecycle
// =============================================================================

/// Lifecycle of a streaming session.
///
/// `Idle -> Connecting -> Open -> Closing -> Closed`, with `Failed` as the
/// terminal state when connecting errors out. Each transition occurs at most
/// once per session; re-opening requires a new session object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet connected.
    Idle,
    /// Transport connect in progress.
    Connecting,
    /// Start directive acknowledged; audio may be sent.
    Open,
    /// Stop directive sent, waiting for transport close.
    Closing,
    /// Session over. Terminal.
    Closed,
    /// Connect failed. Terminal; not retried internally.
    Failed,
}

impl SessionState {
    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Tests
// =============================================================================
