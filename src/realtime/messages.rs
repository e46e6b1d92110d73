//! Streaming wire protocol: JSON envelopes and inbound event decoding.
//!
//! Every frame in either direction is a JSON envelope with a `header`
//! (message id, task id, namespace, directive name, app key) and a
//! `payload`. Outbound directive names are `StartTranscription`,
//! `SendAudio` and `StopTranscription`; inbound names are decoded once at
//! the transport boundary into the closed [`GatewayEvent`] enum.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{TranscribeError, TranscribeResult};
use crate::parser::parse_realtime_payload;
use crate::types::{TranscriptionOptions, TranscriptionResult};

/// Namespace carried in every envelope header.
pub const NAMESPACE: &str = "SpeechTranscriber";

// =============================================================================
// Envelope
// =============================================================================

/// Envelope header, identical in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique id for this frame.
    pub message_id: String,
    /// Id of the streaming task (stable for the whole session).
    pub task_id: String,
    /// Always [`NAMESPACE`].
    pub namespace: String,
    /// Directive or event name.
    pub name: String,
    /// Gateway application key.
    #[serde(default)]
    pub appkey: String,
}

/// A complete wire frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: MessageHeader,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Envelope {
    fn directive(task_id: &str, app_key: &str, name: &str, payload: Value) -> Self {
        Self {
            header: MessageHeader {
                message_id: Uuid::new_v4().to_string(),
                task_id: task_id.to_string(),
                namespace: NAMESPACE.to_string(),
                name: name.to_string(),
                appkey: app_key.to_string(),
            },
            payload: Some(payload),
        }
    }

    /// The start directive carrying the per-session transcription options.
    pub fn start_transcription(
        task_id: &str,
        app_key: &str,
        options: &TranscriptionOptions,
    ) -> Self {
        Self::directive(
            task_id,
            app_key,
            "StartTranscription",
            json!({
                "format": options.format,
                "sample_rate": options.sample_rate,
                "language": options.language,
                "enable_punctuation": options.enable_punctuation,
                "enable_inverse_text_normalization": options.enable_inverse_text_normalization,
                "enable_speaker_diarization": options.enable_speaker_diarization,
                "speaker_count": options.speaker_count,
                "model": options.model,
            }),
        )
    }

    /// A data frame wrapping one raw audio chunk.
    pub fn send_audio(task_id: &str, app_key: &str, frame: &[u8]) -> Self {
        Self::directive(
            task_id,
            app_key,
            "SendAudio",
            json!({
                "audio": BASE64.encode(frame),
                "status": "streaming",
            }),
        )
    }

    /// The stop directive ending the audio stream.
    pub fn stop_transcription(task_id: &str, app_key: &str) -> Self {
        Self::directive(task_id, app_key, "StopTranscription", json!({}))
    }

    /// Serialize to the wire text form.
    pub fn to_wire(&self) -> TranscribeResult<String> {
        serde_json::to_string(self)
            .map_err(|e| TranscribeError::Parse(format!("failed to encode envelope: {e}")))
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Inbound gateway frame, decoded by directive name.
///
/// `Started` is the session-started acknowledgement, consumed internally by
/// the session and never surfaced to subscribers.
#[derive(Debug)]
pub enum GatewayEvent {
    /// Session-started acknowledgement.
    Started,
    /// A new sentence began.
    SentenceBegin { timestamp: u64 },
    /// Partial recognition update.
    ResultChanged {
        timestamp: u64,
        result: TranscriptionResult,
    },
    /// A sentence was finalized.
    SentenceEnd {
        timestamp: u64,
        result: TranscriptionResult,
    },
    /// The gateway finished the whole transcription.
    Completed { timestamp: u64 },
}

/// Decode one inbound text frame.
///
/// An unknown directive name or an event payload that does not parse is a
/// [`TranscribeError::Parse`]; the session logs these without tearing the
/// transport down.
pub fn decode_frame(text: &str) -> TranscribeResult<GatewayEvent> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| TranscribeError::Parse(format!("malformed envelope: {e}")))?;

    let payload = envelope.payload.unwrap_or(Value::Null);
    let timestamp = payload_timestamp(&payload);

    match envelope.header.name.as_str() {
        "TranscriptionStarted" => Ok(GatewayEvent::Started),
        "SentenceBegin" => Ok(GatewayEvent::SentenceBegin { timestamp }),
        "TranscriptionResultChanged" => {
            let result = parse_realtime_payload(&payload).ok_or_else(|| {
                TranscribeError::Parse("TranscriptionResultChanged payload unparseable".into())
            })?;
            Ok(GatewayEvent::ResultChanged { timestamp, result })
        }
        "SentenceEnd" => {
            let result = parse_realtime_payload(&payload).ok_or_else(|| {
                TranscribeError::Parse("SentenceEnd payload unparseable".into())
            })?;
            Ok(GatewayEvent::SentenceEnd { timestamp, result })
        }
        "TranscriptionCompleted" => Ok(GatewayEvent::Completed { timestamp }),
        other => Err(TranscribeError::Parse(format!(
            "unknown gateway event: {other}"
        ))),
    }
}

/// Best-effort event timestamp: `time`, falling back to `begin_time`, then 0.
fn payload_timestamp(payload: &Value) -> u64 {
    payload
        .get("time")
        .or_else(|| payload.get("begin_time"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
