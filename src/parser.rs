//! Gateway response normalization.
//!
//! Pure, stateless mapping from the three known gateway response shapes
//! (single-sentence object, sentence-array object, realtime-result payload)
//! to canonical [`TranscriptionResult`] values.
//!
//! Unknown or malformed shapes yield an empty sequence, never an error;
//! the file-recognition orchestrator treats that the same as "no result"
//! for fallback purposes.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{TranscriptionResult, WordTiming};

// =============================================================================
// Raw Gateway Shapes
// =============================================================================

/// One-shot recognition response body: either `sentence` or `sentences`.
#[derive(Debug, Deserialize)]
struct FileResponse {
    #[serde(default)]
    sentence: Option<GatewaySentence>,
    #[serde(default)]
    sentences: Option<Vec<GatewaySentence>>,
}

/// A sentence object as the gateway encodes it.
#[derive(Debug, Deserialize)]
struct GatewaySentence {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    begin_time: Option<u64>,
    #[serde(default)]
    end_time: Option<u64>,
    #[serde(default)]
    speaker_id: Option<String>,
    #[serde(default)]
    words: Option<Vec<GatewayWord>>,
}

/// Word timing as the gateway encodes it.
#[derive(Debug, Deserialize)]
struct GatewayWord {
    text: String,
    #[serde(default)]
    begin_time: Option<u64>,
    #[serde(default)]
    end_time: Option<u64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Realtime event payload: `result` text with `begin_time`/`time` offsets.
#[derive(Debug, Deserialize)]
struct RealtimePayload {
    result: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    begin_time: Option<u64>,
    #[serde(default)]
    time: Option<u64>,
    #[serde(default)]
    speaker_id: Option<String>,
    #[serde(default)]
    words: Option<Vec<GatewayWord>>,
}

// =============================================================================
// Parsing Entry Points
// =============================================================================

/// Parse a one-shot recognition response into zero or more results.
///
/// Accepts both the `{"sentence": {...}}` and `{"sentences": [...]}` shapes.
/// Anything else parses to an empty vector.
pub fn parse_file_response(body: &Value) -> Vec<TranscriptionResult> {
    let response: FileResponse = match serde_json::from_value(body.clone()) {
        Ok(r) => r,
        Err(e) => {
            debug!("Unrecognized file response shape: {e}");
            return Vec::new();
        }
    };

    if let Some(sentence) = response.sentence {
        return convert_sentence(sentence).into_iter().collect();
    }
    if let Some(sentences) = response.sentences {
        return sentences.into_iter().filter_map(convert_sentence).collect();
    }

    debug!("File response carried neither 'sentence' nor 'sentences'");
    Vec::new()
}

/// Parse a realtime event payload into a single result, if it matches.
pub fn parse_realtime_payload(payload: &Value) -> Option<TranscriptionResult> {
    let payload: RealtimePayload = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            debug!("Unrecognized realtime payload shape: {e}");
            return None;
        }
    };

    if payload.result.is_empty() {
        return None;
    }

    let start_time = payload.begin_time.unwrap_or(0);
    let end_time = payload.time.unwrap_or(start_time).max(start_time);
    let speaker_name = payload.speaker_id.as_ref().map(|id| format!("Speaker {id}"));

    Some(TranscriptionResult {
        text: payload.result,
        confidence: normalize_confidence(payload.confidence),
        speaker_id: payload.speaker_id,
        speaker_name,
        start_time,
        end_time,
        words: convert_words(payload.words, start_time, end_time),
    })
}

// =============================================================================
// Conversion Helpers
// =============================================================================

fn convert_sentence(sentence: GatewaySentence) -> Option<TranscriptionResult> {
    if sentence.text.is_empty() {
        return None;
    }

    let start_time = sentence.begin_time.unwrap_or(0);
    let end_time = sentence.end_time.unwrap_or(start_time).max(start_time);
    let speaker_name = sentence
        .speaker_id
        .as_ref()
        .map(|id| format!("Speaker {id}"));

    Some(TranscriptionResult {
        text: sentence.text,
        confidence: normalize_confidence(sentence.confidence),
        speaker_id: sentence.speaker_id,
        speaker_name,
        start_time,
        end_time,
        words: convert_words(sentence.words, start_time, end_time),
    })
}

/// Convert gateway word entries, clamping each span into the utterance span
/// and dropping entries that would break non-decreasing time order.
fn convert_words(
    words: Option<Vec<GatewayWord>>,
    utterance_start: u64,
    utterance_end: u64,
) -> Option<Vec<WordTiming>> {
    let words = words?;
    let mut converted = Vec::with_capacity(words.len());
    let mut previous_start = utterance_start;

    for word in words {
        if word.text.is_empty() {
            continue;
        }
        let start = word
            .begin_time
            .unwrap_or(previous_start)
            .clamp(utterance_start, utterance_end);
        if start < previous_start {
            continue;
        }
        let end = word.end_time.unwrap_or(start).clamp(start, utterance_end);
        previous_start = start;
        converted.push(WordTiming {
            word: word.text,
            start_time: start,
            end_time: end,
            confidence: normalize_confidence(word.confidence),
        });
    }

    if converted.is_empty() {
        None
    } else {
        Some(converted)
    }
}

/// Normalize a gateway confidence to [0, 1].
///
/// Some gateway responses report percentages (0-100); anything above 1.0 is
/// treated as a percentage.
fn normalize_confidence(raw: Option<f64>) -> f32 {
    let value = raw.unwrap_or(0.0);
    let value = if value > 1.0 { value / 100.0 } else { value };
    value.clamp(0.0, 1.0) as f32
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_sentence() {
        let body = json!({
            "sentence": {
                "text": "会议现在开始。",
                "confidence": 0.93,
                "begin_time": 0,
                "end_time": 2400
            }
        });

        let results = parse_file_response(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "会议现在开始。");
        assert!((results[0].confidence - 0.93).abs() < 1e-6);
        assert_eq!(results[0].end_time, 2400);
        assert!(results[0].is_well_formed());
    }

    #[test]
    fn test_parse_sentence_array() {
        let body = json!({
            "sentences": [
                {"text": "first", "confidence": 0.9, "begin_time": 0, "end_time": 1000},
                {"text": "second", "confidence": 0.8, "begin_time": 1200, "end_time": 2000},
            ]
        });

        let results = parse_file_response(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "first");
        assert_eq!(results[1].start_time, 1200);
    }

    #[test]
    fn test_parse_sentence_with_words() {
        let body = json!({
            "sentence": {
                "text": "hello world",
                "confidence": 0.95,
                "begin_time": 100,
                "end_time": 1100,
                "words": [
                    {"text": "hello", "begin_time": 100, "end_time": 500, "confidence": 0.96},
                    {"text": "world", "begin_time": 600, "end_time": 1100, "confidence": 0.94},
                ]
            }
        });

        let results = parse_file_response(&body);
        let words = results[0].words.as_ref().unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "hello");
        assert!(results[0].is_well_formed());
    }

    #[test]
    fn test_words_clamped_into_utterance_span() {
        let body = json!({
            "sentence": {
                "text": "hi",
                "begin_time": 100,
                "end_time": 500,
                "words": [
                    {"text": "hi", "begin_time": 0, "end_time": 900}
                ]
            }
        });

        let results = parse_file_response(&body);
        let words = results[0].words.as_ref().unwrap();
        assert_eq!(words[0].start_time, 100);
        assert_eq!(words[0].end_time, 500);
        assert!(results[0].is_well_formed());
    }

    #[test]
    fn test_percentage_confidence_normalized() {
        let body = json!({
            "sentence": {"text": "ok", "confidence": 87.0}
        });

        let results = parse_file_response(&body);
        assert!((results[0].confidence - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_response_yields_empty() {
        assert!(parse_file_response(&json!({"status": "ok"})).is_empty());
        assert!(parse_file_response(&json!("just a string")).is_empty());
        assert!(parse_file_response(&json!(null)).is_empty());
        assert!(parse_file_response(&json!({"sentence": {"no_text": true}})).is_empty());
    }

    #[test]
    fn test_empty_text_filtered() {
        let body = json!({
            "sentences": [
                {"text": ""},
                {"text": "kept"},
            ]
        });
        let results = parse_file_response(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "kept");
    }

    #[test]
    fn test_parse_realtime_payload() {
        let payload = json!({
            "result": "那我们先过一下上周的进展",
            "confidence": 0.91,
            "begin_time": 1000,
            "time": 4200,
            "speaker_id": "1"
        });

        let result = parse_realtime_payload(&payload).unwrap();
        assert_eq!(result.text, "那我们先过一下上周的进展");
        assert_eq!(result.start_time, 1000);
        assert_eq!(result.end_time, 4200);
        assert_eq!(result.speaker_id.as_deref(), Some("1"));
        assert_eq!(result.speaker_name.as_deref(), Some("Speaker 1"));
        assert!(result.is_well_formed());
    }

    #[test]
    fn test_realtime_payload_end_never_before_start() {
        let payload = json!({
            "result": "x",
            "begin_time": 500,
            "time": 100
        });
        let result = parse_realtime_payload(&payload).unwrap();
        assert_eq!(result.end_time, 500);
    }

    #[test]
    fn test_realtime_payload_malformed() {
        assert!(parse_realtime_payload(&json!({"text": "wrong field"})).is_none());
        assert!(parse_realtime_payload(&json!({"result": ""})).is_none());
    }
}
