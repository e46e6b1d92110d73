//! Offline gateway substitute.
//!
//! Stands in for the real gateway with zero network dependency, for both
//! one-shot and streaming modes. Output is structurally valid (satisfies
//! every [`TranscriptionResult`] invariant) but semantically arbitrary: it
//! is drawn from a fixed pool of meeting-flavored sample sentences.
//!
//! The simulator backs three things: forced-simulation mode, the file
//! orchestrator's last-resort fallback, and development without gateway
//! credentials. Callers are expected to log when simulated output is served
//! so operators can tell it apart from real recognition.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::types::{TranscriptionOptions, TranscriptionResult, WordTiming};

/// Fixed speaker attached to every result when diarization is enabled.
pub const SIM_SPEAKER_ID: &str = "sim-speaker-1";
/// Display name for the fixed simulated speaker.
pub const SIM_SPEAKER_NAME: &str = "Speaker 1";

/// Nominal speaking rate used to derive utterance durations.
const MS_PER_CHAR: u64 = 250;

/// Sample sentence pool. Streaming mode cycles through it in order,
/// wrapping around; file mode picks one at random.
pub const SAMPLE_SENTENCES: &[&str] = &[
    "大家好，我们现在开始今天的会议。",
    "首先请各位同步一下上周的工作进展。",
    "这个方案的预算还需要再确认一下。",
    "关于新功能的上线时间，我建议推迟到下个月。",
    "请产品团队在周五之前提交评审意见。",
    "我们需要尽快解决线上反馈的音频延迟问题。",
    "今天的议题就到这里，谢谢大家参加。",
];

/// Artificial latency for one-shot recognition, drawn from a broad range so
/// tests cannot depend on exact timing.
fn file_latency() -> Duration {
    Duration::from_millis(rand::rng().random_range(300..=1500))
}

/// Split a sentence into "words" for timing purposes.
///
/// Whitespace-delimited text splits on whitespace; CJK text without spaces
/// splits per character.
pub(crate) fn split_words(text: &str) -> Vec<String> {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if tokens.len() > 1 {
        return tokens;
    }
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_string())
        .collect()
}

/// Build one structurally valid result from a sample sentence.
///
/// The sentence duration is divided evenly across its characters; each
/// word's span covers its share of characters. The diarization toggle
/// controls whether the fixed speaker is attached.
pub(crate) fn build_result(
    text: &str,
    start_time: u64,
    options: &TranscriptionOptions,
) -> TranscriptionResult {
    let mut rng = rand::rng();
    let confidence: f32 = rng.random_range(0.85..=0.99);

    let words = split_words(text);
    let total_chars: u64 = words.iter().map(|w| w.chars().count() as u64).sum();
    let duration = total_chars.max(1) * MS_PER_CHAR;
    let end_time = start_time + duration;
    let per_char = duration / total_chars.max(1);

    let mut timings = Vec::with_capacity(words.len());
    let mut cursor = start_time;
    for word in words {
        let span = word.chars().count() as u64 * per_char;
        timings.push(WordTiming {
            word,
            start_time: cursor,
            end_time: (cursor + span).min(end_time),
            confidence,
        });
        cursor += span;
    }

    let (speaker_id, speaker_name) = if options.enable_speaker_diarization {
        (
            Some(SIM_SPEAKER_ID.to_string()),
            Some(SIM_SPEAKER_NAME.to_string()),
        )
    } else {
        (None, None)
    };

    TranscriptionResult {
        text: text.to_string(),
        confidence,
        speaker_id,
        speaker_name,
        start_time,
        end_time,
        words: Some(timings),
    }
}

/// One-shot simulated recognition: after an artificial delay, exactly one
/// result built from a randomly chosen sample sentence.
pub async fn recognize_simulated(options: &TranscriptionOptions) -> Vec<TranscriptionResult> {
    let delay = file_latency();
    debug!("Simulated recognition, artificial latency {:?}", delay);
    tokio::time::sleep(delay).await;

    let index = rand::rng().random_range(0..SAMPLE_SENTENCES.len());
    vec![build_result(SAMPLE_SENTENCES[index], 0, options)]
}

// =============================================================================
// Tests
// =============================================================================
