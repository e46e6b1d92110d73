//! One-shot (file) recognition orchestration.
//!
//! Walks the authentication strategy chain in fixed priority order, sending
//! one bounded HTTP recognition request per strategy, and stops at the first
//! strategy whose parsed result set is non-empty. If every strategy fails or
//! comes back empty, falls back to the [`crate::simulator`] — silently to
//! the caller, loudly in the logs.
//!
//! The only error that propagates out of this module is
//! [`TranscribeError::Input`]: an unreadable audio source is a caller bug,
//! raised before any strategy is attempted.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::auth::{AuthStrategy, RequestAuth, default_chain};
use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};
use crate::parser::parse_file_response;
use crate::simulator;
use crate::types::{TranscriptionOptions, TranscriptionResult};

/// Bound on one authenticated recognition request.
const RECOGNITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one strategy attempt. Exists only within the scope of one
/// orchestration call; a successful-but-empty result set advances the
/// fallback chain exactly like a failure.
enum AttemptOutcome {
    /// Non-empty parsed results. First one wins.
    Success(Vec<TranscriptionResult>),
    /// The gateway answered but nothing parseable came back.
    Empty,
    /// Authentication or transport failed.
    Failed(TranscribeError),
}

/// File-recognition orchestrator.
///
/// Owns the strategy chain and a pooled HTTP client; one instance serves
/// any number of recognition calls.
pub struct FileRecognizer {
    config: RecognitionConfig,
    http: reqwest::Client,
    chain: Vec<Box<dyn AuthStrategy>>,
}

impl FileRecognizer {
    /// Build an orchestrator for the given configuration.
    pub fn new(config: RecognitionConfig) -> TranscribeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(RECOGNITION_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                TranscribeError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        let chain = default_chain(&config);
        Ok(Self {
            config,
            http,
            chain,
        })
    }

    /// Recognize an audio file on disk.
    ///
    /// An unreadable path raises [`TranscribeError::Input`] before any
    /// strategy attempt. Everything else resolves to at least the
    /// simulator's output.
    pub async fn recognize_file(
        &self,
        path: impl AsRef<Path>,
        options: &TranscriptionOptions,
    ) -> TranscribeResult<Vec<TranscriptionResult>> {
        let path = path.as_ref();
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| TranscribeError::Input(format!("{}: {e}", path.display())))?;
        Ok(self.recognize(&audio, options).await)
    }

    /// Recognize an in-memory audio buffer.
    ///
    /// Never fails: the simulator guarantees output when no strategy
    /// produces any. A zero-length buffer is passed through to strategies
    /// as-is; the gateway decides what it means.
    pub async fn recognize(
        &self,
        audio: &[u8],
        options: &TranscriptionOptions,
    ) -> Vec<TranscriptionResult> {
        if self.config.force_simulated {
            info!("Forced simulation mode: serving simulated transcription");
            return simulator::recognize_simulated(options).await;
        }

        for strategy in &self.chain {
            let kind = strategy.kind();
            match self.attempt(strategy.as_ref(), audio, options).await {
                AttemptOutcome::Success(results) => {
                    info!(
                        strategy = %kind,
                        sentences = results.len(),
                        "Recognition succeeded"
                    );
                    return results;
                }
                AttemptOutcome::Empty => {
                    info!(strategy = %kind, "Strategy returned no results, advancing");
                }
                AttemptOutcome::Failed(e) => {
                    warn!(strategy = %kind, "Strategy failed, advancing: {e}");
                }
            }
        }

        warn!("All authentication strategies exhausted: serving simulated transcription");
        simulator::recognize_simulated(options).await
    }

    /// One strategy attempt: authenticate, send, parse.
    async fn attempt(
        &self,
        strategy: &dyn AuthStrategy,
        audio: &[u8],
        options: &TranscriptionOptions,
    ) -> AttemptOutcome {
        let auth = match strategy.prepare(&self.config, &self.http).await {
            Ok(auth) => auth,
            Err(e) => return AttemptOutcome::Failed(e),
        };

        match self.send_recognition(&auth, audio, options).await {
            Ok(body) => {
                let results = parse_file_response(&body);
                if results.is_empty() {
                    AttemptOutcome::Empty
                } else {
                    AttemptOutcome::Success(results)
                }
            }
            Err(e) => AttemptOutcome::Failed(e),
        }
    }

    /// Send one authenticated recognition request and return the JSON body.
    async fn send_recognition(
        &self,
        auth: &RequestAuth,
        audio: &[u8],
        options: &TranscriptionOptions,
    ) -> TranscribeResult<Value> {
        let url = format!("{}/asr", self.config.gateway_url);

        let mut body = json!({
            "appkey": self.config.app_key,
            "format": options.format,
            "sample_rate": options.sample_rate,
            "language": options.language,
            "enable_punctuation": options.enable_punctuation,
            "enable_inverse_text_normalization": options.enable_inverse_text_normalization,
            "enable_speaker_diarization": options.enable_speaker_diarization,
            "speaker_count": options.speaker_count,
            "model": options.model,
            "audio": BASE64.encode(audio),
        });
        if let Some(map) = body.as_object_mut() {
            for (key, value) in &auth.payload_fields {
                map.insert((*key).to_string(), value.clone());
            }
        }

        let mut request = self.http.post(&url).timeout(RECOGNITION_TIMEOUT);
        for (name, value) in &auth.headers {
            request = request.header(*name, value);
        }

        debug!(url = %url, bytes = audio.len(), "Sending recognition request");

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscribeError::Transport(format!("recognition request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Transport(format!(
                "gateway rejected recognition ({status}): {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TranscribeError::Transport(format!("invalid response body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_forced_simulation_skips_strategies() {
        let recognizer = FileRecognizer::new(RecognitionConfig::simulated()).unwrap();
        let options = TranscriptionOptions::default();
        let results = recognizer.recognize(&[0u8; 64], &options).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_well_formed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_credentials_falls_back_to_simulator() {
        // Empty chain: no credentials at all, fallback fires immediately
        let config = RecognitionConfig::new("", "", "", "cn-shanghai");
        let recognizer = FileRecognizer::new(config).unwrap();
        let results = recognizer
            .recognize(&[0u8; 64], &TranscriptionOptions::default())
            .await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_raises_input_failure() {
        let recognizer = FileRecognizer::new(RecognitionConfig::simulated()).unwrap();
        let err = recognizer
            .recognize_file(
                "/nonexistent/audio.wav",
                &TranscriptionOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::Input(_)));
    }
}
