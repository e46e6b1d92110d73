//! Client facade.
//!
//! [`SpeechClient`] ties the pieces together: one-shot recognition through
//! the strategy-fallback orchestrator, and streaming recognition through
//! session objects created per conversation.
//!
//! ```rust,no_run
//! use asr_client::{RecognitionConfig, SpeechClient, TranscriptionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpeechClient::new(RecognitionConfig::from_env()?)?;
//!
//!     let results = client
//!         .recognize_from_file("meeting.wav", &TranscriptionOptions::default())
//!         .await?;
//!     for result in results {
//!         println!("[{} - {}] {}", result.start_time, result.end_time, result.text);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;

use crate::config::RecognitionConfig;
use crate::error::TranscribeResult;
use crate::file::FileRecognizer;
use crate::realtime::{RealTimeSession, create_session};
use crate::types::{TranscriptionOptions, TranscriptionResult};

/// Speech-recognition client.
///
/// Owns its immutable [`RecognitionConfig`] for the client's lifetime. One
/// instance serves any number of file recognitions and can mint any number
/// of streaming sessions.
pub struct SpeechClient {
    config: RecognitionConfig,
    recognizer: FileRecognizer,
}

impl SpeechClient {
    /// Build a client for the given configuration.
    pub fn new(config: RecognitionConfig) -> TranscribeResult<Self> {
        let recognizer = FileRecognizer::new(config.clone())?;
        Ok(Self { config, recognizer })
    }

    /// Build a client from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        Self::new(RecognitionConfig::from_env()?)
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Recognize an audio file on disk.
    ///
    /// Raises only [`crate::TranscribeError::Input`] (unreadable source);
    /// every backend failure resolves to at least simulated output.
    pub async fn recognize_from_file(
        &self,
        path: impl AsRef<Path>,
        options: &TranscriptionOptions,
    ) -> TranscribeResult<Vec<TranscriptionResult>> {
        self.recognizer.recognize_file(path, options).await
    }

    /// Recognize an in-memory audio buffer. Never fails.
    pub async fn recognize(
        &self,
        audio: &[u8],
        options: &TranscriptionOptions,
    ) -> Vec<TranscriptionResult> {
        self.recognizer.recognize(audio, options).await
    }

    /// Create a streaming session.
    ///
    /// The real or simulated variant is chosen here, once; the caller
    /// drives the session with `connect`/`send_audio`/`close`.
    pub fn create_realtime_session(
        &self,
        options: TranscriptionOptions,
    ) -> Box<dyn RealTimeSession> {
        create_session(&self.config, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionState;

    #[test]
    fn test_client_construction() {
        let client = SpeechClient::new(RecognitionConfig::simulated()).unwrap();
        assert!(client.config().force_simulated);
    }

    #[test]
    fn test_session_minting_is_idle() {
        let client = SpeechClient::new(RecognitionConfig::simulated()).unwrap();
        let session = client.create_realtime_session(TranscriptionOptions::default());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
