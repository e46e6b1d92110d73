//! Async client for a cloud speech-recognition gateway.
//!
//! Two recognition surfaces:
//!
//! - **One-shot** ([`SpeechClient::recognize_from_file`]): walks an ordered
//!   chain of authentication strategies (token exchange, direct app key,
//!   request signing) and returns the first non-empty result set; if every
//!   strategy fails, silently serves offline simulated output so callers
//!   never see a recognition failure.
//! - **Streaming** ([`SpeechClient::create_realtime_session`]): one
//!   WebSocket conversation per session object with an explicit
//!   `idle -> connecting -> open -> closing -> closed` lifecycle, or the
//!   offline simulated equivalent when no gateway is reachable.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod parser;
pub mod realtime;
pub mod simulator;
pub mod types;

// Re-export commonly used items for convenience
pub use client::SpeechClient;
pub use config::RecognitionConfig;
pub use error::{TranscribeError, TranscribeResult};
pub use file::FileRecognizer;
pub use realtime::{
    ErrorCallback, EventCallback, GatewaySession, RealTimeSession, SimulatedSession,
};
pub use types::{
    RealTimeEvent, SessionState, TranscriptionOptions, TranscriptionResult, WordTiming,
};
