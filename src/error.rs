//! Error taxonomy for the speech-recognition client.
//!
//! The classes map directly onto how each failure propagates:
//!
//! - [`TranscribeError::Auth`] and [`TranscribeError::Transport`] during file
//!   recognition are caught by the orchestrator, logged, and advance the
//!   fallback chain; the caller never observes them.
//! - [`TranscribeError::Input`] always propagates immediately, before any
//!   strategy attempt, since it indicates a caller bug rather than a
//!   transient backend condition.
//! - A malformed gateway response is treated as an empty result set by the
//!   parser, not raised; [`TranscribeError::Parse`] exists for streaming
//!   protocol violations surfaced on the error channel.

use thiserror::Error;

/// Errors produced by the speech-recognition client.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// A strategy could not authenticate or the gateway rejected credentials.
    #[error("Authentication failed ({strategy}): {cause}")]
    Auth {
        /// Name of the strategy that failed.
        strategy: &'static str,
        /// Underlying cause.
        cause: String,
    },

    /// Network/connection error, including timeouts.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Gateway sent a frame that does not match any known shape.
    #[error("Protocol parse failure: {0}")]
    Parse(String),

    /// Audio source unreadable. The only class that propagates out of
    /// file recognition.
    #[error("Audio input unreadable: {0}")]
    Input(String),

    /// Client misconfiguration (missing credentials, invalid endpoint).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation invalid for the current session state.
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl TranscribeError {
    /// Build an auth failure for a named strategy.
    pub fn auth(strategy: &'static str, cause: impl Into<String>) -> Self {
        Self::Auth {
            strategy,
            cause: cause.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type TranscribeResult<T> = Result<T, TranscribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display_includes_strategy() {
        let err = TranscribeError::auth("token_based", "exchange rejected");
        let msg = err.to_string();
        assert!(msg.contains("token_based"));
        assert!(msg.contains("exchange rejected"));
    }

    #[test]
    fn test_input_error_display() {
        let err = TranscribeError::Input("no such file".into());
        assert!(err.to_string().contains("no such file"));
    }
}
