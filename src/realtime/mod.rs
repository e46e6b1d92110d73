//! Real-time (streaming) recognition sessions.
//!
//! A session is one streaming conversation with the gateway: connect, send
//! a start directive, stream audio frames, receive timestamped events, send
//! a stop directive, close. One session object serves exactly one logical
//! session; re-opening requires a new object.
//!
//! Two implementations stand behind the [`RealTimeSession`] trait, selected
//! once at construction time:
//!
//! - [`GatewaySession`] — real WebSocket conversation with the gateway
//! - [`SimulatedSession`] — offline substitute with zero network dependency
//!
//! Exactly two event channels are exposed: data events ([`RealTimeEvent`])
//! and errors. A single active subscriber per channel is sufficient.

mod gateway;
pub mod messages;
mod simulator;

pub use gateway::GatewaySession;
pub use simulator::SimulatedSession;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};
use crate::types::{RealTimeEvent, SessionState, TranscriptionOptions};

/// Async callback invoked for each session event.
pub type EventCallback =
    Arc<dyn Fn(RealTimeEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Async callback invoked for transport/protocol errors.
pub type ErrorCallback =
    Arc<dyn Fn(TranscribeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// One streaming recognition session, real or simulated.
#[async_trait]
pub trait RealTimeSession: Send {
    /// Open the transport and send the start directive.
    ///
    /// Valid only in the `Idle` state. On failure the session lands in the
    /// terminal `Failed` state and is not retried internally; retry policy,
    /// if any, is the caller's responsibility.
    async fn connect(&mut self) -> TranscribeResult<()>;

    /// Transmit one audio frame.
    ///
    /// Only meaningful in the `Open` state; calling it in any other state
    /// is a no-op, tolerating races between audio capture and teardown.
    async fn send_audio(&mut self, frame: Bytes) -> TranscribeResult<()>;

    /// Send the stop directive and close the transport.
    ///
    /// Idempotent and safe to call from any state, including before
    /// `connect` resolves.
    async fn close(&mut self) -> TranscribeResult<()>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Whether audio frames will currently be transmitted.
    fn is_ready(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Register the data-event subscriber.
    async fn on_event(&mut self, callback: EventCallback) -> TranscribeResult<()>;

    /// Register the error subscriber.
    async fn on_error(&mut self, callback: ErrorCallback) -> TranscribeResult<()>;
}

/// Create a session for the given configuration.
///
/// The simulated variant is chosen when simulation is forced or when no
/// application key is configured; the choice is made here, once, never
/// per-call.
pub fn create_session(
    config: &RecognitionConfig,
    options: TranscriptionOptions,
) -> Box<dyn RealTimeSession> {
    if config.force_simulated || config.app_key.is_empty() {
        info!("Creating simulated streaming session (no gateway backend)");
        Box::new(SimulatedSession::new(options))
    } else {
        Box::new(GatewaySession::new(config.clone(), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_simulator_when_forced() {
        let session = create_session(
            &RecognitionConfig::simulated(),
            TranscriptionOptions::default(),
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_factory_selects_simulator_without_app_key() {
        let config = RecognitionConfig::new("", "id", "secret", "cn-shanghai");
        let session = create_session(&config, TranscriptionOptions::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_ready());
    }
}
