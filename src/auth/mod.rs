//! Authentication strategies for one-shot recognition requests.
//!
//! Each strategy produces the transport-level request augmentation (headers
//! and/or payload fields) needed to authenticate a single recognition
//! attempt; it never performs the recognition request itself. Strategies are
//! tried by the file orchestrator in fixed priority order:
//!
//! 1. `token_based` — exchange access keys for a short-lived bearer token
//! 2. `appkey_direct` — present the raw application key as the gateway token
//! 3. `custom_auth` — HMAC-SHA256 signature over appkey + timestamp + nonce
//!
//! Strategies fail with [`TranscribeError::Auth`]; transport errors raised
//! while the recognition request is in flight are the orchestrator's
//! concern, not caught here.

mod appkey;
mod signature;
mod token;

pub use appkey::AppKeyDirectStrategy;
pub use signature::CustomAuthStrategy;
pub use token::{TokenBasedStrategy, fetch_gateway_token};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RecognitionConfig;
use crate::error::TranscribeResult;

/// Identifies an authentication strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Token exchange followed by bearer presentation.
    TokenBased,
    /// Raw application key presented as the gateway token.
    AppKeyDirect,
    /// HMAC-SHA256 request signature.
    CustomAuth,
}

impl StrategyKind {
    /// Stable name used in logs and error reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenBased => "token_based",
            Self::AppKeyDirect => "appkey_direct",
            Self::CustomAuth => "custom_auth",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request augmentation produced by a strategy for one attempt.
#[derive(Debug, Default, Clone)]
pub struct RequestAuth {
    /// Headers to attach to the recognition request.
    pub headers: Vec<(&'static str, String)>,
    /// Extra JSON fields to merge into the request payload.
    pub payload_fields: Vec<(&'static str, Value)>,
}

impl RequestAuth {
    /// Augmentation carrying only headers.
    pub fn headers(headers: Vec<(&'static str, String)>) -> Self {
        Self {
            headers,
            payload_fields: Vec::new(),
        }
    }
}

/// One named way of authenticating a recognition request.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Produce the request augmentation for one attempt.
    ///
    /// Fails with [`crate::error::TranscribeError::Auth`] when credentials
    /// cannot be turned into usable request data.
    async fn prepare(
        &self,
        config: &RecognitionConfig,
        http: &reqwest::Client,
    ) -> TranscribeResult<RequestAuth>;
}

/// Build the strategy chain in fixed priority order, skipping strategies
/// whose credentials are absent from the configuration.
pub fn default_chain(config: &RecognitionConfig) -> Vec<Box<dyn AuthStrategy>> {
    let mut chain: Vec<Box<dyn AuthStrategy>> = Vec::with_capacity(3);
    if config.has_access_keys() {
        chain.push(Box::new(TokenBasedStrategy::new()));
    }
    if !config.app_key.is_empty() {
        chain.push(Box::new(AppKeyDirectStrategy));
    }
    if config.has_access_keys() && !config.app_key.is_empty() {
        chain.push(Box::new(CustomAuthStrategy));
    }
    chain
}
