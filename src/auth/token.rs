//! Token-exchange authentication strategy.
//!
//! Exchanges the access key pair for a short-lived bearer token at the
//! gateway's token endpoint, then presents it in both an `Authorization`
//! header and the gateway-specific `X-NLS-Token` header. The exchange is
//! retried at most once before the strategy fails.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AuthStrategy, RequestAuth, StrategyKind};
use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};

/// Refresh the token this long before its reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Gateway token with expiration tracking.
#[derive(Debug, Clone)]
pub struct GatewayToken {
    /// The bearer token string.
    pub token: String,
    /// When the token expires.
    expires_at: Instant,
}

impl GatewayToken {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now() + TOKEN_EXPIRY_MARGIN
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Exchange access keys for a gateway token. One attempt, no retry; the
/// strategy layers its single retry on top. Also used by the streaming
/// session to authenticate its WebSocket URL.
pub async fn fetch_gateway_token(
    config: &RecognitionConfig,
    http: &reqwest::Client,
) -> TranscribeResult<GatewayToken> {
    let url = format!("{}/token", config.gateway_url);

    let response = http
        .post(&url)
        .json(&serde_json::json!({
            "access_key_id": config.access_key_id,
            "access_key_secret": config.access_key_secret,
        }))
        .send()
        .await
        .map_err(|e| TranscribeError::auth("token_based", format!("token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(TranscribeError::auth(
            "token_based",
            format!("token exchange rejected ({status}): {body}"),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| TranscribeError::auth("token_based", format!("invalid token response: {e}")))?;

    Ok(GatewayToken {
        token: token.token,
        expires_at: Instant::now() + Duration::from_secs(token.expires_in),
    })
}

/// Token-exchange strategy with a cached token.
pub struct TokenBasedStrategy {
    cached: RwLock<Option<GatewayToken>>,
}

impl TokenBasedStrategy {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
        }
    }
}

impl Default for TokenBasedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for TokenBasedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TokenBased
    }

    async fn prepare(
        &self,
        config: &RecognitionConfig,
        http: &reqwest::Client,
    ) -> TranscribeResult<RequestAuth> {
        // Reuse a cached token while it is fresh
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    debug!("Reusing cached gateway token");
                    return Ok(token_auth(&token.token));
                }
            }
        }

        // Exchange, retrying exactly once
        let token = match fetch_gateway_token(config, http).await {
            Ok(token) => token,
            Err(first) => {
                warn!("Token exchange failed, retrying once: {first}");
                fetch_gateway_token(config, http).await?
            }
        };

        let auth = token_auth(&token.token);
        {
            let mut cached = self.cached.write().await;
            *cached = Some(token);
        }

        Ok(auth)
    }
}

fn token_auth(token: &str) -> RequestAuth {
    RequestAuth::headers(vec![
        ("Authorization", format!("Bearer {token}")),
        ("X-NLS-Token", token.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_auth_headers() {
        let auth = token_auth("abc123");
        assert_eq!(auth.headers.len(), 2);
        assert_eq!(auth.headers[0], ("Authorization", "Bearer abc123".into()));
        assert_eq!(auth.headers[1], ("X-NLS-Token", "abc123".into()));
        assert!(auth.payload_fields.is_empty());
    }

    #[test]
    fn test_token_expiry_margin() {
        let fresh = GatewayToken {
            token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(!fresh.is_expired());

        let nearly_expired = GatewayToken {
            token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(nearly_expired.is_expired());
    }
}
