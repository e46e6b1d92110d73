//! Custom-signature authentication strategy.
//!
//! Computes an HMAC-SHA256 signature over `appkey || timestamp || nonce`
//! using the access-key secret, and presents access-key id, timestamp,
//! nonce and signature as request headers. Used by gateway deployments that
//! sit behind a signing proxy instead of the token service.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::{AuthStrategy, RequestAuth, StrategyKind};
use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `appkey || timestamp || nonce`, hex-encoded.
pub fn compute_signature(
    app_key: &str,
    timestamp: u64,
    nonce: &str,
    secret: &str,
) -> TranscribeResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        TranscribeError::auth("custom_auth", format!("invalid signing key: {e}"))
    })?;
    mac.update(app_key.as_bytes());
    mac.update(timestamp.to_string().as_bytes());
    mac.update(nonce.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Strategy signing each request with the access-key secret.
pub struct CustomAuthStrategy;

#[async_trait]
impl AuthStrategy for CustomAuthStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CustomAuth
    }

    async fn prepare(
        &self,
        config: &RecognitionConfig,
        _http: &reqwest::Client,
    ) -> TranscribeResult<RequestAuth> {
        if config.access_key_secret.is_empty() {
            return Err(TranscribeError::auth(
                "custom_auth",
                "access key secret is empty",
            ));
        }

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| TranscribeError::auth("custom_auth", format!("clock error: {e}")))?
            .as_secs();
        let nonce = Uuid::new_v4().to_string();
        let signature = compute_signature(
            &config.app_key,
            timestamp,
            &nonce,
            &config.access_key_secret,
        )?;

        Ok(RequestAuth::headers(vec![
            ("X-Access-Key-Id", config.access_key_id.clone()),
            ("X-Timestamp", timestamp.to_string()),
            ("X-Nonce", nonce),
            ("X-Signature", signature),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_deterministic() {
        let a = compute_signature("app", 1700000000, "nonce-1", "secret").unwrap();
        let b = compute_signature("app", 1700000000, "nonce-1", "secret").unwrap();
        assert_eq!(a, b);
        // 32-byte digest, hex-encoded
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_varies_with_inputs() {
        let base = compute_signature("app", 1700000000, "nonce-1", "secret").unwrap();
        assert_ne!(
            base,
            compute_signature("app", 1700000001, "nonce-1", "secret").unwrap()
        );
        assert_ne!(
            base,
            compute_signature("app", 1700000000, "nonce-2", "secret").unwrap()
        );
        assert_ne!(
            base,
            compute_signature("app", 1700000000, "nonce-1", "other").unwrap()
        );
    }

    #[tokio::test]
    async fn test_prepare_emits_all_headers() {
        let config = RecognitionConfig::new("app", "id", "secret", "cn-shanghai");
        let http = reqwest::Client::new();
        let auth = CustomAuthStrategy.prepare(&config, &http).await.unwrap();

        let names: Vec<_> = auth.headers.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["X-Access-Key-Id", "X-Timestamp", "X-Nonce", "X-Signature"]
        );
    }
}
