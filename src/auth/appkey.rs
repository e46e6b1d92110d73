//! Direct application-key authentication strategy.
//!
//! Presents the raw application key as the gateway token, with no exchange
//! step. Cheaper than `token_based` but only honored by gateway deployments
//! that allow direct key auth.

use async_trait::async_trait;

use super::{AuthStrategy, RequestAuth, StrategyKind};
use crate::config::RecognitionConfig;
use crate::error::{TranscribeError, TranscribeResult};

/// Strategy presenting the application key directly.
pub struct AppKeyDirectStrategy;

#[async_trait]
impl AuthStrategy for AppKeyDirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AppKeyDirect
    }

    async fn prepare(
        &self,
        config: &RecognitionConfig,
        _http: &reqwest::Client,
    ) -> TranscribeResult<RequestAuth> {
        if config.app_key.is_empty() {
            return Err(TranscribeError::auth(
                "appkey_direct",
                "application key is empty",
            ));
        }
        Ok(RequestAuth::headers(vec![(
            "X-NLS-Token",
            config.app_key.clone(),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_appkey_header() {
        let config = RecognitionConfig::new("my-app-key", "", "", "cn-shanghai");
        let http = reqwest::Client::new();
        let auth = AppKeyDirectStrategy.prepare(&config, &http).await.unwrap();
        assert_eq!(auth.headers, vec![("X-NLS-Token", "my-app-key".into())]);
    }

    #[tokio::test]
    async fn test_empty_appkey_fails() {
        let config = RecognitionConfig::new("", "", "", "cn-shanghai");
        let http = reqwest::Client::new();
        let err = AppKeyDirectStrategy
            .prepare(&config, &http)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranscribeError::Auth {
                strategy: "appkey_direct",
                ..
            }
        ));
    }
}
