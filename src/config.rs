//! Client configuration.
//!
//! [`RecognitionConfig`] is owned by the client for its lifetime and never
//! mutated after construction. It can be built programmatically or loaded
//! from the environment (a `.env` file is honored via `dotenvy`):
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `ASR_APP_KEY` | Gateway application key |
//! | `ASR_ACCESS_KEY_ID` | Access key id for token exchange / signing |
//! | `ASR_ACCESS_KEY_SECRET` | Access key secret |
//! | `ASR_REGION` | Gateway region, default `cn-shanghai` |
//! | `ASR_GATEWAY_URL` | Override for the HTTP recognition endpoint |
//! | `ASR_GATEWAY_WS_URL` | Override for the streaming WebSocket endpoint |
//! | `ASR_FORCE_SIMULATED` | `true`/`1` to skip the real gateway entirely |

use crate::error::{TranscribeError, TranscribeResult};

/// Default gateway region.
pub const DEFAULT_REGION: &str = "cn-shanghai";

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Gateway application key, presented in requests and stream envelopes.
    pub app_key: String,
    /// Access key id used for token exchange and request signing.
    pub access_key_id: String,
    /// Access key secret used for token exchange and request signing.
    pub access_key_secret: String,
    /// Gateway region, used to derive default endpoints.
    pub region: String,
    /// HTTP endpoint for one-shot recognition and token exchange.
    /// Derived from the region unless overridden.
    pub gateway_url: String,
    /// WebSocket endpoint for streaming recognition.
    /// Derived from the region unless overridden.
    pub gateway_ws_url: String,
    /// Skip the real gateway and serve simulated output only.
    pub force_simulated: bool,
}

impl RecognitionConfig {
    /// Build a configuration with region-derived endpoints.
    pub fn new(
        app_key: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            app_key: app_key.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            gateway_url: default_gateway_url(&region),
            gateway_ws_url: default_gateway_ws_url(&region),
            region,
            force_simulated: false,
        }
    }

    /// A configuration that never touches the network. Used in development
    /// and tests; credentials are blank.
    pub fn simulated() -> Self {
        let mut config = Self::new("", "", "", DEFAULT_REGION);
        config.force_simulated = true;
        config
    }

    /// Load the configuration from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        // Load .env if present; ignore absence
        dotenvy::dotenv().ok();

        let force_simulated = std::env::var("ASR_FORCE_SIMULATED")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let region = std::env::var("ASR_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let app_key = std::env::var("ASR_APP_KEY").unwrap_or_default();
        if app_key.is_empty() && !force_simulated {
            return Err(TranscribeError::Configuration(
                "ASR_APP_KEY is required unless ASR_FORCE_SIMULATED is set".to_string(),
            ));
        }

        let mut config = Self::new(
            app_key,
            std::env::var("ASR_ACCESS_KEY_ID").unwrap_or_default(),
            std::env::var("ASR_ACCESS_KEY_SECRET").unwrap_or_default(),
            region,
        );
        config.force_simulated = force_simulated;

        if let Ok(url) = std::env::var("ASR_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Ok(url) = std::env::var("ASR_GATEWAY_WS_URL") {
            config.gateway_ws_url = url;
        }

        Ok(config)
    }

    /// Whether credentials for the token-exchange and signing strategies
    /// are present.
    pub fn has_access_keys(&self) -> bool {
        !self.access_key_id.is_empty() && !self.access_key_secret.is_empty()
    }
}

fn default_gateway_url(region: &str) -> String {
    format!("https://nls-gateway-{region}.aliyuncs.com/stream/v1")
}

fn default_gateway_ws_url(region: &str) -> String {
    format!("wss://nls-gateway-{region}.aliyuncs.com/ws/v1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_derived_endpoints() {
        let config = RecognitionConfig::new("key", "id", "secret", "cn-beijing");
        assert_eq!(
            config.gateway_url,
            "https://nls-gateway-cn-beijing.aliyuncs.com/stream/v1"
        );
        assert_eq!(
            config.gateway_ws_url,
            "wss://nls-gateway-cn-beijing.aliyuncs.com/ws/v1"
        );
        assert!(!config.force_simulated);
    }

    #[test]
    fn test_simulated_config() {
        let config = RecognitionConfig::simulated();
        assert!(config.force_simulated);
        assert!(config.app_key.is_empty());
        assert!(!config.has_access_keys());
    }

    #[test]
    fn test_has_access_keys() {
        let config = RecognitionConfig::new("key", "id", "secret", DEFAULT_REGION);
        assert!(config.has_access_keys());

        let config = RecognitionConfig::new("key", "", "secret", DEFAULT_REGION);
        assert!(!config.has_access_keys());
    }
}
