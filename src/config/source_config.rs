use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Connection settings for the product-extraction service that feeds the
/// analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub api: ApiSection,
    #[serde(default)]
    pub request: RequestConfig,
    pub market: MarketConfig,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    pub name: String,
    pub endpoint: String,
    // Name of the environment variable holding the key
    pub env_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub timeout_seconds: u64,
    pub max_concurrent_requests: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            max_concurrent_requests: 3,
            max_retries: 2,
            retry_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub target_url: String,
    #[serde(default)]
    pub comparable_urls: Vec<String>,
}

impl SourceConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source config file: {}", path))?;

        let mut config: SourceConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse source config file: {}", path))?;

        config.load_credentials()?;

        Ok(config)
    }

    pub fn load_credentials(&mut self) -> Result<()> {
        let api_key_var = self.api.env_api_key.as_deref().unwrap_or("EXTRACTION_API_KEY");

        self.api_key = env::var(api_key_var)
            .with_context(|| format!("Missing environment variable: {}", api_key_var))?
            .into();

        Ok(())
    }

    pub fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API key not loaded"))
    }

    /// Upstream rate limits allow between one and five requests in flight.
    pub fn concurrency(&self) -> usize {
        self.request.max_concurrent_requests.clamp(1, 5)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request.timeout_seconds.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.request.retry_delay_ms)
    }
}
