//! Configuration management for the sync core

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the monitoring API, without trailing slash
    pub api_base_url: String,

    /// HTTP timeout for every API request
    pub http_timeout: Duration,

    /// Number of rows in the recent-activity view
    pub recent_activity_limit: usize,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            http_timeout: Duration::from_secs(10),
            recent_activity_limit: 20,
            user_agent: format!("byteping_sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Config pointing at the given API, everything else default
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(base_url) = env::var("API_BASE_URL") {
            config.api_base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Ok(timeout) = env::var("HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(limit) = env::var("RECENT_ACTIVITY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.recent_activity_limit = limit;
            }
        }

        if let Ok(user_agent) = env::var("USER_AGENT") {
            config.user_agent = user_agent;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_base_url.is_empty() {
            return Err("api_base_url cannot be empty".to_string());
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(format!(
                "api_base_url must be an http(s) URL, got {}",
                self.api_base_url
            ));
        }

        if self.http_timeout.is_zero() {
            return Err("http_timeout must be greater than 0".to_string());
        }

        if self.recent_activity_limit == 0 {
            return Err("recent_activity_limit must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Absolute URL for an API path such as `/api/webservice/all/`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}
