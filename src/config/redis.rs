//! Redis configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Key of the set holding online users
    #[serde(default = "default_presence_key")]
    pub presence_key: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.presence_key.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_PRESENCE_KEY"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidRedisTimeout);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            presence_key: default_presence_key(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_presence_key() -> String {
    "users".to_string()
}

fn default_timeout() -> u64 {
    5
}
