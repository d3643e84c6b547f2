//! Configuration management module

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FLOATING_TAG: &str = "latest";
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Whole-response timeout in seconds
    pub response_timeout: u64,
    pub skip_tls: bool,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 30,
            response_timeout: 45,
            skip_tls: false,
            user_agent: format!("docker-tag-pinner/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout == 0 {
            return Err(RegistryError::Validation(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }
        if self.response_timeout == 0 {
            return Err(RegistryError::Validation(
                "response_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tag resolution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// `n` sent on the first tags/list request
    pub page_size: usize,
    /// Upper bound on concurrent manifest digest lookups
    pub max_concurrent_lookups: usize,
    /// Floating tag used when an image does not name one
    pub floating_tag: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_lookups: 8,
            floating_tag: DEFAULT_FLOATING_TAG.to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(RegistryError::Validation(
                "page_size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(RegistryError::Validation(
                "max_concurrent_lookups must be greater than 0".to_string(),
            ));
        }
        if self.floating_tag.trim().is_empty() {
            return Err(RegistryError::Validation(
                "floating_tag cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub resolver: ResolverConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.resolver.validate()
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("CONNECTION_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.http.connect_timeout = val;
        }
        if let Some(val) = lookup("RESPONSE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.http.response_timeout = val;
        }
        if let Some(val) = lookup("TAG_PINNER_SKIP_TLS") {
            config.http.skip_tls = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(val) = lookup("TAG_PINNER_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config.resolver.max_concurrent_lookups = val;
        }
        if let Some(val) = lookup("TAG_PINNER_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            config.resolver.page_size = val;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.connect_timeout, 30);
        assert_eq!(config.http.response_timeout, 45);
        assert_eq!(config.resolver.page_size, 1000);
        assert_eq!(config.resolver.floating_tag, "latest");
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("CONNECTION_TIMEOUT_SECONDS", "5"),
            ("RESPONSE_TIMEOUT_SECONDS", "not-a-number"),
            ("TAG_PINNER_CONCURRENCY", "2"),
            ("TAG_PINNER_SKIP_TLS", "true"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.http.connect_timeout, 5);
        assert_eq!(config.http.response_timeout, 45);
        assert_eq!(config.resolver.max_concurrent_lookups, 2);
        assert!(config.http.skip_tls);
    }

    #[test]
    fn zero_values_fail_validation() {
        let mut config = AppConfig::default();
        config.resolver.max_concurrent_lookups = 0;
        assert!(matches!(config.validate(), Err(RegistryError::Validation(_))));

        let mut config = AppConfig::default();
        config.http.connect_timeout = 0;
        assert!(config.validate().is_err());
    }
}
