//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets are referenced by env-var name in the config and resolved at
//! runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub pricing: PricingConfig,
    pub notifier: NotifierConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds between check runs.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Alerts processed concurrently within one run.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Deals shown per notification before the "+N more" line.
    #[serde(default = "default_max_deals")]
    pub max_deals_per_notice: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// Base URL of the hotel pricing/scraper service.
    pub base_url: String,
    #[serde(default = "default_pricing_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Endpoint the rendered deal summaries are delivered to.
    pub delivery_url: String,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    /// Env var holding the bearer token for the delivery endpoint, if any.
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite database URL, e.g. "sqlite://stayscout.db".
    pub url: String,
}

fn default_tick_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    2
}

fn default_max_deals() -> usize {
    5
}

fn default_pricing_timeout_secs() -> u64 {
    60
}

fn default_notify_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [scheduler]
        tick_secs = 120
        workers = 4
        max_deals_per_notice = 3

        [pricing]
        base_url = "http://localhost:8000"
        timeout_secs = 45

        [notifier]
        delivery_url = "http://localhost:9000/notify"
        auth_token_env = "STAYSCOUT_DELIVERY_TOKEN"

        [database]
        url = "sqlite://stayscout.db"
    "#;

    const MINIMAL: &str = r#"
        [scheduler]

        [pricing]
        base_url = "http://localhost:8000"

        [notifier]
        delivery_url = "http://localhost:9000/notify"

        [database]
        url = "sqlite://stayscout.db"
    "#;

    #[test]
    fn test_parse_full_config() {
        let cfg: AppConfig = toml::from_str(FULL).unwrap();
        assert_eq!(cfg.scheduler.tick_secs, 120);
        assert_eq!(cfg.scheduler.workers, 4);
        assert_eq!(cfg.scheduler.max_deals_per_notice, 3);
        assert_eq!(cfg.pricing.base_url, "http://localhost:8000");
        assert_eq!(cfg.pricing.timeout_secs, 45);
        assert_eq!(
            cfg.notifier.auth_token_env.as_deref(),
            Some("STAYSCOUT_DELIVERY_TOKEN")
        );
        assert_eq!(cfg.database.url, "sqlite://stayscout.db");
    }

    #[test]
    fn test_defaults_applied() {
        let cfg: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.scheduler.tick_secs, 300);
        assert_eq!(cfg.scheduler.workers, 2);
        assert_eq!(cfg.scheduler.max_deals_per_notice, 5);
        assert_eq!(cfg.pricing.timeout_secs, 60);
        assert_eq!(cfg.notifier.timeout_secs, 30);
        assert!(cfg.notifier.auth_token_env.is_none());
    }

    #[test]
    fn test_missing_section_rejected() {
        let broken = r#"
            [scheduler]
            tick_secs = 60
        "#;
        assert!(toml::from_str::<AppConfig>(broken).is_err());
    }
}
