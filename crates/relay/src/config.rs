//! Configuration loading for the relay
//!
//! Supports loading relay settings from (in order of priority):
//! 1. JSON file (~/.config/tempmail-relay/relay.json)
//! 2. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Settings filename in the relay config directory
const CONFIG_FILE: &str = "relay.json";

pub const DEFAULT_DAILY_LIMIT: u32 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Catch-all mailbox connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

fn default_imap_port() -> u16 {
    993
}

/// Chat notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// Top-level relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Domain whose catch-all mailbox this relay owns
    pub domain: String,
    /// Aliases each account may create per calendar day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    pub mailbox: Option<MailboxConfig>,
    pub telegram: Option<TelegramConfig>,
}

fn default_daily_limit() -> u32 {
    DEFAULT_DAILY_LIMIT
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl RelayConfig {
    /// Load configuration using the following priority:
    /// 1. JSON file (~/.config/tempmail-relay/relay.json)
    /// 2. Runtime environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            return config::load_json(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse relay config JSON")
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let domain =
            std::env::var("RELAY_DOMAIN").context("RELAY_DOMAIN environment variable not set")?;
        let daily_limit = match std::env::var("RELAY_DAILY_LIMIT") {
            Ok(v) => v.parse().context("RELAY_DAILY_LIMIT is not a number")?,
            Err(_) => DEFAULT_DAILY_LIMIT,
        };
        let poll_interval_secs = match std::env::var("RELAY_POLL_INTERVAL_SECS") {
            Ok(v) => v
                .parse()
                .context("RELAY_POLL_INTERVAL_SECS is not a number")?,
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };

        let mailbox = match (
            std::env::var("RELAY_IMAP_HOST"),
            std::env::var("RELAY_IMAP_USER"),
            std::env::var("RELAY_IMAP_PASSWORD"),
        ) {
            (Ok(host), Ok(username), Ok(password)) => Some(MailboxConfig {
                host,
                port: match std::env::var("RELAY_IMAP_PORT") {
                    Ok(v) => v.parse().context("RELAY_IMAP_PORT is not a number")?,
                    Err(_) => default_imap_port(),
                },
                username,
                password,
            }),
            _ => None,
        };

        let telegram = std::env::var("RELAY_BOT_TOKEN")
            .ok()
            .map(|bot_token| TelegramConfig { bot_token });

        Ok(Self {
            domain,
            daily_limit,
            poll_interval_secs,
            mailbox,
            telegram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "domain": "example.com",
            "daily_limit": 10,
            "poll_interval_secs": 30,
            "mailbox": {
                "host": "imap.example.com",
                "username": "catchall@example.com",
                "password": "hunter2"
            },
            "telegram": { "bot_token": "123:abc" }
        }"#;

        let cfg = RelayConfig::from_json(json).unwrap();
        assert_eq!(cfg.domain, "example.com");
        assert_eq!(cfg.daily_limit, 10);
        assert_eq!(cfg.poll_interval_secs, 30);
        let mailbox = cfg.mailbox.unwrap();
        assert_eq!(mailbox.port, 993);
        assert_eq!(cfg.telegram.unwrap().bot_token, "123:abc");
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = RelayConfig::from_json(r#"{ "domain": "example.com" }"#).unwrap();
        assert_eq!(cfg.daily_limit, DEFAULT_DAILY_LIMIT);
        assert_eq!(cfg.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(cfg.mailbox.is_none());
        assert!(cfg.telegram.is_none());
    }

    #[test]
    fn test_missing_domain_rejected() {
        assert!(RelayConfig::from_json(r#"{ "daily_limit": 5 }"#).is_err());
    }
}
