//! Configuration management for the gate.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

use sentinel_common::constants::{
    CHALLENGE_TTL_SECS, CLAIM_TTL_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_REDIS_URL,
    DEFAULT_SYSTEM_NAME, store_keys,
};

use crate::challenge::GateSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Address the gate sends from
    #[serde(default)]
    pub relay_address: String,

    /// Protected mailbox that receives verified mail
    #[serde(default)]
    pub target_address: String,

    /// Public base URL of the verification endpoint
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Host used on the right-hand side of generated Message-IDs
    #[serde(default = "default_routing_host")]
    pub routing_host: String,

    /// Display name on challenge and confirmation emails
    #[serde(default = "default_system_name")]
    pub system_name: String,

    /// Challenge configuration
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,
}

/// Challenge-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    /// Challenge record retention in seconds
    #[serde(default = "default_challenge_ttl")]
    pub ttl_secs: u64,

    /// Verification claim lifetime in seconds
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_secs: u64,

    /// Redis key namespace for challenge records
    #[serde(default = "default_challenge_namespace")]
    pub challenge_namespace: String,

    /// Redis key namespace for whitelisted senders
    #[serde(default = "default_whitelist_namespace")]
    pub whitelist_namespace: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_challenge_ttl(),
            claim_ttl_secs: default_claim_ttl(),
            challenge_namespace: default_challenge_namespace(),
            whitelist_namespace: default_whitelist_namespace(),
        }
    }
}

/// Smarthost used for outbound mail
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            starttls: false,
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_public_url() -> String { format!("http://{}", DEFAULT_LISTEN_ADDR) }
fn default_routing_host() -> String { "localhost".to_string() }
fn default_system_name() -> String { DEFAULT_SYSTEM_NAME.to_string() }
fn default_challenge_ttl() -> u64 { CHALLENGE_TTL_SECS } // 24 hours
fn default_claim_ttl() -> u64 { CLAIM_TTL_SECS } // 5 minutes
fn default_challenge_namespace() -> String { store_keys::CHALLENGE_NAMESPACE.to_string() }
fn default_whitelist_namespace() -> String { store_keys::WHITELIST_NAMESPACE.to_string() }
fn default_smtp_host() -> String { "127.0.0.1".to_string() }
fn default_smtp_port() -> u16 { 25 }

impl AppConfig {
    /// Load configuration from file and `SENTINEL_*` environment, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!("Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load config")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref relay) = args.relay_address {
            config.relay_address = relay.clone();
        }
        if let Some(ref target) = args.target_address {
            config.target_address = target.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gate cannot run with
    pub fn validate(&self) -> Result<()> {
        for (name, address) in [
            ("relay_address", &self.relay_address),
            ("target_address", &self.target_address),
        ] {
            if !address.contains('@') {
                bail!("{name} must be an email address, got {address:?}");
            }
        }
        if self.relay_address.eq_ignore_ascii_case(&self.target_address) {
            bail!("relay_address and target_address must differ");
        }
        if self.challenge.ttl_secs == 0 {
            bail!("challenge.ttl_secs must be positive");
        }
        Ok(())
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            relay_address: self.relay_address.clone(),
            target_address: self.target_address.clone(),
            public_url: self.public_url.clone(),
            routing_host: self.routing_host.clone(),
            system_name: self.system_name.clone(),
            challenge_ttl_secs: self.challenge.ttl_secs,
            claim_ttl_secs: self.challenge.claim_ttl_secs,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            relay_address: String::new(),
            target_address: String::new(),
            public_url: default_public_url(),
            routing_host: default_routing_host(),
            system_name: default_system_name(),
            challenge: ChallengeConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        AppConfig {
            relay_address: "relay@sentinel.example".to_string(),
            target_address: "owner@example.org".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.challenge.ttl_secs, 86_400);
        assert_eq!(config.challenge.claim_ttl_secs, 300);
        assert_eq!(config.smtp.port, 25);
        assert_eq!(config.system_name, "Email Protection System");
    }

    #[test]
    fn test_validate_requires_addresses() {
        assert!(AppConfig::default().validate().is_err());
        assert!(configured().validate().is_ok());

        let same = AppConfig {
            target_address: "RELAY@sentinel.example".to_string(),
            ..configured()
        };
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                relay_address = "relay@sentinel.example"
                target_address = "owner@example.org"
                public_url = "https://gate.sentinel.example"

                [challenge]
                claim_ttl_secs = 60

                [smtp]
                host = "smtp.example.org"
                port = 587
                starttls = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.challenge.claim_ttl_secs, 60);
        assert_eq!(config.challenge.ttl_secs, 86_400);
        assert_eq!(config.smtp.port, 587);
        assert!(config.smtp.starttls);
        assert_eq!(config.gate_settings().public_url, "https://gate.sentinel.example");
    }
}
