//! Application state and shared resources.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::challenge::VerificationGate;
use crate::config::AppConfig;
use crate::mail::{MailTransport, SmtpRelay};
use crate::store::{KvStore, RedisStore};
use crate::telemetry::{EventSink, TracingSink};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Challenge records
    pub challenges: Arc<dyn KvStore>,

    /// Verified senders
    pub whitelist: Arc<dyn KvStore>,

    /// Challenge issuance and verification
    pub gate: Arc<VerificationGate>,
}

impl AppState {
    /// Create application state, connecting to Redis and configuring SMTP
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        // Connect to Redis with connection manager (handles reconnection)
        let client = redis::Client::open(config.redis_url.as_str())
            .context("Failed to create Redis client")?;

        let redis = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        let challenges: Arc<dyn KvStore> = Arc::new(RedisStore::new(
            redis.clone(),
            config.challenge.challenge_namespace.clone(),
        ));
        let whitelist: Arc<dyn KvStore> = Arc::new(RedisStore::new(
            redis,
            config.challenge.whitelist_namespace.clone(),
        ));

        let relay = SmtpRelay::new(&config.smtp).context("Failed to configure SMTP")?;
        match relay.test_connection().await {
            Ok(true) => tracing::debug!(host = %config.smtp.host, "SMTP relay reachable"),
            Ok(false) | Err(_) => {
                tracing::warn!(host = %config.smtp.host, "SMTP relay not reachable yet")
            }
        }

        Ok(Self::from_parts(
            config,
            challenges,
            whitelist,
            Arc::new(relay),
            Arc::new(TracingSink),
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: &AppConfig,
        challenges: Arc<dyn KvStore>,
        whitelist: Arc<dyn KvStore>,
        transport: Arc<dyn MailTransport>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let gate = Arc::new(VerificationGate::new(
            config.gate_settings(),
            challenges.clone(),
            whitelist.clone(),
            transport,
            events,
        ));

        Self {
            challenges,
            whitelist,
            gate,
        }
    }
}
