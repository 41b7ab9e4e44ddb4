//! Outbound delivery.

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor, address::Envelope,
    transport::smtp::authentication::Credentials,
};
use sentinel_common::SentinelError;
use tracing::debug;

use super::{InboundMail, OutboundMail};
use crate::config::SmtpConfig;

/// Mail delivery primitives used by the gate
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send `message` back to the sender of `inbound`
    async fn reply(&self, inbound: &InboundMail, message: OutboundMail)
    -> Result<(), SentinelError>;

    /// Send `message` using its own envelope
    async fn send(&self, message: OutboundMail) -> Result<(), SentinelError>;
}

/// SMTP submission through a smarthost
pub struct SmtpRelay {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    pub fn new(config: &SmtpConfig) -> Result<Self, SentinelError> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| SentinelError::Config(format!("invalid SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            smtp: builder.build(),
        })
    }

    /// Check that the smarthost accepts connections
    pub async fn test_connection(&self) -> Result<bool, SentinelError> {
        self.smtp
            .test_connection()
            .await
            .map_err(|e| SentinelError::Transport(e.to_string()))
    }
}

fn parse_address(address: &str) -> Result<Address, SentinelError> {
    address
        .parse::<Address>()
        .map_err(|e| SentinelError::Transport(format!("invalid address {address:?}: {e}")))
}

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn reply(
        &self,
        inbound: &InboundMail,
        mut message: OutboundMail,
    ) -> Result<(), SentinelError> {
        message.envelope_to = inbound.envelope_from.clone();
        self.send(message).await
    }

    async fn send(&self, message: OutboundMail) -> Result<(), SentinelError> {
        let envelope = Envelope::new(
            Some(parse_address(&message.envelope_from)?),
            vec![parse_address(&message.envelope_to)?],
        )
        .map_err(|e| SentinelError::Transport(e.to_string()))?;

        let response = self
            .smtp
            .send_raw(&envelope, &message.raw)
            .await
            .map_err(|e| SentinelError::Transport(e.to_string()))?;

        debug!(
            from = %message.envelope_from,
            to = %message.envelope_to,
            bytes = message.raw.len(),
            code = %response.code(),
            "Message submitted"
        );

        Ok(())
    }
}

/// What a [`RecordingTransport`] was asked to do
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Reply { to: String, message: OutboundMail },
    Send(OutboundMail),
}

/// In-memory transport for tests
#[cfg(test)]
#[derive(Default)]
pub struct RecordingTransport {
    deliveries: std::sync::Mutex<Vec<Delivery>>,
    fail_sends: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Make every subsequent `send` fail
    pub fn fail_sends(&self) {
        self.fail_sends
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }
}

#[cfg(test)]
#[async_trait]
impl MailTransport for RecordingTransport {
    async fn reply(
        &self,
        inbound: &InboundMail,
        message: OutboundMail,
    ) -> Result<(), SentinelError> {
        self.record(Delivery::Reply {
            to: inbound.envelope_from.clone(),
            message,
        });
        Ok(())
    }

    async fn send(&self, message: OutboundMail) -> Result<(), SentinelError> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SentinelError::Transport("connection refused".to_string()));
        }
        self.record(Delivery::Send(message));
        Ok(())
    }
}
