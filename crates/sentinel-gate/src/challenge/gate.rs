//! The verification gate.
//!
//! ```text
//! Unverified --inbound--> Challenged --right answer--> Verified
//!                             |  ^
//!                wrong answer |  | retry
//!                             v  |
//!                           Rejected          (TTL elapses) --> Expired
//! ```
//!
//! Successful verification runs strictly in order: whitelist the sender,
//! forward the reconstructed original, confirm to the sender, delete the
//! record. The sender is trusted even if a later step fails.

use std::sync::Arc;

use sentinel_common::{
    ChallengeRecord, SentinelError, VerificationState,
    constants::{WHITELIST_MARKER, store_keys},
};
use tracing::{info, warn};

use super::{ChallengeGenerator, generate_token};
use crate::mail::{
    Forwarder, InboundMail, Mailbox, OutboundMail, ParsedMessage, parse_message,
    templates::{ChallengeEmail, ConfirmationEmail},
};
use crate::store::KvStore;
use crate::telemetry::{EventSink, GateEvent};

/// Gate identity and timing
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Address challenges and forwards are sent from
    pub relay_address: String,
    /// The protected mailbox
    pub target_address: String,
    /// Base URL of the verification endpoint
    pub public_url: String,
    /// Right-hand side of generated Message-IDs
    pub routing_host: String,
    /// Display name on challenge and confirmation emails
    pub system_name: String,
    pub challenge_ttl_secs: u64,
    pub claim_ttl_secs: u64,
}

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Forwarded,
    Challenged { token: String },
    /// Null or malformed envelope sender, nobody to challenge
    Skipped,
}

/// A completed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub sender: Mailbox,
}

fn challenge_key(token: &str) -> String {
    format!("{}{}", store_keys::CHALLENGE_PREFIX, token)
}

fn claim_key(token: &str) -> String {
    format!("{}{}", store_keys::CLAIM_PREFIX, token)
}

/// Whitelist entries are keyed by the lowercased `From` address
fn whitelist_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Identity a message is whitelisted under: its `From` address, or the
/// envelope sender when the message has none
fn sender_identity(inbound: &InboundMail) -> String {
    parse_message(&inbound.raw)
        .and_then(|parsed| parsed.sender().map(|sender| whitelist_key(&sender.email)))
        .unwrap_or_else(|| whitelist_key(&inbound.envelope_from))
}

/// Issues and verifies sender challenges
pub struct VerificationGate {
    settings: GateSettings,
    challenges: Arc<dyn KvStore>,
    whitelist: Arc<dyn KvStore>,
    transport: Arc<dyn crate::mail::MailTransport>,
    events: Arc<dyn EventSink>,
    generator: ChallengeGenerator,
    forwarder: Forwarder,
}

impl VerificationGate {
    pub fn new(
        settings: GateSettings,
        challenges: Arc<dyn KvStore>,
        whitelist: Arc<dyn KvStore>,
        transport: Arc<dyn crate::mail::MailTransport>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let forwarder = Forwarder::new(
            settings.relay_address.clone(),
            settings.target_address.clone(),
            settings.routing_host.clone(),
        );
        Self {
            settings,
            challenges,
            whitelist,
            transport,
            events,
            generator: ChallengeGenerator::new(),
            forwarder,
        }
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Handle a newly received message
    pub async fn on_inbound(&self, inbound: &InboundMail) -> Result<InboundOutcome, SentinelError> {
        let identity = sender_identity(inbound);

        if !identity.is_empty() && self.whitelist.get(&identity).await?.is_some() {
            self.transport
                .send(self.forwarder.verbatim(&inbound.raw, &self.settings.target_address))
                .await?;
            self.events.emit(GateEvent::WhitelistedForwarded {
                sender: identity,
                message_id: inbound.message_id.clone(),
            });
            return Ok(InboundOutcome::Forwarded);
        }

        // Bounces and DSNs arrive with MAIL FROM:<>
        let sender = inbound.envelope_from.as_str();
        if !sender.contains('@') {
            info!(
                envelope_from = %sender,
                message_id = ?inbound.message_id,
                "No return path, not challenging"
            );
            return Ok(InboundOutcome::Skipped);
        }

        let challenge = self.generator.generate();
        let token = generate_token();

        let record = ChallengeRecord::new(token.clone(), inbound.raw.clone(), challenge.answer.clone());
        let value = serde_json::to_string(&record)
            .map_err(|e| SentinelError::Internal(format!("failed to encode record: {e}")))?;
        self.challenges
            .put(
                &challenge_key(&token),
                &value,
                Some(self.settings.challenge_ttl_secs),
            )
            .await?;

        let email = ChallengeEmail {
            system_name: &self.settings.system_name,
            relay_address: &self.settings.relay_address,
            sender,
            in_reply_to: inbound.message_id.as_deref(),
            challenge: &challenge,
            token: &token,
            public_url: &self.settings.public_url,
        }
        .render()?;
        self.transport
            .reply(
                inbound,
                OutboundMail::new(self.settings.relay_address.as_str(), sender, email),
            )
            .await?;

        self.events.emit(GateEvent::ChallengeIssued {
            sender: sender.to_string(),
            token: token.clone(),
            question: challenge.question,
            message_id: inbound.message_id.clone(),
        });

        Ok(InboundOutcome::Challenged { token })
    }

    /// Check an answer presented through a verification link
    pub async fn verify(
        &self,
        token: Option<&str>,
        answer: Option<&str>,
    ) -> Result<Verified, SentinelError> {
        let token = token.filter(|t| !t.is_empty());
        let answer = answer.filter(|a| !a.is_empty());
        let (Some(token), Some(answer)) = (token, answer) else {
            self.failed(token, "invalid_parameters", VerificationState::Unverified);
            return Err(SentinelError::InvalidRequest);
        };

        let Some(stored) = self.challenges.get(&challenge_key(token)).await? else {
            self.failed(Some(token), "challenge_not_found", VerificationState::Expired);
            return Err(SentinelError::ChallengeNotFound);
        };

        let record = match ChallengeRecord::from_stored(token, &stored) {
            Ok(record) => record,
            Err(reason) => {
                warn!(%token, %reason, "Discarding corrupt challenge record");
                self.failed(Some(token), "corrupt_record", VerificationState::Expired);
                return Err(SentinelError::ChallengeNotFound);
            }
        };

        if !record.matches(answer) {
            self.failed(Some(token), "incorrect_answer", VerificationState::Rejected);
            return Err(SentinelError::IncorrectAnswer);
        }

        let Some((original, sender)) = parse_message(&record.raw_email).and_then(|parsed| {
            let sender = parsed.sender()?.clone();
            Some((parsed, sender))
        }) else {
            self.failed(Some(token), "unparseable_sender", VerificationState::Challenged);
            return Err(SentinelError::UnparseableSender);
        };

        let claim = claim_key(token);
        if !self
            .challenges
            .put_if_absent(&claim, "1", self.settings.claim_ttl_secs)
            .await?
        {
            self.events.emit(GateEvent::ClaimContended {
                token: token.to_string(),
            });
            return Err(SentinelError::ChallengeNotFound);
        }

        // The claim is left to expire on success so late claimants still lose
        if let Err(err) = self.complete(token, &record, &original, &sender).await {
            if let Err(release) = self.challenges.delete(&claim).await {
                warn!(%token, error = %release, "Failed to release verification claim");
            }
            return Err(err);
        }

        Ok(Verified { sender })
    }

    async fn complete(
        &self,
        token: &str,
        record: &ChallengeRecord,
        original: &ParsedMessage,
        sender: &Mailbox,
    ) -> Result<(), SentinelError> {
        self.whitelist
            .put(&whitelist_key(&sender.email), WHITELIST_MARKER, None)
            .await?;

        self.events.emit(GateEvent::VerificationSucceeded {
            token: token.to_string(),
            sender: sender.email.clone(),
            age_ms: record.age_millis(),
        });

        let forward = self.forwarder.rewrite_outbound(original, sender)?;
        self.transport.send(forward).await?;

        let confirmation = ConfirmationEmail {
            system_name: &self.settings.system_name,
            relay_address: &self.settings.relay_address,
            sender: &sender.email,
        }
        .render()?;
        self.transport
            .send(OutboundMail::new(
                self.settings.relay_address.as_str(),
                sender.email.as_str(),
                confirmation,
            ))
            .await?;
        self.events.emit(GateEvent::ConfirmationSent {
            sender: sender.email.clone(),
        });

        self.challenges.delete(&challenge_key(token)).await
    }

    fn failed(&self, token: Option<&str>, reason: &'static str, state: VerificationState) {
        self.events.emit(GateEvent::VerificationFailed {
            token: token.map(str::to_string),
            reason,
            state,
        });
    }
}
