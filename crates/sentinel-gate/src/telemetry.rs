//! Structured gate events.
//!
//! The gate reports what happened through an [`EventSink`]; the production
//! sink turns events into `tracing` records.

use sentinel_common::VerificationState;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Whitelisted sender, message passed through
    WhitelistedForwarded {
        sender: String,
        message_id: Option<String>,
    },
    /// Challenge persisted and emailed
    ChallengeIssued {
        sender: String,
        token: String,
        question: String,
        message_id: Option<String>,
    },
    /// A verification link was opened
    VerificationAttempt {
        token: Option<String>,
        answer: Option<String>,
        client: Option<String>,
    },
    VerificationFailed {
        token: Option<String>,
        reason: &'static str,
        state: VerificationState,
    },
    /// Sender whitelisted and original delivered
    VerificationSucceeded {
        token: String,
        sender: String,
        age_ms: i64,
    },
    ConfirmationSent {
        sender: String,
    },
    /// Another request already holds the claim on this token
    ClaimContended {
        token: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: GateEvent);
}

/// Writes events as `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: GateEvent) {
        match event {
            GateEvent::WhitelistedForwarded { sender, message_id } => {
                info!(event = "whitelisted_email_forwarded", %sender, ?message_id, "Forwarded whitelisted sender");
            }
            GateEvent::ChallengeIssued {
                sender,
                token,
                question,
                message_id,
            } => {
                info!(event = "challenge_issued", %sender, %token, %question, ?message_id, "Challenge sent");
            }
            GateEvent::VerificationAttempt {
                token,
                answer,
                client,
            } => {
                info!(event = "verification_attempt", ?token, ?answer, ?client, "Verification attempt");
            }
            GateEvent::VerificationFailed {
                token,
                reason,
                state,
            } => {
                info!(event = "verification_error", ?token, error = reason, ?state, "Verification failed");
            }
            GateEvent::VerificationSucceeded {
                token,
                sender,
                age_ms,
            } => {
                info!(
                    event = "verification_success",
                    %token,
                    %sender,
                    time_taken_ms = age_ms,
                    state = ?VerificationState::Verified,
                    "Sender verified"
                );
            }
            GateEvent::ConfirmationSent { sender } => {
                info!(event = "success_email_sent", %sender, "Confirmation sent");
            }
            GateEvent::ClaimContended { token } => {
                warn!(event = "claim_contended", %token, "Token already being verified");
            }
        }
    }
}

/// Keeps events in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<GateEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<GateEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: GateEvent) {
        self.events.lock().unwrap().push(event);
    }
}
