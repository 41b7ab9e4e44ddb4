//! Challenge issuance and verification.

mod gate;
mod generator;

pub use gate::{GateSettings, InboundOutcome, VerificationGate};
pub use generator::{ChallengeGenerator, generate_token};
