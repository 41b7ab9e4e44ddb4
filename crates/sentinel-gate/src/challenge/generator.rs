//! Arithmetic challenge generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sentinel_common::{Challenge, Operator};

/// Produces random arithmetic challenges
#[derive(Debug, Default, Clone, Copy)]
pub struct ChallengeGenerator;

impl ChallengeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a challenge from the thread-local RNG
    pub fn generate(&self) -> Challenge {
        self.generate_with(&mut rand::rng())
    }

    /// Generate a challenge from `rng`
    ///
    /// Subtraction draws `num2` from `1..=num1`, so answers are never negative.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Challenge {
        let operator = Operator::ALL[rng.random_range(0..Operator::ALL.len())];
        let num1 = rng.random_range(1..=10);
        let num2 = match operator {
            Operator::Minus => rng.random_range(1..=num1),
            Operator::Plus | Operator::Times => rng.random_range(1..=10),
        };

        tracing::debug!(
            operation = ?operator,
            num1,
            num2,
            "Generated challenge"
        );

        Challenge::new(operator, num1, num2)
    }
}

/// Generate a 128-bit random token
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
