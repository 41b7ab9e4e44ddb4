//! Core types shared across Sentinel components.

use serde::{Deserialize, Serialize};

use crate::constants::ANSWER_CHOICES;

/// Arithmetic operator used in a challenge question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Plus,
    Minus,
    Times,
}

impl Operator {
    pub const ALL: [Operator; 3] = [Operator::Plus, Operator::Minus, Operator::Times];

    /// Symbol shown in the question text
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "×",
        }
    }

    pub fn apply(&self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Plus => lhs + rhs,
            Self::Minus => lhs - rhs,
            Self::Times => lhs * rhs,
        }
    }
}

/// A human-solvable arithmetic challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub operator: Operator,
    pub num1: i64,
    pub num2: i64,
    /// Question text, e.g. "What is 7 × 3?"
    pub question: String,
    /// Correct answer rendered as text
    pub answer: String,
}

impl Challenge {
    /// Build the challenge for fixed operands. The answer depends on nothing else.
    pub fn new(operator: Operator, num1: i64, num2: i64) -> Self {
        let answer = operator.apply(num1, num2);
        Self {
            operator,
            num1,
            num2,
            question: format!("What is {} {} {}?", num1, operator.symbol(), num2),
            answer: answer.to_string(),
        }
    }

    pub fn answer_value(&self) -> i64 {
        self.operator.apply(self.num1, self.num2)
    }

    /// Candidate answers offered as links: answer-2 ..= answer+2
    pub fn candidate_answers(&self) -> Vec<i64> {
        let answer = self.answer_value();
        let spread = ANSWER_CHOICES / 2;
        (answer - spread..=answer + spread).collect()
    }
}

/// Lifecycle state of a sender with respect to verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    /// No challenge record exists
    Unverified,
    /// A challenge record is persisted and awaiting an answer
    Challenged,
    /// The record was consumed and the sender whitelisted
    Verified,
    /// The store evicted the record before it was answered
    Expired,
    /// A wrong answer was presented; the record remains retryable
    Rejected,
}

/// Persisted challenge, stored under `challenge:{token}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    /// Unique challenge token
    #[serde(rename = "challengeToken")]
    pub token: String,

    /// The original message, byte for byte
    pub raw_email: Vec<u8>,

    /// Issuance time (Unix epoch milliseconds)
    #[serde(rename = "timestamp")]
    pub created_at: i64,

    /// Correct answer as text
    pub answer: String,
}

impl ChallengeRecord {
    pub fn new(token: String, raw_email: Vec<u8>, answer: String) -> Self {
        Self {
            token,
            raw_email,
            created_at: chrono::Utc::now().timestamp_millis(),
            answer,
        }
    }

    /// Parse a stored record, rejecting anything that does not describe
    /// a challenge issued under `token`
    pub fn from_stored(token: &str, stored: &str) -> Result<Self, String> {
        let record: ChallengeRecord =
            serde_json::from_str(stored).map_err(|e| format!("malformed record: {e}"))?;

        if record.token != token {
            return Err(format!(
                "token mismatch: stored {} under {}",
                record.token, token
            ));
        }
        if record.answer.parse::<i64>().is_err() {
            return Err(format!("non-numeric answer {:?}", record.answer));
        }
        if record.raw_email.is_empty() {
            return Err("empty message".to_string());
        }

        Ok(record)
    }

    /// Age of the record in milliseconds
    pub fn age_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.created_at
    }

    /// Check an answer presented by the visitor
    pub fn matches(&self, answer: &str) -> bool {
        self.answer == answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_answers() {
        assert_eq!(Challenge::new(Operator::Plus, 4, 9).answer, "13");
        assert_eq!(Challenge::new(Operator::Minus, 4, 4).answer, "0");
        assert_eq!(Challenge::new(Operator::Times, 7, 3).answer, "21");
        assert_eq!(Challenge::new(Operator::Times, 7, 3).question, "What is 7 × 3?");
    }

    #[test]
    fn test_candidate_answers_surround_answer() {
        let challenge = Challenge::new(Operator::Minus, 3, 2);
        assert_eq!(challenge.candidate_answers(), vec![-1, 0, 1, 2, 3]);
    }

    #[test]
    fn test_record_json_layout() {
        let record = ChallengeRecord {
            token: "abc".to_string(),
            raw_email: vec![72, 105],
            created_at: 1_700_000_000_000,
            answer: "12".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["challengeToken"], "abc");
        assert_eq!(json["rawEmail"], serde_json::json!([72, 105]));
        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(json["answer"], "12");
    }

    #[test]
    fn test_from_stored_validates_shape() {
        let good = r#"{"challengeToken":"t1","rawEmail":[65],"timestamp":1,"answer":"4"}"#;
        assert!(ChallengeRecord::from_stored("t1", good).is_ok());
        assert!(ChallengeRecord::from_stored("t2", good).is_err());

        let bad_answer = r#"{"challengeToken":"t1","rawEmail":[65],"timestamp":1,"answer":"four"}"#;
        assert!(ChallengeRecord::from_stored("t1", bad_answer).is_err());

        let missing = r#"{"challengeToken":"t1","timestamp":1,"answer":"4"}"#;
        assert!(ChallengeRecord::from_stored("t1", missing).is_err());

        assert!(ChallengeRecord::from_stored("t1", "not json").is_err());
    }

    #[test]
    fn test_matches_is_exact() {
        let record = ChallengeRecord::new("t".into(), vec![1], "10".into());
        assert!(record.matches("10"));
        assert!(!record.matches("010"));
        assert!(!record.matches("9"));
    }
}
