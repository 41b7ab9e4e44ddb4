//! Shared constants for Sentinel components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address for the verification endpoint
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

/// Challenge record retention in the store (24 hours)
pub const CHALLENGE_TTL_SECS: u64 = 86_400;

/// How long a verification claim blocks concurrent claimants (5 minutes)
pub const CLAIM_TTL_SECS: u64 = 300;

/// Number of candidate answers offered in a challenge email
pub const ANSWER_CHOICES: i64 = 5;

/// Value stored against a whitelisted sender
pub const WHITELIST_MARKER: &str = "true";

/// Display name used on challenge and confirmation emails
pub const DEFAULT_SYSTEM_NAME: &str = "Email Protection System";

/// Display name used on `Resent-From`
pub const RESENT_FROM_NAME: &str = "Sentinel System";

/// Store key prefixes
pub mod store_keys {
    /// Challenge record: challenge:{token}
    pub const CHALLENGE_PREFIX: &str = "challenge:";

    /// Verification claim: claim:{token}
    pub const CLAIM_PREFIX: &str = "claim:";

    /// Namespace of the challenge store inside Redis
    pub const CHALLENGE_NAMESPACE: &str = "sentinel:challenges:";

    /// Namespace of the whitelist store inside Redis
    pub const WHITELIST_NAMESPACE: &str = "sentinel:whitelist:";
}

/// Header names
pub mod headers {
    /// Headers whose values may carry RFC 2047 encoded-words (lowercase)
    pub const DECODABLE: &[&str] = &[
        "subject",
        "from",
        "to",
        "cc",
        "bcc",
        "reply-to",
        "comments",
        "keywords",
        "organization",
        "content-description",
        "display-name",
    ];

    /// Original headers copied onto a reconstructed forward, in canonical case
    pub const FORWARDED: &[&str] = &[
        "Subject",
        "Date",
        "In-Reply-To",
        "References",
        "Thread-Topic",
        "Thread-Index",
    ];

    pub const MESSAGE_ID: &str = "Message-ID";
    pub const REPLY_TO: &str = "Reply-To";
    pub const RESENT_FROM: &str = "Resent-From";
    pub const RESENT_TO: &str = "Resent-To";
    pub const RESENT_MESSAGE_ID: &str = "Resent-Message-ID";
    pub const RESENT_DATE: &str = "Resent-Date";
    pub const IN_REPLY_TO: &str = "In-Reply-To";

    /// Headers always written by the forwarder, overriding copied values
    pub const SYNTHESIZED: &[&str] = &[
        MESSAGE_ID,
        REPLY_TO,
        RESENT_FROM,
        RESENT_TO,
        RESENT_MESSAGE_ID,
        RESENT_DATE,
    ];
}
