//! RFC 2047 encoded-word decoding for human-readable headers.
//!
//! Only UTF-8 words are recognised. Decoding is best-effort: a word that
//! fails to decode is kept verbatim and reported in [`HeaderDecode::Partial`]
//! instead of failing the whole header.

use std::sync::LazyLock;

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use regex::Regex;
use thiserror::Error;

use sentinel_common::constants::headers::DECODABLE;

static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)=\?UTF-8\?([QB])\?(.*?)\?=").expect("encoded-word pattern is valid")
});

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a single encoded-word could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordError {
    #[error("invalid quoted-printable escape: {0}")]
    InvalidHex(String),
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
    #[error("decoded bytes are not UTF-8")]
    InvalidUtf8,
}

/// Result of decoding one header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderDecode {
    /// Header is not decodable or holds no encoded-words
    Unchanged(String),
    /// Every encoded-word was decoded
    Decoded(String),
    /// Some encoded-words were kept verbatim
    Partial {
        text: String,
        failures: Vec<WordError>,
    },
}

impl HeaderDecode {
    pub fn text(&self) -> &str {
        match self {
            Self::Unchanged(text) | Self::Decoded(text) => text,
            Self::Partial { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Unchanged(text) | Self::Decoded(text) => text,
            Self::Partial { text, .. } => text,
        }
    }

    pub fn failures(&self) -> &[WordError] {
        match self {
            Self::Partial { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Whether `name` may carry encoded-words
pub fn is_decodable(name: &str) -> bool {
    DECODABLE.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Decode the encoded-words of a header value
pub fn decode_header(name: &str, value: &str) -> HeaderDecode {
    if !is_decodable(name) {
        return HeaderDecode::Unchanged(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut failures = Vec::new();
    let mut words = 0;
    let mut last = 0;

    for caps in ENCODED_WORD.captures_iter(value) {
        let (Some(word), Some(encoding), Some(payload)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        words += 1;
        out.push_str(&value[last..word.start()]);

        match decode_word(encoding.as_str(), payload.as_str()) {
            Ok(decoded) => out.push_str(&decoded),
            Err(err) => {
                out.push_str(word.as_str());
                failures.push(err);
            }
        }
        last = word.end();
    }
    out.push_str(&value[last..]);

    if words == 0 {
        HeaderDecode::Unchanged(out)
    } else if failures.is_empty() {
        HeaderDecode::Decoded(out)
    } else {
        HeaderDecode::Partial {
            text: out,
            failures,
        }
    }
}

fn decode_word(encoding: &str, payload: &str) -> Result<String, WordError> {
    let bytes = if encoding.eq_ignore_ascii_case("q") {
        decode_q(payload)?
    } else {
        decode_b(payload)?
    };
    String::from_utf8(bytes).map_err(|_| WordError::InvalidUtf8)
}

fn decode_q(payload: &str) -> Result<Vec<u8>, WordError> {
    let raw = payload.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = raw
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .ok_or_else(|| WordError::InvalidHex(payload[i..].to_string()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| WordError::InvalidHex(hex.to_string()))?;
                out.push(byte);
                i += 2;
            }
            other => out.push(other),
        }
        i += 1;
    }

    Ok(out)
}

fn decode_b(payload: &str) -> Result<Vec<u8>, WordError> {
    let cleaned: String = payload
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| WordError::InvalidBase64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_word() {
        assert_eq!(
            decode_header("Subject", "=?UTF-8?Q?Caf=C3=A9_au_lait?=").into_text(),
            "Café au lait"
        );
    }

    #[test]
    fn test_b_word_lowercase_tags() {
        assert_eq!(decode_header("subject", "=?utf-8?b?w6lsw6h2ZQ==?=").into_text(), "élève");
    }

    #[test]
    fn test_b_word_without_padding() {
        assert_eq!(decode_header("Subject", "=?UTF-8?B?w6lsw6h2ZQ?=").into_text(), "élève");
    }

    #[test]
    fn test_multiple_words_keep_surrounding_text() {
        let value = "Re: =?UTF-8?B?0J/RgNC40LLQtdGC?= and =?UTF-8?Q?M=C3=BCnchen?=!";
        let decoded = decode_header("Subject", value);
        assert_eq!(decoded, HeaderDecode::Decoded("Re: Привет and München!".to_string()));
    }

    #[test]
    fn test_display_name_in_from() {
        assert_eq!(
            decode_header("From", "=?UTF-8?B?R3LDvMOfZSBhdXMgTcO8bmNoZW4=?= <a@b.example>").into_text(),
            "Grüße aus München <a@b.example>"
        );
    }

    #[test]
    fn test_non_decodable_header_untouched() {
        let value = "=?UTF-8?Q?Caf=C3=A9?=";
        assert_eq!(
            decode_header("Message-ID", value),
            HeaderDecode::Unchanged(value.to_string())
        );
        assert_eq!(decode_header("X-Custom", value).into_text(), value);
    }

    #[test]
    fn test_plain_text_is_idempotent() {
        let value = "Quarterly report = done? yes";
        let once = decode_header("Subject", value).into_text();
        let twice = decode_header("Subject", &once).into_text();
        assert_eq!(once, value);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let value = "Hello =?UTF-8?B?//4=?= world =?UTF-8?Q?ok?=";
        let decoded = decode_header("Subject", value);
        assert_eq!(decoded.text(), "Hello =?UTF-8?B?//4=?= world ok");
        assert_eq!(decoded.failures(), &[WordError::InvalidUtf8]);
    }

    #[test]
    fn test_invalid_base64_falls_back() {
        let value = "=?UTF-8?B?QQ=Q?=";
        let decoded = decode_header("Subject", value);
        assert_eq!(decoded.text(), value);
        assert!(matches!(decoded.failures(), [WordError::InvalidBase64(_)]));
    }

    #[test]
    fn test_invalid_hex_falls_back() {
        let value = "=?UTF-8?Q?bad=ZZescape?= tail";
        let decoded = decode_header("subject", value);
        assert_eq!(decoded.text(), value);
        assert!(matches!(decoded.failures(), [WordError::InvalidHex(_)]));
    }

    #[test]
    fn test_signed_hex_is_rejected() {
        let value = "=?UTF-8?Q?a=+Fb?=";
        let decoded = decode_header("subject", value);
        assert_eq!(decoded.text(), value);
        assert!(matches!(decoded.failures(), [WordError::InvalidHex(_)]));
    }

    #[test]
    fn test_other_charsets_are_not_words() {
        let value = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_header("Subject", value), HeaderDecode::Unchanged(value.to_string()));
    }
}
