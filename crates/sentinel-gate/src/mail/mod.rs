//! Mail handling: header decoding, parsing, reconstruction, and delivery.

mod codec;
mod forwarder;
mod parser;
pub mod templates;
mod transport;

pub use forwarder::Forwarder;
pub use parser::{decode_headers, parse_message, raw_headers};
pub use transport::{MailTransport, SmtpRelay};

#[cfg(test)]
pub use transport::{Delivery, RecordingTransport};

use std::fmt;

/// A display name and address pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub email: String,
}

impl Mailbox {
    pub fn new(name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.filter(|n| !n.trim().is_empty()),
            email: email.into(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "<{}>", self.email),
        }
    }
}

/// The part of an address before `@`
pub fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or_default()
}

/// Header fields in arrival order, grouped by case-insensitive name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, grouping it with earlier values of the same header
    pub fn append(&mut self, name: &str, value: String) {
        match self
            .fields
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value),
            None => self.fields.push((name.to_string(), vec![value])),
        }
    }

    /// First value of a header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Message bodies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub text: Option<String>,
    pub html: Option<String>,
}

/// An attachment of a parsed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// A parsed message with decoded headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub from: Option<Mailbox>,
    pub to: Vec<Mailbox>,
    pub headers: Headers,
    pub body: Body,
    pub attachments: Vec<Attachment>,
}

impl ParsedMessage {
    /// The sender, if the `From` header holds a usable address
    pub fn sender(&self) -> Option<&Mailbox> {
        self.from
            .as_ref()
            .filter(|m| m.email.contains('@') && !m.email.starts_with('@'))
    }
}

/// A message as received from the MTA
#[derive(Debug, Clone)]
pub struct InboundMail {
    /// Envelope sender (`MAIL FROM`)
    pub envelope_from: String,
    /// Envelope recipient (`RCPT TO`)
    pub envelope_to: String,
    /// The message exactly as received
    pub raw: Vec<u8>,
    pub message_id: Option<String>,
    pub subject: Option<String>,
}

impl InboundMail {
    pub fn new(envelope_from: &str, envelope_to: &str, raw: Vec<u8>) -> Self {
        let headers = decode_headers(raw_headers(&raw));
        Self {
            envelope_from: envelope_from.trim().to_string(),
            envelope_to: envelope_to.trim().to_string(),
            message_id: headers.get("Message-ID").map(str::to_string),
            subject: headers.get("Subject").map(str::to_string),
            raw,
        }
    }
}

/// A fully rendered message with its envelope, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub envelope_from: String,
    pub envelope_to: String,
    pub raw: Vec<u8>,
}

impl OutboundMail {
    pub fn new(envelope_from: impl Into<String>, envelope_to: impl Into<String>, raw: Vec<u8>) -> Self {
        Self {
            envelope_from: envelope_from.into(),
            envelope_to: envelope_to.into(),
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_group_case_insensitively() {
        let mut headers = Headers::new();
        headers.append("Received", "a".into());
        headers.append("Subject", "hi".into());
        headers.append("received", "b".into());

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("RECEIVED"), Some("a"));
        assert_eq!(headers.get_all("Received"), &["a".to_string(), "b".to_string()]);
        assert!(headers.get_all("Cc").is_empty());
    }

    #[test]
    fn test_mailbox_display() {
        let named = Mailbox::new(Some("Ada".into()), "ada@example.com");
        assert_eq!(named.to_string(), "Ada <ada@example.com>");
        assert_eq!(local_part(&named.email), "ada");

        let bare = Mailbox::new(Some("  ".into()), "bob@example.com");
        assert_eq!(bare.name, None);
        assert_eq!(bare.to_string(), "<bob@example.com>");
    }

    #[test]
    fn test_inbound_mail_reads_headers() {
        let raw = b"Subject: =?UTF-8?Q?Caf=C3=A9?=\r\nMessage-ID: <m1@example.com>\r\n\r\nbody".to_vec();
        let inbound = InboundMail::new(" a@example.com ", "relay@example.org", raw);
        assert_eq!(inbound.envelope_from, "a@example.com");
        assert_eq!(inbound.subject.as_deref(), Some("Café"));
        assert_eq!(inbound.message_id.as_deref(), Some("<m1@example.com>"));
    }
}
