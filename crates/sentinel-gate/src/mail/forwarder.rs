//! Reconstruction of original messages for delivery to the protected mailbox.
//!
//! A reconstructed forward carries the relay as sender, the target as its only
//! recipient, a small allow-list of the original headers, and fresh identity
//! and `Resent-*` headers. Whitelisted mail skips reconstruction and goes out
//! byte for byte; both paths end in an [`OutboundMail`].

use std::fmt;

use mail_builder::{
    MessageBuilder,
    headers::{HeaderType, address::Address, raw::Raw, text::Text},
};
use sentinel_common::{
    SentinelError,
    constants::{RESENT_FROM_NAME, headers},
};

use super::{Mailbox, OutboundMail, ParsedMessage};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Value of an outbound header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Mailbox(Mailbox),
}

impl FieldValue {
    fn to_header(&self) -> HeaderType<'_> {
        match self {
            Self::Text(text) if text.is_ascii() => Raw::new(text.as_str()).into(),
            Self::Text(text) => Text::new(text.as_str()).into(),
            Self::Mailbox(mailbox) => {
                Address::new_address(mailbox.name.as_deref(), mailbox.email.as_str()).into()
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Mailbox(mailbox) => mailbox.fmt(f),
        }
    }
}

/// Decoded values may carry CR/LF; a copied header must stay one field
fn single_line(value: &str) -> String {
    value
        .split(|c: char| c.is_control())
        .filter(|part| !part.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attachment copied onto a forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedAttachment {
    pub file_name: String,
    /// Empty when the original part had no content type
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A reconstructed message, before rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedMessage {
    pub from: Mailbox,
    pub to: String,
    pub headers: Vec<(String, FieldValue)>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<ForwardedAttachment>,
}

impl ForwardedMessage {
    pub fn header(&self, name: &str) -> Option<&FieldValue> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Set a header, replacing any value already present under that name
    fn set_header(&mut self, name: &str, value: FieldValue) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }

    /// Render to RFC 5322 bytes; binary attachment content is base64-encoded
    pub fn render(&self) -> Result<Vec<u8>, SentinelError> {
        let from = Address::new_address(self.from.name.as_deref(), self.from.email.as_str());
        let mut builder = MessageBuilder::new().from(from).to(self.to.as_str());

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.to_header());
        }

        match (&self.text, &self.html) {
            (None, None) => builder = builder.text_body(""),
            (text, html) => {
                if let Some(text) = text {
                    builder = builder.text_body(text.as_str());
                }
                if let Some(html) = html {
                    builder = builder.html_body(html.as_str());
                }
            }
        }

        for attachment in &self.attachments {
            let content_type = if attachment.content_type.is_empty() {
                FALLBACK_CONTENT_TYPE
            } else {
                attachment.content_type.as_str()
            };
            builder = builder.attachment(
                content_type,
                attachment.file_name.as_str(),
                attachment.content.as_slice(),
            );
        }

        builder
            .write_to_vec()
            .map_err(|e| SentinelError::Internal(format!("failed to render forward: {e}")))
    }
}

/// Builds outbound copies of original messages
#[derive(Debug, Clone)]
pub struct Forwarder {
    relay_address: String,
    target_address: String,
    routing_host: String,
}

impl Forwarder {
    pub fn new(relay_address: String, target_address: String, routing_host: String) -> Self {
        Self {
            relay_address,
            target_address,
            routing_host,
        }
    }

    /// Forward the original bytes untouched, enveloped from the relay to `target`
    pub fn verbatim(&self, raw: &[u8], target: &str) -> OutboundMail {
        OutboundMail::new(self.relay_address.as_str(), target, raw.to_vec())
    }

    /// Rebuild `original` as a new message from the relay to the target.
    /// `sender` must already be validated by the caller.
    pub fn rewrite(&self, original: &ParsedMessage, sender: &Mailbox) -> ForwardedMessage {
        let mut message = ForwardedMessage {
            from: Mailbox::new(sender.name.clone(), self.relay_address.as_str()),
            to: self.target_address.clone(),
            headers: Vec::new(),
            text: original.body.text.clone(),
            html: original.body.html.clone(),
            attachments: original
                .attachments
                .iter()
                .map(|attachment| ForwardedAttachment {
                    file_name: attachment.file_name.clone().unwrap_or_default(),
                    content_type: attachment.content_type.clone().unwrap_or_default(),
                    content: attachment.content.clone(),
                })
                .collect(),
        };

        for name in headers::FORWARDED {
            if let Some(value) = original.headers.get(name) {
                message.set_header(name, FieldValue::Text(single_line(value)));
            }
        }

        message.set_header(headers::MESSAGE_ID, FieldValue::Text(self.message_id()));
        message.set_header(headers::REPLY_TO, FieldValue::Mailbox(sender.clone()));
        message.set_header(
            headers::RESENT_FROM,
            FieldValue::Mailbox(Mailbox::new(
                Some(RESENT_FROM_NAME.to_string()),
                self.relay_address.as_str(),
            )),
        );
        message.set_header(
            headers::RESENT_TO,
            FieldValue::Text(self.target_address.clone()),
        );
        message.set_header(headers::RESENT_MESSAGE_ID, FieldValue::Text(self.message_id()));
        message.set_header(headers::RESENT_DATE, FieldValue::Text(http_date()));

        message
    }

    /// Rewrite and render into an envelope addressed to the target
    pub fn rewrite_outbound(
        &self,
        original: &ParsedMessage,
        sender: &Mailbox,
    ) -> Result<OutboundMail, SentinelError> {
        let raw = self.rewrite(original, sender).render()?;
        Ok(OutboundMail::new(
            self.relay_address.as_str(),
            self.target_address.as_str(),
            raw,
        ))
    }

    /// `<uuid>@<routing-host>`
    pub fn message_id(&self) -> String {
        format!("<{}@{}>", uuid::Uuid::new_v4(), self.routing_host)
    }
}

/// Current time in RFC 1123 form, e.g. `Tue, 14 Oct 2025 09:00:00 GMT`
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
