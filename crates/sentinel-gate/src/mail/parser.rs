//! Inbound message parsing on top of `mail-parser`.

use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::debug;

use super::codec::decode_header;
use super::{Attachment, Body, Headers, Mailbox, ParsedMessage};

/// Parse a raw message. Returns `None` when the bytes are not a message at all.
pub fn parse_message(raw: &[u8]) -> Option<ParsedMessage> {
    let message = MessageParser::default().parse(raw)?;

    let from = message
        .from()
        .and_then(|address| address.first())
        .and_then(|addr| {
            let email = addr.address.as_deref()?.trim();
            Some(Mailbox::new(
                addr.name.as_deref().map(str::to_string),
                email,
            ))
        });

    let to = message
        .to()
        .map(|address| {
            address
                .iter()
                .filter_map(|addr| {
                    let email = addr.address.as_deref()?.trim();
                    Some(Mailbox::new(addr.name.as_deref().map(str::to_string), email))
                })
                .collect()
        })
        .unwrap_or_default();

    // html_bodies() falls back to text parts when no HTML exists, so match on the part type
    let text = message.text_bodies().find_map(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });
    let html = message.html_bodies().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });

    let attachments = message
        .attachments()
        .map(|part| Attachment {
            file_name: part.attachment_name().map(str::to_string),
            content_type: part.content_type().map(|ct| match ct.subtype() {
                Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                None => ct.ctype().to_string(),
            }),
            content: part.contents().to_vec(),
        })
        .collect();

    let headers = decode_headers(raw_headers(raw));
    debug!(
        fields = headers.len(),
        parts = message.parts.len(),
        "Parsed inbound message"
    );

    Some(ParsedMessage {
        from,
        to,
        headers,
        body: Body { text, html },
        attachments,
    })
}

/// Unfolded `(name, value)` pairs of the header section, in order
pub fn raw_headers(raw: &[u8]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in raw.split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push_str(line);
            }
            continue;
        }

        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    for (_, value) in headers.iter_mut() {
        let trimmed = value.trim_end().len();
        value.truncate(trimmed);
    }

    headers
}

/// Decode every header value, keeping undecodable words as raw text
pub fn decode_headers(raw: Vec<(String, String)>) -> Headers {
    let mut headers = Headers::new();

    for (name, value) in raw {
        let decoded = decode_header(&name, &value);
        if !decoded.failures().is_empty() {
            debug!(
                header = %name,
                value = decoded.text(),
                failures = ?decoded.failures(),
                "Kept undecodable encoded-words verbatim"
            );
        }
        headers.append(&name, decoded.into_text());
    }

    headers
}
