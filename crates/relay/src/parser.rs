//! Raw message parsing
//!
//! Decodes raw RFC 822 bytes into a normalized record for ingestion.
//! Every failure mode degrades to skipping the one message, never to
//! failing the batch: the skip reason is typed so the ingestion engine
//! can log it.

use mailparse::{MailAddr, MailHeader, MailHeaderMap, ParsedMail};

use crate::models::MessageId;

/// Placeholder when the sender display header is absent or undecodable
const UNKNOWN_SENDER: &str = "(unknown sender)";
/// Placeholder when the subject header is absent or undecodable
const NO_SUBJECT: &str = "(no subject)";

/// Reason a raw message was skipped instead of ingested
#[derive(Debug, thiserror::Error)]
pub enum ParseSkip {
    /// The MIME structure could not be decoded at all
    #[error("malformed message: {0}")]
    Malformed(#[from] mailparse::MailParseError),

    /// Without a Message-ID the message cannot be deduplicated safely
    #[error("missing Message-ID header")]
    MissingMessageId,

    /// Neither To nor Delivered-To yields an address under the serving domain
    #[error("no recipient under domain {domain}")]
    ForeignRecipient { domain: String },
}

/// A raw message normalized for ingestion
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Transport Message-ID, the deduplication key
    pub message_id: MessageId,
    /// Local-part of the resolved recipient, lowercased
    pub local_part: String,
    /// Full resolved recipient address
    pub recipient: String,
    /// Decoded sender display string
    pub sender: String,
    /// Decoded subject
    pub subject: String,
    /// First text/plain part, or the sole payload; empty if none
    pub body: String,
}

/// Parse raw message bytes into a normalized record
///
/// `domain` is the serving domain; mail addressed elsewhere is skipped.
pub fn parse_message(raw: &[u8], domain: &str) -> Result<ParsedMessage, ParseSkip> {
    let parsed = mailparse::parse_mail(raw)?;
    let headers = parsed.headers.as_slice();

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ParseSkip::MissingMessageId)?;

    let recipient = resolve_recipient(headers)
        .filter(|addr| is_under_domain(addr, domain))
        .ok_or_else(|| ParseSkip::ForeignRecipient {
            domain: domain.to_string(),
        })?;
    let local_part = recipient
        .split('@')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    // Header decoding (RFC 2047 encoded words) happens inside mailparse;
    // absent headers degrade to placeholders rather than skipping.
    let sender = headers
        .get_first_value("From")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let subject = headers
        .get_first_value("Subject")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let body = extract_plain_text(&parsed);

    Ok(ParsedMessage {
        message_id: MessageId::new(message_id),
        local_part,
        recipient,
        sender,
        subject,
        body,
    })
}

/// Resolve the recipient: the To header, falling back to Delivered-To
/// when the primary yields no address
fn resolve_recipient(headers: &[MailHeader<'_>]) -> Option<String> {
    headers
        .get_first_value("To")
        .and_then(|v| first_address(&v))
        .or_else(|| {
            headers
                .get_first_value("Delivered-To")
                .and_then(|v| first_address(&v))
        })
}

/// Extract the first mailbox address from an address header value
fn first_address(value: &str) -> Option<String> {
    let parsed = mailparse::addrparse(value).ok()?;
    for addr in parsed.into_inner() {
        match addr {
            MailAddr::Single(info) => return Some(info.addr),
            MailAddr::Group(group) => {
                if let Some(info) = group.addrs.into_iter().next() {
                    return Some(info.addr);
                }
            }
        }
    }
    None
}

fn is_under_domain(addr: &str, domain: &str) -> bool {
    let suffix = format!("@{}", domain.to_ascii_lowercase());
    addr.to_ascii_lowercase().ends_with(&suffix)
}

/// Select the display body: first text/plain part depth-first for
/// multipart messages, the sole payload otherwise, empty if neither
fn extract_plain_text(parsed: &ParsedMail<'_>) -> String {
    if parsed.subparts.is_empty() {
        return decode_part(parsed);
    }
    find_plain_text(&parsed.subparts).unwrap_or_default()
}

fn find_plain_text(parts: &[ParsedMail<'_>]) -> Option<String> {
    for part in parts {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            return Some(decode_part(part));
        }
        if let Some(text) = find_plain_text(&part.subparts) {
            return Some(text);
        }
    }
    None
}

/// Decode one part with its declared charset, lossy UTF-8 on failure
fn decode_part(part: &ParsedMail<'_>) -> String {
    match part.get_body() {
        Ok(body) => body,
        Err(_) => String::from_utf8_lossy(&part.get_body_raw().unwrap_or_default()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "example.com";

    #[test]
    fn test_parse_simple_message() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: Tester <tester@example.com>\r\n\
                    From: Alice <alice@example.org>\r\n\
                    Subject: Hello\r\n\
                    \r\n\
                    Plain body here\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.message_id.as_str(), "<m1@src>");
        assert_eq!(msg.local_part, "tester");
        assert_eq!(msg.recipient, "tester@example.com");
        assert_eq!(msg.sender, "Alice <alice@example.org>");
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.body.trim(), "Plain body here");
    }

    #[test]
    fn test_missing_message_id_is_skipped() {
        let raw = b"To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    Subject: Hello\r\n\
                    \r\n\
                    body\r\n";

        let err = parse_message(raw, DOMAIN).unwrap_err();
        assert!(matches!(err, ParseSkip::MissingMessageId));
    }

    #[test]
    fn test_foreign_recipient_is_skipped() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: someone@elsewhere.net\r\n\
                    From: alice@example.org\r\n\
                    \r\n\
                    body\r\n";

        let err = parse_message(raw, DOMAIN).unwrap_err();
        assert!(matches!(err, ParseSkip::ForeignRecipient { .. }));
    }

    #[test]
    fn test_delivered_to_fallback() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    Delivered-To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    \r\n\
                    body\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.local_part, "tester");
    }

    #[test]
    fn test_recipient_local_part_is_lowercased() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: TeStEr@Example.Com\r\n\
                    From: alice@example.org\r\n\
                    \r\n\
                    body\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.local_part, "tester");
    }

    #[test]
    fn test_encoded_subject_is_decoded() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    Subject: =?UTF-8?B?SGVsbG8gV29ybGQ=?=\r\n\
                    \r\n\
                    body\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.subject, "Hello World");
    }

    #[test]
    fn test_missing_headers_become_placeholders() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: tester@example.com\r\n\
                    \r\n\
                    body\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.sender, UNKNOWN_SENDER);
        assert_eq!(msg.subject, NO_SUBJECT);
    }

    #[test]
    fn test_multipart_picks_first_plain_part() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    Subject: Multi\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: text/html\r\n\
                    \r\n\
                    <p>html</p>\r\n\
                    --XYZ\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    plain body\r\n\
                    --XYZ--\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.body.trim(), "plain body");
    }

    #[test]
    fn test_multipart_without_plain_part_has_empty_body() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: text/html\r\n\
                    \r\n\
                    <p>html only</p>\r\n\
                    --XYZ--\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert!(msg.body.is_empty());
    }

    #[test]
    fn test_nested_multipart_depth_first() {
        let raw = b"Message-ID: <m1@src>\r\n\
                    To: tester@example.com\r\n\
                    From: alice@example.org\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"OUTER\"\r\n\
                    \r\n\
                    --OUTER\r\n\
                    Content-Type: multipart/alternative; boundary=\"INNER\"\r\n\
                    \r\n\
                    --INNER\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    nested plain\r\n\
                    --INNER--\r\n\
                    --OUTER--\r\n";

        let msg = parse_message(raw, DOMAIN).unwrap();
        assert_eq!(msg.body.trim(), "nested plain");
    }
}
