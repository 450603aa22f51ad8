//! MIME message parsing: envelope metadata and attachment discovery.
//!
//! `mail-parser` does the MIME decoding. This module adds the traversal rules
//! used for both the metadata pass and the extraction pass, so the two always
//! agree on which parts are attachments.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use serde::{Deserialize, Serialize};

use crate::error::{PecError, Result};
use crate::model::attachment::AttachmentFile;
use crate::parser::header::{self, decode_header, get_header};

/// Bounds on MIME traversal, protecting against adversarial nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseLimits {
    /// Maximum multipart / embedded-message nesting below the root part.
    pub max_depth: usize,
    /// Maximum number of parts visited in one message, nested messages included.
    pub max_parts: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_parts: 1000,
        }
    }
}

/// Metadata extracted from one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Decoded `Subject:` (empty if absent).
    pub subject: String,
    /// Decoded `From:` (empty if absent).
    pub sender: String,
    /// `Date:` exactly as written (empty if absent).
    pub date: String,
    /// Decoded filenames of attachment parts, in traversal order.
    pub attachments: Vec<String>,
}

/// Parse a raw message into its metadata and attachment filenames.
///
/// Only multipart messages can carry attachments. A part counts when its
/// `Content-Disposition` is `attachment` and it declares a non-empty filename.
pub fn parse_message(raw_message: &[u8], limits: &ParseLimits) -> Result<ParsedMessage> {
    let message_bytes = skip_from_line(raw_message);
    let msg = parse_mime(message_bytes)?;

    let headers = header::parse_header_block(message_bytes);
    let subject = decode_header(get_header(&headers, "subject"));
    let sender = decode_header(get_header(&headers, "from"));
    let date = get_header(&headers, "date").unwrap_or_default().to_string();

    let attachments = attachment_parts(&msg, limits)?
        .into_iter()
        .filter_map(attachment_filename)
        .collect();

    Ok(ParsedMessage {
        subject,
        sender,
        date,
        attachments,
    })
}

/// Decode the payload of every attachment part of a raw message.
///
/// Uses the same selection rules as [`parse_message`], so the files returned
/// here match the names recorded during ingestion one for one.
pub fn attachment_files(raw_message: &[u8], limits: &ParseLimits) -> Result<Vec<AttachmentFile>> {
    let msg = parse_mime(skip_from_line(raw_message))?;

    let files = attachment_parts(&msg, limits)?
        .into_iter()
        .filter_map(|part| {
            attachment_filename(part).map(|filename| AttachmentFile {
                filename,
                data: part.contents().to_vec(),
            })
        })
        .collect();

    Ok(files)
}

fn parse_mime(message_bytes: &[u8]) -> Result<Message<'_>> {
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(PecError::MessageParse {
            id: None,
            reason: "message is empty".into(),
        });
    }
    MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| PecError::MessageParse {
            id: None,
            reason: "not a valid RFC 5322 message".into(),
        })
}

/// Collect the attachment parts of a message, depth-first in document order.
fn attachment_parts<'a, 'x>(
    msg: &'a Message<'x>,
    limits: &ParseLimits,
) -> Result<Vec<&'a MessagePart<'x>>> {
    let mut found = Vec::new();
    let is_multipart = msg
        .parts
        .first()
        .is_some_and(|root| matches!(root.body, PartType::Multipart(_)));
    if is_multipart {
        let mut walker = PartWalker { limits, visited: 0 };
        walker.walk(msg, 0, 0, &mut found)?;
    }
    Ok(found)
}

struct PartWalker<'l> {
    limits: &'l ParseLimits,
    visited: usize,
}

impl PartWalker<'_> {
    fn walk<'a, 'x>(
        &mut self,
        msg: &'a Message<'x>,
        part_id: usize,
        depth: usize,
        found: &mut Vec<&'a MessagePart<'x>>,
    ) -> Result<()> {
        if depth > self.limits.max_depth {
            return Err(limit_exceeded(format!(
                "MIME nesting deeper than {} levels",
                self.limits.max_depth
            )));
        }
        self.visited += 1;
        if self.visited > self.limits.max_parts {
            return Err(limit_exceeded(format!(
                "more than {} MIME parts",
                self.limits.max_parts
            )));
        }

        let Some(part) = msg.parts.get(part_id) else {
            return Ok(());
        };

        if is_attachment(part) {
            found.push(part);
        }

        match &part.body {
            PartType::Multipart(children) => {
                for &child in children {
                    self.walk(msg, child, depth + 1, found)?;
                }
            }
            PartType::Message(nested) => self.walk(nested, 0, depth + 1, found)?,
            _ => {}
        }
        Ok(())
    }
}

fn limit_exceeded(reason: String) -> PecError {
    PecError::MessageParse { id: None, reason }
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

/// Decoded filename of a part, `None` when missing or blank.
fn attachment_filename(part: &MessagePart<'_>) -> Option<String> {
    let name = decode_header(part.attachment_name());
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Skip a leading UTF-8 BOM and mbox `From ` separator line, if present.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: Ufficio <ufficio@pec.example.it>\r\n\
Subject: Notifica di deposito\r\n\
Date: Mon, 08 Jan 2024 10:00:00 +0100\r\n\
\r\n\
Corpo del messaggio.\r\n";

    fn multipart(parts: &str) -> Vec<u8> {
        format!(
            "From: a@example.com\r\n\
Subject: Test\r\n\
Date: Tue, 09 Jan 2024 09:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
{parts}--XX--\r\n"
        )
        .into_bytes()
    }

    fn attachment_part(name: &str, body: &str) -> String {
        format!(
            "--XX\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"{name}\"\r\n\
\r\n\
{body}\r\n"
        )
    }

    #[test]
    fn test_plain_message_metadata() {
        let parsed = parse_message(PLAIN, &ParseLimits::default()).unwrap();
        assert_eq!(parsed.subject, "Notifica di deposito");
        assert_eq!(parsed.sender, "Ufficio <ufficio@pec.example.it>");
        assert_eq!(parsed.date, "Mon, 08 Jan 2024 10:00:00 +0100");
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let parsed = parse_message(b"X-Other: 1\r\n\r\nbody", &ParseLimits::default()).unwrap();
        assert_eq!(parsed.subject, "");
        assert_eq!(parsed.sender, "");
        assert_eq!(parsed.date, "");
    }

    #[test]
    fn test_attachments_in_order() {
        let raw = multipart(&format!(
            "--XX\r\nContent-Type: text/plain\r\n\r\nciao\r\n{}{}",
            attachment_part("a.pdf", "AAA"),
            attachment_part("b.xml", "<b/>")
        ));
        let parsed = parse_message(&raw, &ParseLimits::default()).unwrap();
        assert_eq!(parsed.attachments, vec!["a.pdf", "b.xml"]);
    }

    #[test]
    fn test_inline_and_nameless_parts_are_skipped() {
        let raw = multipart(
            "--XX\r\n\
Content-Type: image/png\r\n\
Content-Disposition: inline; filename=\"logo.png\"\r\n\
\r\n\
PNG\r\n\
--XX\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment\r\n\
\r\n\
PDF\r\n",
        );
        let parsed = parse_message(&raw, &ParseLimits::default()).unwrap();
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_attachment_part_on_non_multipart_is_ignored() {
        let raw = b"From: a@example.com\r\n\
Subject: solo\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"only.pdf\"\r\n\
\r\n\
PDF\r\n";
        let parsed = parse_message(raw, &ParseLimits::default()).unwrap();
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_encoded_filename_is_decoded() {
        let raw = multipart(&attachment_part("=?UTF-8?Q?ricevuta_citt=C3=A0.pdf?=", "X"));
        let parsed = parse_message(&raw, &ParseLimits::default()).unwrap();
        assert_eq!(parsed.attachments, vec!["ricevuta città.pdf"]);
    }

    #[test]
    fn test_attachment_files_payload() {
        let raw = multipart(&attachment_part("note.txt", "hello"));
        let files = attachment_files(&raw, &ParseLimits::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "note.txt");
        assert_eq!(files[0].data, b"hello");
    }

    #[test]
    fn test_part_limit() {
        let raw = multipart(&format!(
            "{}{}{}",
            attachment_part("1.bin", "1"),
            attachment_part("2.bin", "2"),
            attachment_part("3.bin", "3")
        ));
        let limits = ParseLimits {
            max_depth: 8,
            max_parts: 2,
        };
        let err = parse_message(&raw, &limits).unwrap_err();
        assert!(matches!(err, PecError::MessageParse { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let inner = "--YY\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"deep.bin\"\r\n\
\r\n\
D\r\n\
--YY--\r\n";
        let raw = multipart(&format!(
            "--XX\r\nContent-Type: multipart/mixed; boundary=\"YY\"\r\n\r\n{inner}"
        ));

        let shallow = ParseLimits {
            max_depth: 1,
            max_parts: 100,
        };
        let err = parse_message(&raw, &shallow).unwrap_err();
        assert!(err.to_string().contains("nesting"));

        let parsed = parse_message(&raw, &ParseLimits::default()).unwrap();
        assert_eq!(parsed.attachments, vec!["deep.bin"]);
    }

    #[test]
    fn test_empty_message_is_parse_error() {
        let err = parse_message(b"", &ParseLimits::default()).unwrap_err();
        assert!(matches!(err, PecError::MessageParse { id: None, .. }));
        assert!(parse_message(b"\r\n\r\n", &ParseLimits::default()).is_err());
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }
}
