//! Per-message records accumulated by the ingestion pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::Category;

/// Opaque message identifier assigned by the mail session.
///
/// Unique and stable for the lifetime of one session (an IMAP UID, a file
/// name for directory sources).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u32> for MessageId {
    fn from(uid: u32) -> Self {
        Self(uid.to_string())
    }
}

/// Metadata for one ingested message.
///
/// Records are append-only: the pipeline never edits or removes one after it
/// has been pushed. The attachment count is derived from the name list, so
/// the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Session identifier, used to fetch the message again for extraction.
    pub id: MessageId,

    /// `Date:` header as found in the message, not validated.
    pub date: String,

    /// Decoded `From:` header.
    pub sender: String,

    /// Decoded `Subject:` header.
    pub subject: String,

    /// Decoded attachment filenames in MIME traversal order.
    pub attachment_names: Vec<String>,

    pub category: Category,
}

impl MessageRecord {
    /// Number of attachments carried by the message.
    pub fn attachment_count(&self) -> usize {
        self.attachment_names.len()
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachment_names.is_empty()
    }

    /// Attachment names joined for a single report cell.
    pub fn attachment_list(&self) -> String {
        self.attachment_names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(names: &[&str]) -> MessageRecord {
        MessageRecord {
            id: MessageId::from(1u32),
            date: "Mon, 08 Jan 2024 10:00:00 +0100".into(),
            sender: "Ufficio <ufficio@pec.example.it>".into(),
            subject: "Fattura 12".into(),
            attachment_names: names.iter().map(|s| s.to_string()).collect(),
            category: Category::Invoices,
        }
    }

    #[test]
    fn test_attachment_count_matches_names() {
        let r = record(&["a.pdf", "b.xml"]);
        assert_eq!(r.attachment_count(), 2);
        assert!(r.has_attachments());
        assert_eq!(r.attachment_list(), "a.pdf, b.xml");
    }

    #[test]
    fn test_no_attachments() {
        let r = record(&[]);
        assert_eq!(r.attachment_count(), 0);
        assert!(!r.has_attachments());
        assert_eq!(r.attachment_list(), "");
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId::from(42u32).to_string(), "42");
        assert_eq!(MessageId::new("msg-1.eml").as_str(), "msg-1.eml");
    }
}
