//! Attachment payloads.
//!
//! Only filenames are kept on [`MessageRecord`](super::record::MessageRecord).
//! Payloads are decoded again from the raw message at extraction time.

/// A single attachment payload taken from one MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    /// Decoded filename as declared by the part (not yet sanitized).
    pub filename: String,

    /// Transfer-decoded payload, written to disk verbatim.
    pub data: Vec<u8>,
}

impl AttachmentFile {
    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
