//! Centralized error types for pecbox.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::record::MessageId;

/// All errors produced by the pecbox library.
#[derive(Error, Debug)]
pub enum PecError {
    /// The mail server is unreachable or rejected the credentials.
    #[error("Connection to '{server}' failed: {reason}")]
    Connection { server: String, reason: String },

    /// The requested folder does not exist or cannot be opened.
    #[error("Cannot select folder '{folder}': {reason}")]
    FolderSelection { folder: String, reason: String },

    /// A single message could not be retrieved.
    #[error("Failed to fetch message {id}: {reason}")]
    MessageFetch { id: MessageId, reason: String },

    /// A single message could not be parsed.
    #[error("Failed to parse message{}: {reason}", .id.as_ref().map(|i| format!(" {i}")).unwrap_or_default())]
    MessageParse {
        id: Option<MessageId>,
        reason: String,
    },

    /// One attachment could not be written to disk.
    #[error("Failed to write attachment '{}': {source}", .path.display())]
    AttachmentWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The report file could not be produced.
    #[error("Failed to export report '{}': {reason}", .path.display())]
    ReportExport { path: PathBuf, reason: String },

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was called before its prerequisite step, or after close.
    #[error("Cannot {operation} while the pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// I/O error with the associated file path.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, PecError>`.
pub type Result<T> = std::result::Result<T, PecError>;

impl PecError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a message id to a parse error that was raised without one.
    pub fn with_message_id(self, message_id: &MessageId) -> Self {
        match self {
            Self::MessageParse { id: None, reason } => Self::MessageParse {
                id: Some(message_id.clone()),
                reason,
            },
            other => other,
        }
    }

    /// `true` for errors that end the run; `false` for per-message and
    /// per-attachment failures the pipeline skips over.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MessageFetch { .. } | Self::MessageParse { .. } | Self::AttachmentWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors_are_not_fatal() {
        let fetch = PecError::MessageFetch {
            id: MessageId::from("7"),
            reason: "gone".into(),
        };
        assert!(!fetch.is_fatal());

        let write = PecError::AttachmentWrite {
            path: PathBuf::from("out/a.pdf"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!write.is_fatal());
    }

    #[test]
    fn test_session_errors_are_fatal() {
        let conn = PecError::Connection {
            server: "imap.example.com".into(),
            reason: "refused".into(),
        };
        assert!(conn.is_fatal());
        assert!(PecError::Config("missing server".into()).is_fatal());
    }

    #[test]
    fn test_with_message_id_fills_parse_errors_only() {
        let id = MessageId::from("42");
        let err = PecError::MessageParse {
            id: None,
            reason: "empty".into(),
        }
        .with_message_id(&id);
        assert_eq!(err.to_string(), "Failed to parse message 42: empty");

        let other = PecError::Config("x".into()).with_message_id(&id);
        assert!(matches!(other, PecError::Config(_)));
    }
}
