//! In-memory mail session.
//!
//! Serves a fixed list of raw messages from a single folder. Used by the
//! directory source and by tests, which can also make connect or individual
//! fetches fail on purpose.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{PecError, Result};
use crate::model::record::MessageId;

use super::{Connector, MailSession, SearchFilter};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    raw: Vec<u8>,
    seen: bool,
}

/// A single-folder mailbox held in memory, in arrival order.
#[derive(Debug, Clone)]
pub struct MemoryMailbox {
    folder: String,
    messages: Vec<StoredMessage>,
    connect_error: Option<String>,
    broken: HashSet<MessageId>,
}

impl MemoryMailbox {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            messages: Vec::new(),
            connect_error: None,
            broken: HashSet::new(),
        }
    }

    /// Append a message; later pushes are newer.
    pub fn push(&mut self, id: impl Into<MessageId>, raw: Vec<u8>, seen: bool) {
        self.messages.push(StoredMessage {
            id: id.into(),
            raw,
            seen,
        });
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Make every connection attempt fail with `reason`.
    pub fn fail_connect(&mut self, reason: impl Into<String>) {
        self.connect_error = Some(reason.into());
    }

    /// Make fetching `id` fail, as if it was expunged after the search.
    pub fn fail_fetch(&mut self, id: impl Into<MessageId>) {
        self.broken.insert(id.into());
    }

    fn has_folder(&self, name: &str) -> bool {
        if self.folder.eq_ignore_ascii_case("INBOX") {
            name.eq_ignore_ascii_case("INBOX")
        } else {
            name == self.folder
        }
    }
}

/// Opens [`MemorySession`]s over a [`MemoryMailbox`].
pub struct MemoryConnector {
    mailbox: MemoryMailbox,
    fetches: Rc<Cell<usize>>,
}

impl MemoryConnector {
    pub fn new(mailbox: MemoryMailbox) -> Self {
        Self {
            mailbox,
            fetches: Rc::new(Cell::new(0)),
        }
    }

    /// Shared counter of successful and failed fetch calls across sessions.
    pub fn fetch_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.fetches)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<Box<dyn MailSession>> {
        if let Some(reason) = &self.mailbox.connect_error {
            return Err(PecError::Connection {
                server: self.describe(),
                reason: reason.clone(),
            });
        }
        Ok(Box::new(MemorySession {
            mailbox: self.mailbox.clone(),
            selected: false,
            fetches: Rc::clone(&self.fetches),
        }))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.mailbox.folder)
    }
}

/// Session over a private copy of a [`MemoryMailbox`].
pub struct MemorySession {
    mailbox: MemoryMailbox,
    selected: bool,
    fetches: Rc<Cell<usize>>,
}

impl MailSession for MemorySession {
    fn select(&mut self, folder: &str) -> Result<()> {
        if !self.mailbox.has_folder(folder) {
            return Err(PecError::FolderSelection {
                folder: folder.to_string(),
                reason: "no such folder".into(),
            });
        }
        self.selected = true;
        Ok(())
    }

    fn search(&mut self, filter: SearchFilter) -> Result<Vec<MessageId>> {
        Ok(self
            .mailbox
            .messages
            .iter()
            .filter(|m| filter == SearchFilter::All || !m.seen)
            .map(|m| m.id.clone())
            .collect())
    }

    fn fetch(&mut self, id: &MessageId) -> Result<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        let missing = || PecError::MessageFetch {
            id: id.clone(),
            reason: "no such message".into(),
        };
        if !self.selected || self.mailbox.broken.contains(id) {
            return Err(missing());
        }
        self.mailbox
            .messages
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.raw.clone())
            .ok_or_else(missing)
    }

    fn close(&mut self) -> Result<()> {
        self.selected = false;
        Ok(())
    }
}
