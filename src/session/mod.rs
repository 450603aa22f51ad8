//! Mail session management.
//!
//! The transport is hidden behind two traits: a [`Connector`] opens an
//! authenticated [`MailSession`], and the session answers select / search /
//! fetch / close. [`SessionManager`] owns the one live session of a run and
//! enforces the call order.

pub mod directory;
pub mod imap;
pub mod memory;

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{PecError, Result};
use crate::model::record::MessageId;

/// Default number of most recent messages processed per run.
pub const DEFAULT_LIMIT: usize = 50;

/// Which messages a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    All,
    Unseen,
}

impl SearchFilter {
    pub fn from_unread_only(unread_only: bool) -> Self {
        if unread_only {
            Self::Unseen
        } else {
            Self::All
        }
    }
}

/// An authenticated connection to a mail store.
pub trait MailSession {
    /// Open a folder. Must succeed before `search` and `fetch`.
    fn select(&mut self, folder: &str) -> Result<()>;

    /// Identifiers matching `filter` in the selected folder, oldest first.
    fn search(&mut self, filter: SearchFilter) -> Result<Vec<MessageId>>;

    /// Raw RFC 5322 bytes of one message.
    fn fetch(&mut self, id: &MessageId) -> Result<Vec<u8>>;

    /// Release the connection.
    fn close(&mut self) -> Result<()>;
}

/// Something that can open a [`MailSession`]: holds server and credentials.
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn MailSession>>;

    /// Short human-readable description of the target (e.g. `user@server`).
    fn describe(&self) -> String;
}

/// Lifecycle of the transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    MailboxSelected,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::MailboxSelected => "mailbox-selected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Owns the connector and the live session for one run.
pub struct SessionManager {
    connector: Box<dyn Connector>,
    session: Option<Box<dyn MailSession>>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }

    /// Open the session. On failure the manager stays disconnected.
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        info!(target = %self.connector.describe(), "Connecting");
        let session = self.connector.connect()?;
        self.session = Some(session);
        self.state = SessionState::Connected;
        Ok(())
    }

    pub fn select_folder(&mut self, folder: &str) -> Result<()> {
        let session = self.live_session("select a folder")?;
        session.select(folder)?;
        self.state = SessionState::MailboxSelected;
        info!(folder, "Folder selected");
        Ok(())
    }

    /// Search the selected folder and keep the `limit` most recent identifiers.
    pub fn search(&mut self, filter: SearchFilter, limit: usize) -> Result<Vec<MessageId>> {
        self.require_selected("search")?;
        let session = self.live_session("search")?;
        let ids = session.search(filter)?;
        let found = ids.len();
        let ids = most_recent(ids, limit);
        debug!(?filter, found, kept = ids.len(), "Search complete");
        Ok(ids)
    }

    pub fn fetch(&mut self, id: &MessageId) -> Result<Vec<u8>> {
        self.require_selected("fetch")?;
        self.live_session("fetch")?.fetch(id)
    }

    /// Release the connection. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!(error = %e, "Error while closing session");
            }
            info!("Session closed");
        }
        self.state = SessionState::Closed;
    }

    fn require_selected(&self, operation: &'static str) -> Result<()> {
        if self.state == SessionState::MailboxSelected {
            Ok(())
        } else {
            Err(PecError::InvalidState {
                operation,
                state: format!("session {}", self.state),
            })
        }
    }

    fn live_session(&mut self, operation: &'static str) -> Result<&mut Box<dyn MailSession>> {
        let state = self.state;
        self.session.as_mut().ok_or_else(|| PecError::InvalidState {
            operation,
            state: format!("session {state}"),
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Keep the tail `limit` entries of an oldest-first list.
fn most_recent(mut ids: Vec<MessageId>, limit: usize) -> Vec<MessageId> {
    if ids.len() > limit {
        ids.drain(..ids.len() - limit);
    }
    ids
}
