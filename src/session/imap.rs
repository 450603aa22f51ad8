//! IMAP transport built on the `imap` crate.
//!
//! Messages are addressed by UID so identifiers stay valid between the
//! metadata pass and the extraction pass even if other clients expunge.

use imap::{ClientBuilder, ConnectionMode, TlsKind};
use tracing::{debug, info};

use crate::config::AccountConfig;
use crate::error::{PecError, Result};
use crate::model::record::MessageId;

use super::{Connector, MailSession, SearchFilter};

/// Fetch item that leaves the `\Seen` flag untouched.
const FETCH_PEEK: &str = "BODY.PEEK[]";
/// Fetch item that marks the message as read, like most mail clients.
const FETCH_MARK_SEEN: &str = "RFC822";

/// Opens TLS IMAP sessions for one account.
pub struct ImapConnector {
    account: AccountConfig,
    mark_seen: bool,
}

impl ImapConnector {
    /// Validate the account and build a connector. No network traffic yet.
    pub fn new(account: AccountConfig, mark_seen: bool) -> Result<Self> {
        account.validate()?;
        Ok(Self { account, mark_seen })
    }

    fn connection_error(&self, reason: impl ToString) -> PecError {
        PecError::Connection {
            server: self.describe(),
            reason: reason.to_string(),
        }
    }
}

impl Connector for ImapConnector {
    fn connect(&self) -> Result<Box<dyn MailSession>> {
        let account = &self.account;
        debug!(server = %account.server, port = account.port, "Opening IMAP connection");
        let client = ClientBuilder::new(account.server.as_str(), account.port)
            .tls_kind(TlsKind::Native)
            .mode(ConnectionMode::AutoTls)
            .danger_skip_tls_verify(account.skip_tls_verify)
            .connect()
            .map_err(|e| self.connection_error(e))?;

        let session = client
            .login(&account.address, &account.password)
            .map_err(|(e, _client)| self.connection_error(e))?;
        info!(address = %account.address, "IMAP login ok");

        Ok(Box::new(ImapSession {
            session,
            server: self.describe(),
            selected: None,
            fetch_item: if self.mark_seen {
                FETCH_MARK_SEEN
            } else {
                FETCH_PEEK
            },
        }))
    }

    fn describe(&self) -> String {
        format!(
            "{}@{}:{}",
            self.account.address, self.account.server, self.account.port
        )
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    session: imap::Session<imap::Connection>,
    server: String,
    selected: Option<String>,
    fetch_item: &'static str,
}

impl MailSession for ImapSession {
    fn select(&mut self, folder: &str) -> Result<()> {
        let mailbox = self
            .session
            .select(folder)
            .map_err(|e| PecError::FolderSelection {
                folder: folder.to_string(),
                reason: e.to_string(),
            })?;
        debug!(folder, exists = mailbox.exists, "IMAP folder selected");
        self.selected = Some(folder.to_string());
        Ok(())
    }

    fn search(&mut self, filter: SearchFilter) -> Result<Vec<MessageId>> {
        let query = match filter {
            SearchFilter::All => "ALL",
            SearchFilter::Unseen => "UNSEEN",
        };
        let uids = self
            .session
            .uid_search(query)
            .map_err(|e| PecError::FolderSelection {
                folder: self.selected.clone().unwrap_or_default(),
                reason: format!("UID SEARCH {query} failed: {e}"),
            })?;

        // UIDs grow with arrival order.
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids.into_iter().map(MessageId::from).collect())
    }

    fn fetch(&mut self, id: &MessageId) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| PecError::MessageFetch {
            id: id.clone(),
            reason,
        };
        let fetches = self
            .session
            .uid_fetch(id.as_str(), self.fetch_item)
            .map_err(|e| fetch_error(e.to_string()))?;
        fetches
            .iter()
            .find_map(|f| f.body().map(<[u8]>::to_vec))
            .ok_or_else(|| fetch_error("server returned no body (message expunged?)".into()))
    }

    fn close(&mut self) -> Result<()> {
        if self.selected.take().is_some() {
            self.session.close().map_err(|e| PecError::Connection {
                server: self.server.clone(),
                reason: e.to_string(),
            })?;
        }
        self.session.logout().map_err(|e| PecError::Connection {
            server: self.server.clone(),
            reason: e.to_string(),
        })
    }
}
