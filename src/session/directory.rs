//! Offline source: a directory of `.eml` files.
//!
//! Each `*.eml` file is one message of the `INBOX` folder, ordered by file
//! name and identified by it. Files carry no flags, so every message counts as
//! unseen.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PecError, Result};

use super::memory::{MemoryConnector, MemoryMailbox};
use super::{Connector, MailSession};

/// Connector that snapshots a directory of `.eml` files at connect time.
pub struct DirectoryConnector {
    dir: PathBuf,
}

impl DirectoryConnector {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> std::io::Result<MemoryMailbox> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_eml(p))
            .collect();
        paths.sort();

        let mut mailbox = MemoryMailbox::new("INBOX");
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let raw = std::fs::read(&path)?;
            debug!(file = name, bytes = raw.len(), "Loaded message file");
            mailbox.push(name, raw, false);
        }
        Ok(mailbox)
    }
}

impl Connector for DirectoryConnector {
    fn connect(&self) -> Result<Box<dyn MailSession>> {
        let mailbox = self.load().map_err(|e| PecError::Connection {
            server: self.describe(),
            reason: e.to_string(),
        })?;
        MemoryConnector::new(mailbox).connect()
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
}
