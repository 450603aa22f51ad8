//! Ingestion pipeline.
//!
//! One [`Pipeline`] drives one run, strictly in order:
//! connect → select folder → fetch emails → download attachments → export →
//! close. Each step requires the previous one; calling a step too early or
//! after [`Pipeline::close`] returns [`PecError::InvalidState`]. Per-message
//! and per-attachment failures are reported as events and skipped.

pub mod events;

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::categorize::Categorizer;
use crate::error::{PecError, Result};
use crate::export::attachment::extract_and_save;
use crate::export::ReportSink;
use crate::model::record::{MessageId, MessageRecord};
use crate::parser::mime::{parse_message, ParseLimits};
use crate::session::{Connector, SearchFilter, SessionManager};
use crate::stats::{summarize, Summary};

pub use events::{from_fn, EventSink, PipelineEvent, TracingSink};

/// Progress of a run. Ordered: a later state satisfies every earlier
/// prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Idle,
    Connected,
    FolderSelected,
    Ingested,
    AttachmentsExtracted,
    ReportExported,
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::FolderSelected => "folder-selected",
            Self::Ingested => "ingested",
            Self::AttachmentsExtracted => "attachments-extracted",
            Self::ReportExported => "report-exported",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Outcome of [`Pipeline::fetch_emails`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Identifiers tried.
    pub attempted: usize,
    /// Records appended.
    pub ingested: usize,
    /// Identifiers skipped because fetch or parse failed.
    pub failed: usize,
}

/// Orchestrates session, parser, categorizer, extractor and report.
pub struct Pipeline {
    session: SessionManager,
    categorizer: Categorizer,
    limits: ParseLimits,
    cache: Option<LruCache<MessageId, Vec<u8>>>,
    records: Vec<MessageRecord>,
    state: PipelineState,
    events: Box<dyn EventSink>,
}

impl Pipeline {
    /// A pipeline with the built-in rules, default limits, no raw cache and
    /// events logged through `tracing`.
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            session: SessionManager::new(connector),
            categorizer: Categorizer::default(),
            limits: ParseLimits::default(),
            cache: None,
            records: Vec::new(),
            state: PipelineState::Idle,
            events: Box::new(TracingSink),
        }
    }

    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Keep up to `capacity` raw messages from ingestion so attachment
    /// extraction does not fetch them again. 0 disables the cache.
    pub fn with_raw_cache(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(LruCache::new);
        self
    }

    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Records ingested so far, in ingestion order.
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Statistics over the current records.
    pub fn summary(&self) -> Summary {
        summarize(&self.records)
    }

    /// Open the mail session. On failure the pipeline stays idle.
    pub fn connect(&mut self) -> Result<()> {
        self.require(PipelineState::Idle, "connect")?;
        self.session.connect()?;
        self.advance(PipelineState::Connected);
        let target = self.session.describe();
        self.events
            .emit(&PipelineEvent::Connected { target: &target });
        Ok(())
    }

    /// Select the folder to ingest from. The folder may be changed until
    /// the first [`Pipeline::fetch_emails`]; after that the stored ids belong
    /// to it and another selection is rejected.
    pub fn select_folder(&mut self, folder: &str) -> Result<()> {
        self.require(PipelineState::Connected, "select a folder")?;
        if self.state > PipelineState::FolderSelected {
            return Err(self.invalid_state("select a folder"));
        }
        self.session.select_folder(folder)?;
        self.advance(PipelineState::FolderSelected);
        self.events.emit(&PipelineEvent::FolderSelected { folder });
        Ok(())
    }

    /// Ingest the `limit` most recent messages (only unseen ones if
    /// `unread_only`).
    ///
    /// Each message is fetched, parsed and categorized on its own; one that
    /// fails is counted in [`IngestSummary::failed`] and left out of the
    /// records. Messages already ingested by an earlier call are not tried
    /// again. A failing search is returned as an error.
    pub fn fetch_emails(&mut self, limit: usize, unread_only: bool) -> Result<IngestSummary> {
        self.require(PipelineState::FolderSelected, "fetch emails")?;

        let known: HashSet<&MessageId> = self.records.iter().map(|r| &r.id).collect();
        let ids: Vec<MessageId> = self
            .session
            .search(SearchFilter::from_unread_only(unread_only), limit)?
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect();

        let total = ids.len();
        self.events
            .emit(&PipelineEvent::SearchResults { count: total });

        let mut summary = IngestSummary::default();
        for (i, id) in ids.iter().enumerate() {
            summary.attempted += 1;
            match self.ingest_one(id) {
                Ok(record) => {
                    summary.ingested += 1;
                    self.records.push(record);
                    if let Some(record) = self.records.last() {
                        self.events.emit(&PipelineEvent::MessageIngested {
                            index: i + 1,
                            total,
                            record,
                        });
                    }
                }
                Err(error) => {
                    summary.failed += 1;
                    self.events.emit(&PipelineEvent::MessageFailed {
                        index: i + 1,
                        total,
                        id,
                        error: &error,
                    });
                }
            }
        }

        self.advance(PipelineState::Ingested);
        Ok(summary)
    }

    fn ingest_one(&mut self, id: &MessageId) -> Result<MessageRecord> {
        let raw = self.session.fetch(id)?;
        let parsed = parse_message(&raw, &self.limits).map_err(|e| e.with_message_id(id))?;
        let category = self.categorizer.categorize(&parsed.subject, &parsed.sender);
        debug!(id = %id, bytes = raw.len(), %category, "Parsed message");

        // Extraction reads back only messages with attachments.
        if !parsed.attachments.is_empty() {
            if let Some(cache) = self.cache.as_mut() {
                cache.put(id.clone(), raw);
            }
        }

        Ok(MessageRecord {
            id: id.clone(),
            date: parsed.date,
            sender: parsed.sender,
            subject: parsed.subject,
            attachment_names: parsed.attachments,
            category,
        })
    }

    /// Save the attachments of every ingested record into `output_dir`.
    ///
    /// Raw messages come from the cache when present, otherwise they are
    /// fetched again by id. Records without attachments are skipped. Returns
    /// the number of files written.
    pub fn download_attachments(&mut self, output_dir: &Path) -> Result<usize> {
        self.require(PipelineState::Ingested, "download attachments")?;
        std::fs::create_dir_all(output_dir).map_err(|e| PecError::io(output_dir, e))?;

        let pending: Vec<MessageId> = self
            .records
            .iter()
            .filter(|r| r.has_attachments())
            .map(|r| r.id.clone())
            .collect();

        let mut written = 0;
        for id in &pending {
            let raw = match self.raw_message(id) {
                Ok(raw) => raw,
                Err(error) => {
                    self.events
                        .emit(&PipelineEvent::AttachmentFailed { id, error: &error });
                    continue;
                }
            };

            let outcome = match extract_and_save(&raw, output_dir, &self.limits) {
                Ok(outcome) => outcome,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    let error = error.with_message_id(id);
                    self.events
                        .emit(&PipelineEvent::AttachmentFailed { id, error: &error });
                    continue;
                }
            };

            for error in &outcome.failures {
                self.events
                    .emit(&PipelineEvent::AttachmentFailed { id, error });
            }
            if outcome.count() > 0 {
                self.events.emit(&PipelineEvent::AttachmentsSaved {
                    id,
                    files: outcome.count(),
                    bytes: outcome.bytes,
                });
            }
            written += outcome.count();
        }

        self.advance(PipelineState::AttachmentsExtracted);
        Ok(written)
    }

    fn raw_message(&mut self, id: &MessageId) -> Result<Vec<u8>> {
        if let Some(raw) = self.cache.as_mut().and_then(|c| c.pop(id)) {
            debug!(id = %id, "Raw message served from cache");
            return Ok(raw);
        }
        self.session.fetch(id)
    }

    /// Write the report to `path` and return the run statistics.
    ///
    /// A failed export leaves the records and the state untouched, so the
    /// caller may retry with another path or sink.
    pub fn export(&mut self, sink: &dyn ReportSink, path: &Path) -> Result<Summary> {
        self.require(PipelineState::Ingested, "export the report")?;
        sink.write_report(&self.records, path)?;
        self.advance(PipelineState::ReportExported);

        self.events.emit(&PipelineEvent::ReportExported {
            path,
            rows: self.records.len(),
        });
        let summary = self.summary();
        self.events.emit(&PipelineEvent::Summary(&summary));
        Ok(summary)
    }

    /// Release the session. Valid in any state; always ends in `Closed`.
    pub fn close(&mut self) {
        if self.state == PipelineState::Closed {
            return;
        }
        self.session.close();
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.state = PipelineState::Closed;
        self.events.emit(&PipelineEvent::Closed);
    }

    fn require(&self, required: PipelineState, operation: &'static str) -> Result<()> {
        if self.state == PipelineState::Closed || self.state < required {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> PecError {
        PecError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    fn advance(&mut self, to: PipelineState) {
        self.state = self.state.max(to);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}
