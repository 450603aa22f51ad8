//! Progress notifications emitted by the pipeline.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::PecError;
use crate::model::record::{MessageId, MessageRecord};
use crate::stats::Summary;

/// Something that happened during a run.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    Connected {
        target: &'a str,
    },
    FolderSelected {
        folder: &'a str,
    },
    /// Identifiers kept after the search and the limit.
    SearchResults {
        count: usize,
    },
    /// `index` is 1-based.
    MessageIngested {
        index: usize,
        total: usize,
        record: &'a MessageRecord,
    },
    MessageFailed {
        index: usize,
        total: usize,
        id: &'a MessageId,
        error: &'a PecError,
    },
    AttachmentsSaved {
        id: &'a MessageId,
        files: usize,
        bytes: u64,
    },
    AttachmentFailed {
        id: &'a MessageId,
        error: &'a PecError,
    },
    ReportExported {
        path: &'a Path,
        rows: usize,
    },
    Summary(&'a Summary),
    Closed,
}

/// Receives [`PipelineEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: &PipelineEvent<'_>);
}

/// Sink calling a closure, see [`from_fn`].
pub struct FnSink<F>(F);

/// Wrap a closure as an [`EventSink`].
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(&PipelineEvent<'_>),
{
    FnSink(f)
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(&PipelineEvent<'_>),
{
    fn emit(&mut self, event: &PipelineEvent<'_>) {
        (self.0)(event)
    }
}

/// Default sink: every event becomes a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::Connected { target } => info!(target = %target, "Connected"),
            PipelineEvent::FolderSelected { folder } => info!(folder = %folder, "Folder selected"),
            PipelineEvent::SearchResults { count } => info!(count, "Messages to process"),
            PipelineEvent::MessageIngested {
                index,
                total,
                record,
            } => debug!(
                index,
                total,
                id = %record.id,
                category = %record.category,
                attachments = record.attachment_count(),
                "Message ingested"
            ),
            PipelineEvent::MessageFailed {
                index,
                total,
                id,
                error,
            } => warn!(index, total, id = %id, error = %error, "Message skipped"),
            PipelineEvent::AttachmentsSaved { id, files, bytes } => {
                debug!(id = %id, files, bytes, "Attachments saved")
            }
            PipelineEvent::AttachmentFailed { id, error } => {
                warn!(id = %id, error = %error, "Attachment not saved")
            }
            PipelineEvent::ReportExported { path, rows } => {
                info!(path = %path.display(), rows, "Report exported")
            }
            PipelineEvent::Summary(summary) => info!(
                total = summary.total,
                with_attachments = summary.with_attachments,
                "Run summary"
            ),
            PipelineEvent::Closed => info!("Pipeline closed"),
        }
    }
}

/// Forwards to two sinks in turn.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: &PipelineEvent<'_>) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
