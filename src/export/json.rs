//! JSON report: an array of row objects keyed by column name.

use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{PecError, Result};
use crate::model::record::MessageRecord;

use super::ReportSink;

/// Pretty-printed JSON array, one object per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReport;

#[derive(Serialize)]
struct Row<'a> {
    date: &'a str,
    category: &'static str,
    sender: &'a str,
    subject: &'a str,
    attachment_count: usize,
    attachment_names: &'a [String],
}

impl<'a> From<&'a MessageRecord> for Row<'a> {
    fn from(r: &'a MessageRecord) -> Self {
        Self {
            date: &r.date,
            category: r.category.label(),
            sender: &r.sender,
            subject: &r.subject,
            attachment_count: r.attachment_count(),
            attachment_names: &r.attachment_names,
        }
    }
}

impl ReportSink for JsonReport {
    fn write_report(&self, records: &[MessageRecord], path: &Path) -> Result<()> {
        let rows: Vec<Row<'_>> = records.iter().map(Row::from).collect();
        let export_error = |reason: String| PecError::ReportExport {
            path: path.to_path_buf(),
            reason,
        };

        let file = std::fs::File::create(path).map_err(|e| export_error(e.to_string()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &rows).map_err(|e| export_error(e.to_string()))?;
        out.write_all(b"\n")
            .and_then(|()| out.flush())
            .map_err(|e| export_error(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
