//! CSV report.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PecError, Result};
use crate::model::record::MessageRecord;

use super::{ReportSink, REPORT_COLUMNS};

/// RFC 4180 CSV with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReport;

impl ReportSink for CsvReport {
    fn write_report(&self, records: &[MessageRecord], path: &Path) -> Result<()> {
        write_csv(records, path).map_err(|e| PecError::ReportExport {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

fn write_csv(records: &[MessageRecord], path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);

    // UTF-8 BOM for Excel
    out.write_all(&[0xEF, 0xBB, 0xBF])?;
    writeln!(out, "{}", REPORT_COLUMNS.join(","))?;

    for record in records {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            csv_escape(&record.date),
            csv_escape(record.category.label()),
            csv_escape(&record.sender),
            csv_escape(&record.subject),
            record.attachment_count(),
            csv_escape(&record.attachment_list()),
        )?;
    }

    out.flush()
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
