//! Output artifacts: the tabular run report and the attachment folder.

pub mod attachment;
pub mod csv;
pub mod json;

use std::path::{Path, PathBuf};

use crate::config::ReportFormat;
use crate::error::Result;
use crate::model::record::MessageRecord;

/// Report columns, in order.
pub const REPORT_COLUMNS: [&str; 6] = [
    "date",
    "category",
    "sender",
    "subject",
    "attachment_count",
    "attachment_names",
];

/// Writes the records of one run to a single file.
///
/// Records arrive in ingestion order and must be written in that order. An
/// existing file at `path` is replaced.
pub trait ReportSink {
    fn write_report(&self, records: &[MessageRecord], path: &Path) -> Result<()>;

    /// File extension used for generated report names.
    fn extension(&self) -> &'static str;
}

/// The sink for a configured format.
pub fn sink_for(format: ReportFormat) -> Box<dyn ReportSink> {
    match format {
        ReportFormat::Csv => Box::new(csv::CsvReport),
        ReportFormat::Json => Box::new(json::JsonReport),
    }
}

/// `report_pec_<YYYYmmdd_HHMMSS>.<ext>` under `dir`, stamped with local time.
pub fn default_report_path(dir: &Path, extension: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("report_pec_{stamp}.{extension}"))
}
