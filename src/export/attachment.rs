//! Save message attachments to disk.
//!
//! Files are never overwritten: a name that is already taken gets a counter
//! appended (`doc.pdf`, `doc_1.pdf`, `doc_2.pdf`, ...). The search stops at
//! `_100000`; past that the attachment fails with [`PecError::AttachmentWrite`].
//! A file whose write fails part-way is removed again.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{PecError, Result};
use crate::model::attachment::AttachmentFile;
use crate::parser::mime::{attachment_files, ParseLimits};

/// Longest file name produced, in characters.
const MAX_NAME_CHARS: usize = 200;

/// Upper bound on `stem_N` attempts before a name is given up on.
const MAX_COUNTER: u32 = 100_000;

/// What one call to [`extract_and_save`] produced.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    /// Paths written, in attachment order.
    pub written: Vec<PathBuf>,
    /// Total payload bytes written.
    pub bytes: u64,
    /// Attachments that could not be written. Extraction went on after each.
    pub failures: Vec<PecError>,
}

impl ExtractOutcome {
    pub fn count(&self) -> usize {
        self.written.len()
    }
}

/// Extract every attachment of `raw_message` into `output_dir`.
///
/// The directory is created first, even when the message turns out to have no
/// attachments. Failing to create it or to parse the message is an error; a
/// failure writing a single file is recorded in [`ExtractOutcome::failures`].
pub fn extract_and_save(
    raw_message: &[u8],
    output_dir: &Path,
    limits: &ParseLimits,
) -> Result<ExtractOutcome> {
    std::fs::create_dir_all(output_dir).map_err(|e| PecError::io(output_dir, e))?;
    let files = attachment_files(raw_message, limits)?;
    let mut outcome = ExtractOutcome::default();

    for file in &files {
        match save_attachment(file, output_dir) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), bytes = file.size(), "Saved attachment");
                outcome.bytes += file.size();
                outcome.written.push(path);
            }
            Err(e) => {
                tracing::warn!(filename = %file.filename, error = %e, "Failed to save attachment");
                outcome.failures.push(e);
            }
        }
    }

    Ok(outcome)
}

/// Write one attachment under a free name in `output_dir`.
pub fn save_attachment(file: &AttachmentFile, output_dir: &Path) -> Result<PathBuf> {
    let name = sanitize_attachment_name(&file.filename);
    let (path, handle) = create_unique(output_dir, &name)?;
    write_or_remove(&path, handle, &file.data)?;
    Ok(path)
}

/// Write `data` through `writer`, which was just created at `path`. On
/// failure the partial file is deleted.
fn write_or_remove<W: Write>(path: &Path, mut writer: W, data: &[u8]) -> Result<()> {
    let written = writer.write_all(data).and_then(|()| writer.flush());
    drop(writer);
    written.map_err(|source| {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial attachment");
        }
        PecError::AttachmentWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Create `dir/name`, or the first free `stem_N.ext` variant.
///
/// Uses `create_new`, so the existence check and the creation are one step
/// and an existing file is never truncated.
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, std::fs::File)> {
    let (stem, ext) = split_name(name);
    for n in 0..=MAX_COUNTER {
        let candidate = match (n, ext) {
            (0, _) => dir.join(name),
            (_, Some(ext)) => dir.join(format!("{stem}_{n}.{ext}")),
            (_, None) => dir.join(format!("{stem}_{n}")),
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(handle) => return Ok((candidate, handle)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => {
                return Err(PecError::AttachmentWrite {
                    path: candidate,
                    source,
                })
            }
        }
    }
    Err(PecError::AttachmentWrite {
        path: dir.join(name),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    })
}

/// Split `report.final.pdf` into `("report.final", Some("pdf"))`.
///
/// A leading dot does not start an extension: `.bashrc` has none.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

/// Turn a decoded attachment name into a single safe path component.
///
/// Path separators, control characters and characters reserved on Windows
/// become `_`; `""`, `.` and `..` become `attachment`.
pub fn sanitize_attachment_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = truncate_keeping_extension(&cleaned, MAX_NAME_CHARS);
    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}

fn truncate_keeping_extension(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    match split_name(name) {
        (stem, Some(ext)) if ext.chars().count() < max_chars / 2 => {
            let keep = max_chars - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{stem}.{ext}")
        }
        _ => name.chars().take(max_chars).collect(),
    }
}
