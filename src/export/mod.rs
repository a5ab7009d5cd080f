//! Packaging of batch results: zip archive, CSV summary, JSON report

pub mod archive;
pub mod json;
pub mod summary;

pub use archive::{build_archive, SUMMARY_FILE_NAME};
pub use json::{build_report, write_json, BatchReport};
pub use summary::write_summary_csv;

use crate::error::{MuprepError, Result};
use crate::types::{OutputArtifact, OutputMode, SummaryRow};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// File name of the JSON batch report
pub const REPORT_FILE_NAME: &str = "muprep.json";

/// Package a batch in the requested mode
pub fn package(artifacts: &[OutputArtifact], summary: &[SummaryRow], mode: OutputMode) -> Result<Vec<u8>> {
    let csv = write_summary_csv(summary)?;
    match mode {
        OutputMode::Tabular => Ok(csv),
        OutputMode::Archive => build_archive(artifacts, &csv),
    }
}

/// Download name for a packaged batch
pub fn package_file_name(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::Archive => "midi_mashups.zip",
        OutputMode::Tabular => "mashups.csv",
    }
}

/// MIME type for a packaged batch
pub fn package_content_type(mode: OutputMode) -> &'static str {
    match mode {
        OutputMode::Archive => "application/zip",
        OutputMode::Tabular => "text/csv",
    }
}

/// Write bytes through a temp file in the same directory, then rename
pub fn write_atomic(bytes: &[u8], output_path: &Path) -> Result<()> {
    let dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| MuprepError::output_error(output_path, e))?;

    temp.write_all(bytes)
        .map_err(|e| MuprepError::output_error(output_path, e))?;

    temp.persist(output_path)
        .map_err(|e| MuprepError::output_error(output_path, e.error))?;

    info!("Wrote {} bytes to {}", bytes.len(), output_path.display());
    Ok(())
}
