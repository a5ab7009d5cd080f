//! JSON batch report for interoperability with other tools

use crate::error::{MuprepError, Result};
use crate::mashup::EntryRecord;
use crate::pipeline::{BatchStats, MashupBatch, TrackFailure};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize)]
pub struct BatchReport {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    pub stats: BatchStats,
    pub songs: Vec<SongJson>,
    pub entries: Vec<EntryJson>,
    pub failures: Vec<TrackFailure>,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    /// muprep version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
}

#[derive(Debug, Serialize)]
pub struct SongJson {
    pub id: String,
    pub source_name: String,
    pub artist: String,
    pub key: String,
    pub bpm: f64,
    pub notes: usize,
    pub duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct EntryJson {
    #[serde(flatten)]
    pub record: EntryRecord,
    pub paths: Vec<String>,
}

/// Assemble the report for a finished batch
pub fn build_report(batch: &MashupBatch) -> BatchReport {
    let songs = batch
        .songs
        .iter()
        .map(|song| SongJson {
            id: song.id.clone(),
            source_name: song.source_name.clone(),
            artist: song.artist.clone(),
            key: song.key_tonic.clone(),
            bpm: song.original_bpm(),
            notes: song.timeline.note_count(),
            duration_seconds: song.timeline.duration(),
        })
        .collect();

    // Summary rows line up one-to-one with entries
    let entries = batch
        .entries
        .iter()
        .zip(&batch.summary)
        .map(|(entry, row)| EntryJson {
            record: entry.record(),
            paths: std::iter::once(row.song_a.path.clone())
                .chain(row.song_b.as_ref().map(|b| b.path.clone()))
                .collect(),
        })
        .collect();

    BatchReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
        },
        stats: batch.stats.clone(),
        songs,
        entries,
        failures: batch.failures.clone(),
    }
}

/// Write the batch report to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
pub fn write_json(batch: &MashupBatch, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| MuprepError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let writer = BufWriter::new(file);
    let report = build_report(batch);

    serde_json::to_writer_pretty(writer, &report).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MuprepError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MuprepError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!(
        "Wrote report for {} songs to {}",
        report.songs.len(),
        output_path.display()
    );

    Ok(())
}
