//! File discovery and song naming

use crate::error::{MuprepError, Result};
use crate::types::{MidiFormat, TrackInput};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Id used when a file name has nothing left after cleaning
pub const FALLBACK_ID: &str = "untitled";

/// Discovered MIDI file with basic metadata
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: MidiFormat,
    pub size_bytes: u64,
}

impl DiscoveredFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Scan a path (file or directory) for MIDI files
///
/// Results are sorted by path so a batch is processed in the same order on
/// every run.
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(MuprepError::FileNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();

    if input.is_file() {
        // Single file mode
        if let Some(file) = try_discover_file(input) {
            files.push(file);
        } else {
            return Err(MuprepError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
    } else if input.is_dir() {
        let walker = if recursive {
            WalkDir::new(input)
        } else {
            WalkDir::new(input).max_depth(1)
        };

        for entry in walker.sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                if let Some(file) = try_discover_file(path) {
                    debug!("Discovered: {}", file.path.display());
                    files.push(file);
                }
            }
        }
    }

    info!("Discovered {} MIDI files", files.len());

    if files.is_empty() {
        warn!("No supported MIDI files found in {}", input.display());
    }

    Ok(files)
}

/// Try to create a DiscoveredFile if the path is a supported MIDI file
fn try_discover_file(path: &Path) -> Option<DiscoveredFile> {
    let ext = path.extension()?.to_str()?;
    let format = MidiFormat::from_extension(ext)?;

    let metadata = std::fs::metadata(path).ok()?;

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        format,
        size_bytes: metadata.len(),
    })
}

/// Read discovered files into memory
///
/// Unreadable files are logged and left out, like any other per-track
/// failure.
pub fn read_inputs(files: &[DiscoveredFile]) -> Vec<TrackInput> {
    files
        .iter()
        .filter_map(|file| match std::fs::read(&file.path) {
            Ok(bytes) => Some(TrackInput::new(file.file_name(), bytes)),
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                None
            }
        })
        .collect()
}

/// Derive a song id from a file name
///
/// Takes the base name without extension, drops everything except word
/// characters, whitespace and hyphens, trims, and turns spaces into
/// underscores.
pub fn clean_name(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(i) if base[..i].chars().any(|c| c != '.') => &base[..i],
        _ => base,
    };

    let kept: String = stem
        .chars()
        .filter(|&c| c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace())
        .collect();

    kept.trim().replace(' ', "_")
}

/// Make ids unique within a batch
///
/// The first occurrence keeps its id; later ones get `_2`, `_3`, ... in
/// input order. Empty ids become `untitled`.
pub fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let ids: Vec<&str> = ids
        .into_iter()
        .map(|id| if id.is_empty() { FALLBACK_ID } else { id })
        .collect();

    let mut taken: HashSet<String> = HashSet::with_capacity(ids.len());
    let mut out = Vec::with_capacity(ids.len());

    for id in ids {
        let mut candidate = id.to_string();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", id, n);
            n += 1;
        }
        if candidate != id {
            debug!("Renamed duplicate song id {} to {}", id, candidate);
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }

    out
}
