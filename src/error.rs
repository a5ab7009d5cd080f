//! Unified error types for muprep
//!
//! Error strategy:
//! - Per-track errors (decode, analysis): Recoverable, exclude the track and continue
//! - Batch errors (nothing submitted, nothing analyzable): Reported to the caller as a client error
//! - System errors (output, archive): Fatal, abort batch

use std::path::PathBuf;
use thiserror::Error;

/// Supported input formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MID, MIDI";

/// Top-level error type for muprep operations
#[derive(Debug, Error)]
pub enum MuprepError {
    // =========================================================================
    // Recoverable errors - exclude track, continue batch
    // =========================================================================
    #[error("Failed to decode MIDI file '{source_name}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}")]
    DecodeError { source_name: String, reason: String },

    #[error("Unsupported file format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Analysis failed for '{source_name}': {reason}")]
    AnalysisError { source_name: String, reason: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Batch errors - nothing to pair, reported to the caller
    // =========================================================================
    #[error("No tracks were submitted")]
    NoSubmittedTracks,

    #[error("None of the {submitted} submitted tracks could be analyzed")]
    NoAnalyzableTracks { submitted: usize },

    // =========================================================================
    // Fatal errors - abort entire batch
    // =========================================================================
    #[error("Invalid scaling factor {0}: must be finite and greater than zero")]
    InvalidScalingFactor(f64),

    #[error("Failed to encode MIDI for '{name}': {reason}")]
    EncodeError { name: String, reason: String },

    #[error("Failed to build archive: {reason}")]
    ArchiveError { reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Failed to write summary CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for muprep operations
pub type Result<T> = std::result::Result<T, MuprepError>;

impl MuprepError {
    /// Returns true if this error is recoverable (should exclude the track, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MuprepError::DecodeError { .. }
                | MuprepError::UnsupportedFormat { .. }
                | MuprepError::AnalysisError { .. }
                | MuprepError::FileNotFound(_)
        )
    }

    /// Returns true if the batch had nothing usable in it.
    ///
    /// These surface to clients as a request problem rather than a server fault.
    pub fn is_empty_batch(&self) -> bool {
        matches!(
            self,
            MuprepError::NoSubmittedTracks | MuprepError::NoAnalyzableTracks { .. }
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MuprepError::DecodeError {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create an analysis error for a named track
    pub fn analysis_error(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MuprepError::AnalysisError {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        MuprepError::OutputError { path, reason }
    }

    /// Attach a track name to decode/analysis errors raised without one
    pub fn for_source(self, name: &str) -> Self {
        match self {
            MuprepError::DecodeError { reason, .. } => MuprepError::DecodeError {
                source_name: name.to_string(),
                reason,
            },
            MuprepError::AnalysisError { reason, .. } => MuprepError::AnalysisError {
                source_name: name.to_string(),
                reason,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(MuprepError::decode_error("a.mid", "bad header").is_recoverable());
        assert!(MuprepError::analysis_error("a.mid", "no notes").is_recoverable());
        assert!(!MuprepError::NoSubmittedTracks.is_recoverable());
        assert!(!MuprepError::ArchiveError { reason: "x".into() }.is_recoverable());
    }

    #[test]
    fn test_empty_batch_classification() {
        assert!(MuprepError::NoSubmittedTracks.is_empty_batch());
        assert!(MuprepError::NoAnalyzableTracks { submitted: 3 }.is_empty_batch());
        assert!(!MuprepError::InvalidScalingFactor(0.0).is_empty_batch());
    }

    #[test]
    fn test_for_source_fills_name() {
        let err = MuprepError::analysis_error("", "no notes").for_source("song.mid");
        match err {
            MuprepError::AnalysisError { source_name, reason } => {
                assert_eq!(source_name, "song.mid");
                assert_eq!(reason, "no notes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
