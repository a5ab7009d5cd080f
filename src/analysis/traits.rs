//! Analysis trait abstractions
//!
//! These traits define the interface for swappable analysis backends.
//! The pipeline only sees `Analyzer`; the MIDI implementation composes a
//! tempo detector and a key detector over a decoded timeline.

use crate::error::Result;
use crate::midi::Timeline;
use crate::types::{BpmResult, KeyResult, TrackAnalysis};

/// Tempo detection backend
pub trait TempoDetector: Send + Sync {
    /// Detect the tempo of a decoded timeline
    fn detect(&self, timeline: &Timeline) -> Result<BpmResult>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Musical key detection backend
pub trait KeyDetector: Send + Sync {
    /// Detect the musical key of a decoded timeline
    fn detect(&self, timeline: &Timeline) -> Result<KeyResult>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Full track analysis from raw file bytes
///
/// Implementations must be side-effect free and give the same answer for
/// the same bytes. A failure excludes the track from the batch.
pub trait Analyzer: Send + Sync {
    /// Analyze raw MIDI bytes; `source_name` is used for error context
    fn analyze(&self, content: &[u8], source_name: &str) -> Result<TrackAnalysis>;

    /// Get the name of this analyzer (for logging)
    fn name(&self) -> &'static str;
}
