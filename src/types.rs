//! Core data types for muprep
//!
//! These types represent the domain model and flow through the pipeline.

use crate::midi::Timeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// Convert from numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn from_index(index: u8) -> Self {
        match index % 12 {
            0 => PitchClass::C,
            1 => PitchClass::Cs,
            2 => PitchClass::D,
            3 => PitchClass::Ds,
            4 => PitchClass::E,
            5 => PitchClass::F,
            6 => PitchClass::Fs,
            7 => PitchClass::G,
            8 => PitchClass::Gs,
            9 => PitchClass::A,
            10 => PitchClass::As,
            _ => PitchClass::B,
        }
    }

    /// Standard notation (e.g., "C", "F#")
    pub fn to_standard_notation(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

// =============================================================================
// Analysis results
// =============================================================================

/// How a tempo value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoSource {
    /// Read from the file's first tempo meta event
    TempoEvent,
    /// Estimated from note onset spacing
    OnsetEstimate,
}

/// BPM analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpmResult {
    /// Detected BPM in whole beats per minute
    pub value: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Where the value came from
    pub source: TempoSource,
}

/// Musical key analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyResult {
    /// Detected pitch class (C, C#, D, etc.)
    pub pitch_class: PitchClass,
    /// Major or Minor
    pub mode: Mode,
    /// Correlation of the winning key profile (-1.0 - 1.0)
    pub confidence: f64,
}

impl KeyResult {
    /// Key tonic as used for grouping: upper-case for major, lower-case for minor
    pub fn tonic(&self) -> String {
        let name = self.pitch_class.to_standard_notation();
        match self.mode {
            Mode::Major => name.to_string(),
            Mode::Minor => name.to_lowercase(),
        }
    }
}

/// Everything the Analyzer learns about one MIDI file
#[derive(Debug, Clone)]
pub struct TrackAnalysis {
    pub bpm: BpmResult,
    pub key: KeyResult,
    /// Decoded timeline, kept so the track can be rescaled without re-parsing
    pub timeline: Timeline,
}

// =============================================================================
// Track representation
// =============================================================================

/// Raw file submitted to a batch
#[derive(Debug, Clone)]
pub struct TrackInput {
    /// File name as uploaded or discovered, used for the song id
    pub file_name: String,
    pub content: Arc<[u8]>,
}

impl TrackInput {
    pub fn new(file_name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Artist shown for songs whose name carries no "Artist-Title" hyphen
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// An analyzed track, read-only once created
///
/// Songs are shared between key groups and pairs behind an `Arc`; the
/// tempo captured at analysis time is never overwritten. Any tempo used
/// for scaling downstream is derived from it.
#[derive(Debug, Clone)]
pub struct Song {
    /// Sanitized name derived from the file name
    pub id: String,
    /// Substring of `id` before the first hyphen, or "Unknown"
    pub artist: String,
    /// Detected key tonic (grouping key)
    pub key_tonic: String,
    /// Detected tempo
    pub detected_bpm: f64,
    original_bpm: f64,
    /// File name the song was uploaded or discovered as
    pub source_name: String,
    /// Untouched MIDI bytes
    pub content: Arc<[u8]>,
    /// Decoded timeline of `content`
    pub timeline: Arc<Timeline>,
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        source_name: impl Into<String>,
        content: Arc<[u8]>,
        analysis: TrackAnalysis,
    ) -> Self {
        let id = id.into();
        let artist = artist_from_id(&id);
        Self {
            artist,
            key_tonic: analysis.key.tonic(),
            detected_bpm: analysis.bpm.value,
            original_bpm: analysis.bpm.value,
            source_name: source_name.into(),
            content,
            timeline: Arc::new(analysis.timeline),
            id,
        }
    }

    /// Tempo detected at analysis time
    pub fn original_bpm(&self) -> f64 {
        self.original_bpm
    }
}

fn artist_from_id(id: &str) -> String {
    match id.split_once('-') {
        Some((artist, _)) => artist.to_string(),
        None => UNKNOWN_ARTIST.to_string(),
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Which packaging the Archiver produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum OutputMode {
    /// Zip archive with every artifact and the summary CSV
    Archive,
    /// Summary CSV only
    Tabular,
}

impl OutputMode {
    /// Parse the request's `output_format` field.
    ///
    /// `csv` and `tabular` select the tabular export; anything else falls
    /// back to the archive.
    pub fn from_request_field(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "csv" | "tabular" => OutputMode::Tabular,
            _ => OutputMode::Archive,
        }
    }
}

/// A file to place in the packaged output
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub content: Arc<[u8]>,
    /// Path relative to the archive root
    pub archive_path: String,
}

/// Summary CSV column names, in order
pub const SUMMARY_COLUMNS: [&str; 10] = [
    "Song A Title",
    "Song A Artist",
    "Song A Key",
    "Song A Tempo",
    "Song A Path",
    "Song B Title",
    "Song B Artist",
    "Song B Key",
    "Song B Tempo",
    "Song B Path",
];

/// One side of a summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySide {
    pub title: String,
    pub artist: String,
    pub key: String,
    pub tempo: f64,
    pub path: String,
}

/// Flattened view of a pair or solo entry for tabular export
///
/// Solo entries leave `song_b` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub song_a: SummarySide,
    pub song_b: Option<SummarySide>,
}

// =============================================================================
// Supported formats
// =============================================================================

/// Input formats muprep accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiFormat {
    Mid,
    Midi,
}

impl MidiFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mid" => Some(MidiFormat::Mid),
            "midi" => Some(MidiFormat::Midi),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(bpm: f64, pitch_class: PitchClass, mode: Mode) -> TrackAnalysis {
        TrackAnalysis {
            bpm: BpmResult {
                value: bpm,
                confidence: 1.0,
                source: TempoSource::TempoEvent,
            },
            key: KeyResult {
                pitch_class,
                mode,
                confidence: 0.9,
            },
            timeline: Timeline::default(),
        }
    }

    #[test]
    fn test_tonic_case_follows_mode() {
        let major = analysis(120.0, PitchClass::Fs, Mode::Major);
        let minor = analysis(120.0, PitchClass::Fs, Mode::Minor);
        assert_eq!(major.key.tonic(), "F#");
        assert_eq!(minor.key.tonic(), "f#");
    }

    #[test]
    fn test_song_artist_from_hyphen() {
        let content: Arc<[u8]> = Arc::from(Vec::new());
        let song = Song::new(
            "Daft_Punk-One_More_Time",
            "Daft Punk-One More Time.mid",
            content.clone(),
            analysis(123.0, PitchClass::C, Mode::Major),
        );
        assert_eq!(song.artist, "Daft_Punk");
        assert_eq!(song.key_tonic, "C");
        assert_eq!(song.original_bpm(), 123.0);
        assert_eq!(song.detected_bpm, 123.0);

        let anonymous = Song::new("Untitled", "Untitled.mid", content, analysis(90.0, PitchClass::A, Mode::Minor));
        assert_eq!(anonymous.artist, UNKNOWN_ARTIST);
        assert_eq!(anonymous.key_tonic, "a");
    }

    #[test]
    fn test_output_mode_from_request() {
        assert_eq!(OutputMode::from_request_field("csv"), OutputMode::Tabular);
        assert_eq!(OutputMode::from_request_field("Tabular"), OutputMode::Tabular);
        assert_eq!(OutputMode::from_request_field("filesystem"), OutputMode::Archive);
        assert_eq!(OutputMode::from_request_field(""), OutputMode::Archive);
    }

    #[test]
    fn test_midi_format_detection() {
        assert_eq!(MidiFormat::from_extension("MID"), Some(MidiFormat::Mid));
        assert_eq!(MidiFormat::from_extension("midi"), Some(MidiFormat::Midi));
        assert_eq!(MidiFormat::from_extension("mp3"), None);
    }
}
