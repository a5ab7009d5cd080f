//! MIDI track analyzer
//!
//! Decodes a file once and runs tempo and key detection on the resulting
//! timeline. The timeline is handed back with the results so later stages
//! can rescale it without parsing the bytes again.

use crate::analysis::bpm::{MidiTempoDetector, TempoConfig};
use crate::analysis::key::KrumhanslKeyDetector;
use crate::analysis::traits::{Analyzer, KeyDetector, TempoDetector};
use crate::error::{MuprepError, Result};
use crate::midi;
use crate::types::TrackAnalysis;
use tracing::debug;

pub struct MidiAnalyzer {
    tempo: Box<dyn TempoDetector>,
    key: Box<dyn KeyDetector>,
}

impl MidiAnalyzer {
    pub fn new(config: TempoConfig) -> Self {
        Self::with_detectors(
            Box::new(MidiTempoDetector::new(config)),
            Box::new(KrumhanslKeyDetector::new()),
        )
    }

    /// Build an analyzer from explicit detector backends
    pub fn with_detectors(tempo: Box<dyn TempoDetector>, key: Box<dyn KeyDetector>) -> Self {
        Self { tempo, key }
    }
}

impl Default for MidiAnalyzer {
    fn default() -> Self {
        Self::new(TempoConfig::default())
    }
}

impl Analyzer for MidiAnalyzer {
    fn analyze(&self, content: &[u8], source_name: &str) -> Result<TrackAnalysis> {
        debug!("Analyzing: {}", source_name);

        let timeline = midi::decode(content, source_name)?;

        if timeline.note_count() == 0 {
            return Err(MuprepError::analysis_error(source_name, "file contains no notes"));
        }

        let bpm = self
            .tempo
            .detect(&timeline)
            .map_err(|e| e.for_source(source_name))?;

        let key = self
            .key
            .detect(&timeline)
            .map_err(|e| e.for_source(source_name))?;

        debug!(
            "Analyzed {} with {}/{}: BPM={:.0}, Key={}",
            source_name,
            self.tempo.name(),
            self.key.name(),
            bpm.value,
            key.tonic()
        );

        Ok(TrackAnalysis { bpm, key, timeline })
    }

    fn name(&self) -> &'static str {
        "midi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::timeline::{Instrument, Note, TempoChange, Timeline};
    use crate::types::TempoSource;

    fn encoded(keys: &[u8], bpm: f64) -> Vec<u8> {
        let mut inst = Instrument::new(0, 0);
        inst.notes = keys
            .iter()
            .enumerate()
            .map(|(i, &key)| Note {
                start: i as f64 * 0.5,
                end: i as f64 * 0.5 + 0.45,
                key,
                velocity: 96,
            })
            .collect();
        let timeline = Timeline {
            instruments: vec![inst],
            tempo_changes: vec![TempoChange { time: 0.0, bpm }],
            ..Timeline::default()
        };
        midi::encode(&timeline, bpm).unwrap()
    }

    #[test]
    fn test_analyze_reads_tempo_and_key() {
        let bytes = encoded(&[60, 64, 67, 72, 67, 64, 60, 64], 120.0);
        let analysis = MidiAnalyzer::default().analyze(&bytes, "song.mid").unwrap();

        assert_eq!(analysis.bpm.value, 120.0);
        assert_eq!(analysis.bpm.source, TempoSource::TempoEvent);
        assert_eq!(analysis.key.tonic(), "C");
        assert_eq!(analysis.timeline.note_count(), 8);
    }

    #[test]
    fn test_garbage_is_recoverable_decode_error() {
        let err = MidiAnalyzer::default()
            .analyze(b"definitely not midi", "junk.mid")
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("junk.mid"));
    }

    #[test]
    fn test_empty_file_is_analysis_error() {
        let bytes = midi::encode(&Timeline::default(), 100.0).unwrap();
        let err = MidiAnalyzer::default().analyze(&bytes, "empty.mid").unwrap_err();
        assert!(matches!(err, MuprepError::AnalysisError { .. }));
    }
}
