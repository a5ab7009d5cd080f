//! Mashup decision engine
//!
//! - `align`: tempo alignment policy and outcomes
//! - `grouping`: partition songs by key tonic
//! - `pairs`: expand key groups into directed pairs or solo entries
//! - `naming`: deterministic archive paths
//!
//! Everything here is pure. Songs are shared behind `Arc` and never mutated,
//! so groups can be expanded in parallel.

pub mod align;
pub mod grouping;
pub mod naming;
pub mod pairs;

pub use align::{AlignmentOutcome, AlignmentPolicy, TempoAligner};
pub use grouping::{group, KeyGroup};
pub use naming::NamingScheme;
pub use pairs::{expand, EntryRecord, GroupEntry, MashupPair, SoloEntry};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::midi::Timeline;
    use crate::types::{BpmResult, KeyResult, Mode, PitchClass, Song, TempoSource, TrackAnalysis};
    use std::sync::Arc;

    /// Song with an arbitrary tonic string and an empty timeline
    pub fn song(id: &str, key: &str, bpm: f64) -> Arc<Song> {
        let analysis = TrackAnalysis {
            bpm: BpmResult {
                value: bpm,
                confidence: 1.0,
                source: TempoSource::TempoEvent,
            },
            key: KeyResult {
                pitch_class: PitchClass::C,
                mode: Mode::Major,
                confidence: 1.0,
            },
            timeline: Timeline::default(),
        };
        let mut song = Song::new(id, format!("{id}.mid"), Arc::from(Vec::new()), analysis);
        song.key_tonic = key.to_string();
        Arc::new(song)
    }
}
