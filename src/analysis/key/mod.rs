//! Key detection module

pub mod profiles;

use crate::analysis::traits::KeyDetector;
use crate::error::{MuprepError, Result};
use crate::midi::Timeline;
use crate::types::{KeyResult, Mode, PitchClass};
use tracing::debug;

/// Krumhansl-Schmuckler key finder
///
/// Builds a duration-weighted pitch-class histogram from all pitched
/// (non-drum) notes and correlates it with the Krumhansl-Kessler major and
/// minor profiles rotated to each of the 12 tonics. The best of the 24
/// correlations is the detected key.
pub struct KrumhanslKeyDetector;

impl KrumhanslKeyDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KrumhanslKeyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDetector for KrumhanslKeyDetector {
    fn detect(&self, timeline: &Timeline) -> Result<KeyResult> {
        let histogram = pitch_class_histogram(timeline);
        if histogram.iter().all(|&w| w <= 0.0) {
            return Err(MuprepError::analysis_error("", "no pitched notes for key detection"));
        }

        let mut best: Option<KeyResult> = None;
        for mode in [Mode::Major, Mode::Minor] {
            let profile = profiles::profile(mode);
            for tonic in 0..12u8 {
                let rotated: [f64; 12] =
                    std::array::from_fn(|pc| profile[(pc + 12 - usize::from(tonic)) % 12]);
                let r = profiles::correlation(&histogram, &rotated);
                if best.as_ref().map_or(true, |b| r > b.confidence) {
                    best = Some(KeyResult {
                        pitch_class: PitchClass::from_index(tonic),
                        mode,
                        confidence: r,
                    });
                }
            }
        }

        let key = best.ok_or_else(|| MuprepError::analysis_error("", "key correlation failed"))?;
        debug!(
            "Detected key: {:?} {:?} (r = {:.3})",
            key.pitch_class, key.mode, key.confidence
        );
        Ok(key)
    }

    fn name(&self) -> &'static str {
        "krumhansl-schmuckler"
    }
}

/// Total sounding time per pitch class, drums excluded
fn pitch_class_histogram(timeline: &Timeline) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    for inst in timeline.instruments.iter().filter(|i| !i.is_drum()) {
        for note in &inst.notes {
            histogram[usize::from(note.key % 12)] += note.duration();
        }
    }
    histogram
}
