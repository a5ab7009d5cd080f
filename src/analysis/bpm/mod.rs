//! Tempo detection module
//!
//! Prefers the tempo the file declares. Files without a tempo event fall
//! back to an estimate from the spacing of note onsets:
//!
//! 1. Merge onsets closer than a chord window into one
//! 2. Compute inter-onset intervals (IOIs) between neighbours
//! 3. Cluster IOIs that lie within a small tolerance of each other
//! 4. Fold each cluster's tempo into the configured BPM range and vote
//! 5. Take the tempo with the most supporting intervals

use crate::analysis::traits::TempoDetector;
use crate::error::{MuprepError, Result};
use crate::midi::Timeline;
use crate::types::{BpmResult, TempoSource};
use tracing::debug;

/// Configuration for tempo detection
#[derive(Debug, Clone)]
pub struct TempoConfig {
    /// Use the first tempo meta event when the file has one
    pub prefer_tempo_events: bool,
    /// Lower bound of the folding range
    pub min_bpm: f64,
    /// Upper bound of the folding range
    pub max_bpm: f64,
    /// Minimum number of distinct onsets for an estimate
    pub min_onsets: usize,
    /// Onsets closer than this (seconds) count as one
    pub chord_window: f64,
    /// IOIs within this distance (seconds) of a cluster centre join it
    pub cluster_width: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            prefer_tempo_events: true,
            min_bpm: 60.0,
            max_bpm: 180.0,
            min_onsets: 4,
            chord_window: 0.01,
            cluster_width: 0.025,
        }
    }
}

/// Tempo detector for decoded MIDI timelines
pub struct MidiTempoDetector {
    config: TempoConfig,
}

impl MidiTempoDetector {
    pub fn new(config: TempoConfig) -> Self {
        Self { config }
    }
}

impl Default for MidiTempoDetector {
    fn default() -> Self {
        Self::new(TempoConfig::default())
    }
}

impl TempoDetector for MidiTempoDetector {
    fn detect(&self, timeline: &Timeline) -> Result<BpmResult> {
        if self.config.prefer_tempo_events {
            if let Some(bpm) = timeline.initial_tempo().filter(|b| b.is_finite() && *b > 0.0) {
                debug!("Using declared tempo {:.3} BPM", bpm);
                return Ok(BpmResult {
                    value: whole_bpm(bpm),
                    confidence: 1.0,
                    source: TempoSource::TempoEvent,
                });
            }
        }

        let onsets = timeline.onsets();
        let (bpm, confidence) = estimate_from_onsets(&onsets, &self.config).ok_or_else(|| {
            MuprepError::analysis_error(
                "",
                format!(
                    "not enough note onsets for tempo estimation (need {})",
                    self.config.min_onsets
                ),
            )
        })?;

        debug!("Estimated tempo {:.2} BPM (confidence: {:.2})", bpm, confidence);

        Ok(BpmResult {
            value: whole_bpm(bpm),
            confidence,
            source: TempoSource::OnsetEstimate,
        })
    }

    fn name(&self) -> &'static str {
        "midi-tempo"
    }
}

/// Slack for microsecond rounding of tempo events, enough up to ~340 BPM
const QUANTIZATION_SLACK: f64 = 1e-3;

/// Truncate to whole BPM, tolerating microsecond quantization in tempo events
fn whole_bpm(bpm: f64) -> f64 {
    (bpm + QUANTIZATION_SLACK).floor()
}

/// Fold a tempo into `[min, max]` by octaves
fn fold_into_range(mut bpm: f64, min: f64, max: f64) -> f64 {
    while bpm > max {
        bpm /= 2.0;
    }
    while bpm < min {
        bpm *= 2.0;
    }
    bpm
}

/// Estimate tempo and confidence from sorted onset times
fn estimate_from_onsets(onsets: &[f64], config: &TempoConfig) -> Option<(f64, f64)> {
    let mut distinct: Vec<f64> = Vec::with_capacity(onsets.len());
    for &t in onsets {
        if distinct.last().map_or(true, |&last| t - last > config.chord_window) {
            distinct.push(t);
        }
    }

    if distinct.len() < config.min_onsets {
        return None;
    }

    let mut iois: Vec<f64> = distinct.windows(2).map(|w| w[1] - w[0]).collect();
    iois.sort_by(f64::total_cmp);

    // (sum, count) per cluster; sorted input makes a single pass enough
    let mut clusters: Vec<(f64, usize)> = Vec::new();
    for ioi in iois {
        match clusters.last_mut() {
            Some((sum, count)) if ioi - *sum / *count as f64 <= config.cluster_width => {
                *sum += ioi;
                *count += 1;
            }
            _ => clusters.push((ioi, 1)),
        }
    }

    // (folded bpm, votes)
    let mut votes: Vec<(f64, usize)> = Vec::new();
    let mut total = 0usize;
    for (sum, count) in clusters {
        let centre = sum / count as f64;
        if centre <= 0.0 {
            continue;
        }
        let bpm = fold_into_range(60.0 / centre, config.min_bpm, config.max_bpm);
        total += count;
        match votes.iter_mut().find(|(b, _)| (*b - bpm).abs() < 1.0) {
            Some((b, v)) => {
                // Weighted running mean keeps the bin centred on its support
                *b = (*b * *v as f64 + bpm * count as f64) / (*v + count) as f64;
                *v += count;
            }
            None => votes.push((bpm, count)),
        }
    }

    let (bpm, best) = votes
        .into_iter()
        .fold(None::<(f64, usize)>, |acc, cand| match acc {
            Some(a) if a.1 >= cand.1 => Some(a),
            _ => Some(cand),
        })?;

    Some((bpm, best as f64 / total.max(1) as f64))
}
