//! Tempo alignment decisions
//!
//! Both tempos are folded into a common frame first (anything above the
//! octave threshold is halved once), then the distance between them picks
//! one of three outcomes:
//!
//! | normalized difference         | outcome             | tempo out               |
//! |-------------------------------|---------------------|-------------------------|
//! | `<= align_tolerance`          | `AlignToReference`  | reference               |
//! | `<= average_tolerance`        | `Averaged`          | mean of both            |
//! | above                         | `Skipped`           | target keeps its own    |
//!
//! The scaling factor maps the target's normalized tempo onto the tempo out
//! and is applied to every timestamp of the target's timeline.

use serde::{Deserialize, Serialize};

/// Thresholds for the alignment decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentPolicy {
    /// Tempos strictly above this are halved before comparison
    pub octave_threshold: f64,
    /// Largest difference (inclusive) that snaps the target to the reference
    pub align_tolerance: f64,
    /// Largest difference (inclusive) that meets in the middle
    pub average_tolerance: f64,
}

impl Default for AlignmentPolicy {
    fn default() -> Self {
        Self {
            octave_threshold: 144.0,
            align_tolerance: 22.0,
            average_tolerance: 42.0,
        }
    }
}

/// Result of aligning a target tempo to a reference tempo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlignmentOutcome {
    /// Target is rescaled onto the reference tempo
    AlignToReference { target_bpm: f64, scaling_factor: f64 },
    /// Target is rescaled onto the mean of both tempos
    Averaged { target_bpm: f64, scaling_factor: f64 },
    /// Tempos too far apart; target is left as-is
    Skipped { bpm_difference: f64 },
}

impl AlignmentOutcome {
    /// Tempo the target is moved to, `None` when skipped
    pub fn target_bpm(&self) -> Option<f64> {
        match *self {
            AlignmentOutcome::AlignToReference { target_bpm, .. }
            | AlignmentOutcome::Averaged { target_bpm, .. } => Some(target_bpm),
            AlignmentOutcome::Skipped { .. } => None,
        }
    }

    /// Factor applied to the target's timestamps, `None` when skipped
    pub fn scaling_factor(&self) -> Option<f64> {
        match *self {
            AlignmentOutcome::AlignToReference { scaling_factor, .. }
            | AlignmentOutcome::Averaged { scaling_factor, .. } => Some(scaling_factor),
            AlignmentOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AlignmentOutcome::Skipped { .. })
    }

    /// Short label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            AlignmentOutcome::AlignToReference { .. } => "align",
            AlignmentOutcome::Averaged { .. } => "average",
            AlignmentOutcome::Skipped { .. } => "skip",
        }
    }
}

/// Pure decision function over two tempos
#[derive(Debug, Clone, Copy, Default)]
pub struct TempoAligner {
    policy: AlignmentPolicy,
}

impl TempoAligner {
    pub fn new(policy: AlignmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AlignmentPolicy {
        &self.policy
    }

    /// Fold a tempo into the comparison frame; halves at most once
    pub fn normalize(&self, bpm: f64) -> f64 {
        if bpm > self.policy.octave_threshold {
            bpm / 2.0
        } else {
            bpm
        }
    }

    pub fn align(&self, reference_bpm: f64, target_bpm: f64) -> AlignmentOutcome {
        let reference = self.normalize(reference_bpm);
        let target = self.normalize(target_bpm);

        // A tempo that cannot produce a positive factor is never rescaled
        if !(reference.is_finite() && target.is_finite()) || reference <= 0.0 || target <= 0.0 {
            return AlignmentOutcome::Skipped {
                bpm_difference: f64::INFINITY,
            };
        }

        let diff = (reference - target).abs();

        if diff <= self.policy.align_tolerance {
            AlignmentOutcome::AlignToReference {
                target_bpm: reference,
                scaling_factor: target / reference,
            }
        } else if diff <= self.policy.average_tolerance {
            let mean = (reference + target) / 2.0;
            AlignmentOutcome::Averaged {
                target_bpm: mean,
                scaling_factor: target / mean,
            }
        } else {
            AlignmentOutcome::Skipped { bpm_difference: diff }
        }
    }
}
