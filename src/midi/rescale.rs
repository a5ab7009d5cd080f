//! Timeline rescaling
//!
//! Multiplies every timestamp of a timeline by one positive factor. The map
//! `t -> t * factor` is strictly increasing, so event order is preserved and
//! the spacing between any two events scales by the same amount.
//!
//! The input is borrowed, never modified: one song can be the rescaled side
//! of several pairs, each starting from the same analyzed timeline.

use super::timeline::{
    ControlChange, Instrument, KeySignature, Note, PitchBend, TempoChange, TimeSignature, Timeline,
};
use crate::error::{MuprepError, Result};

/// Return a copy of `timeline` with every event time multiplied by `factor`
///
/// Tempo change values are divided by `factor` so the tempo map describes
/// the rescaled timeline (a factor below 1 means faster playback).
pub fn rescale(timeline: &Timeline, factor: f64) -> Result<Timeline> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(MuprepError::InvalidScalingFactor(factor));
    }

    let t = |time: f64| time * factor;

    Ok(Timeline {
        resolution: timeline.resolution,
        instruments: timeline
            .instruments
            .iter()
            .map(|inst| Instrument {
                name: inst.name.clone(),
                channel: inst.channel,
                program: inst.program,
                notes: inst
                    .notes
                    .iter()
                    .map(|n| Note {
                        start: t(n.start),
                        end: t(n.end),
                        ..*n
                    })
                    .collect(),
                pitch_bends: inst
                    .pitch_bends
                    .iter()
                    .map(|b| PitchBend { time: t(b.time), ..*b })
                    .collect(),
                control_changes: inst
                    .control_changes
                    .iter()
                    .map(|c| ControlChange { time: t(c.time), ..*c })
                    .collect(),
            })
            .collect(),
        time_signatures: timeline
            .time_signatures
            .iter()
            .map(|ts| TimeSignature { time: t(ts.time), ..*ts })
            .collect(),
        key_signatures: timeline
            .key_signatures
            .iter()
            .map(|ks| KeySignature { time: t(ks.time), ..*ks })
            .collect(),
        tempo_changes: timeline
            .tempo_changes
            .iter()
            .map(|tc| TempoChange {
                time: t(tc.time),
                bpm: tc.bpm / factor,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Timeline {
        let mut lead = Instrument::new(0, 0);
        lead.notes = vec![
            Note { start: 0.0, end: 0.4, key: 60, velocity: 100 },
            Note { start: 0.5, end: 0.9, key: 62, velocity: 100 },
            Note { start: 1.5, end: 2.0, key: 64, velocity: 100 },
        ];
        lead.pitch_bends = vec![PitchBend { time: 0.7, value: 512 }];
        lead.control_changes = vec![ControlChange { time: 1.2, controller: 1, value: 64 }];
        Timeline {
            instruments: vec![lead],
            time_signatures: vec![TimeSignature { time: 0.0, numerator: 4, denominator: 4 }],
            key_signatures: vec![KeySignature { time: 1.0, sharps: 0, minor: false }],
            tempo_changes: vec![TempoChange { time: 0.0, bpm: 75.0 }],
            ..Timeline::default()
        }
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        let tl = timeline();
        assert!(matches!(rescale(&tl, 0.0), Err(MuprepError::InvalidScalingFactor(_))));
        assert!(rescale(&tl, -1.0).is_err());
        assert!(rescale(&tl, f64::INFINITY).is_err());
    }

    #[test]
    fn test_scales_every_event_kind() {
        let tl = timeline();
        let out = rescale(&tl, 0.9375).unwrap();
        let lead = &out.instruments[0];

        assert!((lead.notes[2].start - 1.40625).abs() < 1e-12);
        assert!((lead.notes[2].end - 1.875).abs() < 1e-12);
        assert!((lead.pitch_bends[0].time - 0.65625).abs() < 1e-12);
        assert!((lead.control_changes[0].time - 1.125).abs() < 1e-12);
        assert!((out.key_signatures[0].time - 0.9375).abs() < 1e-12);
        assert!((out.tempo_changes[0].bpm - 80.0).abs() < 1e-9);
        assert_eq!(lead.notes[1].key, 62);
        assert_eq!(lead.pitch_bends[0].value, 512);
    }

    #[test]
    fn test_preserves_order_and_proportions() {
        let tl = timeline();
        let out = rescale(&tl, 1.3).unwrap();
        let before: Vec<f64> = tl.onsets();
        let after: Vec<f64> = out.onsets();

        assert!(after.windows(2).all(|w| w[0] <= w[1]));
        let ratio_before = (before[2] - before[1]) / (before[1] - before[0]);
        let ratio_after = (after[2] - after[1]) / (after[1] - after[0]);
        assert!((ratio_before - ratio_after).abs() < 1e-9);
    }

    #[test]
    fn test_input_is_untouched_and_unit_factor_is_identity() {
        let tl = timeline();
        let snapshot = tl.clone();
        let _ = rescale(&tl, 0.5).unwrap();
        assert_eq!(tl, snapshot);
        assert_eq!(rescale(&tl, 1.0).unwrap(), snapshot);
    }
}
