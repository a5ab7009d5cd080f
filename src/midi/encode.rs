//! Timeline to Standard MIDI File encoding
//!
//! Produces DAW-friendly format 1 files: a conductor track carrying tempo,
//! time and key signatures, then one track per instrument.

use super::timeline::{Instrument, Timeline, DEFAULT_RESOLUTION};
use crate::error::{MuprepError, Result};
use midly::num::{u14, u24};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

/// Largest delta a track event can carry (28-bit)
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Largest tempo value a tempo meta event can carry (24-bit)
const MAX_US_PER_BEAT: u32 = 0x00FF_FFFF;

// Ordering of events sharing a tick: releases first, then controllers and
// bends, then new notes, so a re-struck key is not cut off.
const PRIORITY_NOTE_OFF: u8 = 0;
const PRIORITY_CONTROL: u8 = 1;
const PRIORITY_NOTE_ON: u8 = 2;

/// Encode a timeline as MIDI bytes written at a single tempo
///
/// Seconds are converted to ticks with `tempo_bpm`, so every event plays at
/// its timeline time and the file reports `tempo_bpm` to sequencers.
pub fn encode(timeline: &Timeline, tempo_bpm: f64) -> Result<Vec<u8>> {
    if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
        return Err(MuprepError::EncodeError {
            name: "timeline".to_string(),
            reason: format!("tempo must be positive, got {}", tempo_bpm),
        });
    }

    let resolution = if timeline.resolution == 0 {
        DEFAULT_RESOLUTION
    } else {
        timeline.resolution
    };

    let us_per_beat = ((60_000_000.0 / tempo_bpm).round() as u32).clamp(1, MAX_US_PER_BEAT);
    let ticks_per_second = f64::from(resolution) * 1_000_000.0 / f64::from(us_per_beat);
    let to_tick = |seconds: f64| (seconds.max(0.0) * ticks_per_second).round() as u64;

    let mut tracks = Vec::with_capacity(timeline.instruments.len() + 1);

    // Track 0: conductor
    let mut conductor: Vec<(u64, u8, TrackEventKind)> = vec![(
        0,
        PRIORITY_CONTROL,
        TrackEventKind::Meta(MetaMessage::Tempo(u24::from(us_per_beat))),
    )];
    for ts in &timeline.time_signatures {
        let denominator_pow = ts.denominator.max(1).trailing_zeros() as u8;
        conductor.push((
            to_tick(ts.time),
            PRIORITY_CONTROL,
            TrackEventKind::Meta(MetaMessage::TimeSignature(ts.numerator, denominator_pow, 24, 8)),
        ));
    }
    for ks in &timeline.key_signatures {
        conductor.push((
            to_tick(ks.time),
            PRIORITY_CONTROL,
            TrackEventKind::Meta(MetaMessage::KeySignature(ks.sharps, ks.minor)),
        ));
    }
    tracks.push(into_track(conductor));

    for instrument in &timeline.instruments {
        tracks.push(into_track(instrument_events(instrument, &to_tick)));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(resolution.into()),
        },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes).map_err(|e| MuprepError::EncodeError {
        name: "timeline".to_string(),
        reason: e.to_string(),
    })?;

    Ok(bytes)
}

fn instrument_events<'a>(
    instrument: &'a Instrument,
    to_tick: &impl Fn(f64) -> u64,
) -> Vec<(u64, u8, TrackEventKind<'a>)> {
    let channel = instrument.channel.into();
    let midi = |message: MidiMessage| -> TrackEventKind<'a> { TrackEventKind::Midi { channel, message } };

    let mut events = Vec::with_capacity(instrument.notes.len() * 2 + 2);

    if let Some(name) = &instrument.name {
        events.push((
            0,
            PRIORITY_NOTE_OFF,
            TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        ));
    }
    events.push((
        0,
        PRIORITY_NOTE_OFF,
        midi(MidiMessage::ProgramChange {
            program: instrument.program.into(),
        }),
    ));

    for note in &instrument.notes {
        // A note-off sorts ahead of a note-on at the same tick, so a hit that
        // starts and ends on one tick needs its off pushed one tick later
        let start_tick = to_tick(note.start);
        let end_tick = to_tick(note.end).max(start_tick + 1);
        events.push((
            start_tick,
            PRIORITY_NOTE_ON,
            midi(MidiMessage::NoteOn {
                key: note.key.into(),
                vel: note.velocity.into(),
            }),
        ));
        events.push((
            end_tick,
            PRIORITY_NOTE_OFF,
            midi(MidiMessage::NoteOff {
                key: note.key.into(),
                vel: 0u8.into(),
            }),
        ));
    }

    for bend in &instrument.pitch_bends {
        let raw = (i32::from(bend.value) + 8192).clamp(0, 16383) as u16;
        events.push((
            to_tick(bend.time),
            PRIORITY_CONTROL,
            midi(MidiMessage::PitchBend {
                bend: midly::PitchBend(u14::from(raw)),
            }),
        ));
    }

    for cc in &instrument.control_changes {
        events.push((
            to_tick(cc.time),
            PRIORITY_CONTROL,
            midi(MidiMessage::Controller {
                controller: cc.controller.into(),
                value: cc.value.into(),
            }),
        ));
    }

    events
}

/// Sort absolute-tick events and convert them to a delta-timed track
fn into_track(mut events: Vec<(u64, u8, TrackEventKind<'_>)>) -> Track<'_> {
    // Stable sort keeps source order among equal keys
    events.sort_by_key(|(tick, priority, _)| (*tick, *priority));

    let mut track = Track::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, _, kind) in events {
        let delta = (tick - last_tick).min(MAX_DELTA) as u32;
        track.push(TrackEvent {
            delta: delta.into(),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::timeline::{decode, ControlChange, KeySignature, Note, PitchBend, TimeSignature};

    fn sample_timeline() -> Timeline {
        let mut piano = Instrument::new(0, 4);
        piano.name = Some("Keys".to_string());
        piano.notes = vec![
            Note { start: 0.0, end: 0.5, key: 60, velocity: 100 },
            Note { start: 0.5, end: 1.0, key: 60, velocity: 90 },
            Note { start: 1.0, end: 2.0, key: 67, velocity: 80 },
        ];
        piano.pitch_bends = vec![PitchBend { time: 0.25, value: -4096 }];
        piano.control_changes = vec![ControlChange { time: 0.75, controller: 64, value: 127 }];

        Timeline {
            instruments: vec![piano],
            time_signatures: vec![TimeSignature { time: 0.0, numerator: 6, denominator: 8 }],
            key_signatures: vec![KeySignature { time: 0.0, sharps: 1, minor: false }],
            ..Timeline::default()
        }
    }

    #[test]
    fn test_encode_rejects_bad_tempo() {
        assert!(encode(&Timeline::default(), 0.0).is_err());
        assert!(encode(&Timeline::default(), f64::NAN).is_err());
    }

    #[test]
    fn test_encode_decode_preserves_event_times() {
        let original = sample_timeline();
        let bytes = encode(&original, 100.0).unwrap();
        let decoded = decode(&bytes, "encoded.mid").unwrap();

        assert_eq!(decoded.instruments.len(), 1);
        let inst = &decoded.instruments[0];
        assert_eq!(inst.name.as_deref(), Some("Keys"));
        assert_eq!(inst.program, 4);
        assert_eq!(inst.notes.len(), 3);

        // Tick quantization at 480 ppq / 100 BPM is 1.25ms
        let tolerance = 0.002;
        for (a, b) in original.instruments[0].notes.iter().zip(&inst.notes) {
            assert_eq!(a.key, b.key);
            assert!((a.start - b.start).abs() < tolerance);
            assert!((a.end - b.end).abs() < tolerance);
        }
        assert_eq!(inst.pitch_bends[0].value, -4096);
        assert_eq!(inst.control_changes[0].value, 127);
        assert_eq!(decoded.time_signatures[0].denominator, 8);
        assert_eq!(decoded.key_signatures[0].sharps, 1);
        assert!((decoded.initial_tempo().unwrap() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_retriggered_note_survives_shared_tick() {
        // First C ends exactly where the second begins
        let decoded = decode(&encode(&sample_timeline(), 120.0).unwrap(), "t.mid").unwrap();
        let cs: Vec<_> = decoded.instruments[0]
            .notes
            .iter()
            .filter(|n| n.key == 60)
            .collect();
        assert_eq!(cs.len(), 2);
        assert!(cs[0].duration() > 0.4);
        assert!(cs[1].duration() > 0.4);
    }

    #[test]
    fn test_zero_length_hits_stay_separate() {
        let mut drums = Instrument::new(9, 0);
        drums.notes = [0.0, 0.5, 1.0]
            .iter()
            .map(|&t| Note { start: t, end: t, key: 36, velocity: 110 })
            .collect();
        let timeline = Timeline {
            instruments: vec![drums],
            ..Timeline::default()
        };

        let rescaled = crate::midi::rescale(&timeline, 0.9375).unwrap();
        let decoded = decode(&encode(&rescaled, 128.0).unwrap(), "drums.mid").unwrap();

        let notes = &decoded.instruments[0].notes;
        assert_eq!(notes.len(), 3, "Every hit should survive re-encoding");
        for (note, expected) in notes.iter().zip([0.0, 0.46875, 0.9375]) {
            assert!((note.start - expected).abs() < 0.002, "hit at {} expected {}", note.start, expected);
            assert!(note.duration() < 0.01, "hit should not sustain, got {}s", note.duration());
        }
    }
}
