//! Owned MIDI timeline and Standard MIDI File decoding
//!
//! A `Timeline` holds every time-bearing event of a file with times in
//! seconds, so tempo rescaling is a plain multiplication and the model can
//! outlive the parsed byte buffer.

use crate::error::{MuprepError, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// Ticks per quarter note used when the source has none (SMPTE timing)
pub const DEFAULT_RESOLUTION: u16 = 480;

/// Tempo assumed before the first tempo event (120 BPM)
const DEFAULT_US_PER_BEAT: u32 = 500_000;

/// General MIDI percussion channel (0-indexed)
pub const DRUM_CHANNEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Onset in seconds
    pub start: f64,
    /// Offset in seconds
    pub end: f64,
    pub key: u8,
    pub velocity: u8,
}

impl Note {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchBend {
    pub time: f64,
    /// Signed bend, 0 = centre, range -8192..=8191
    pub value: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlChange {
    pub time: f64,
    pub controller: u8,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub time: f64,
    pub numerator: u8,
    /// Actual denominator (4 for quarter notes), always a power of two
    pub denominator: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    pub time: f64,
    /// Number of sharps (positive) or flats (negative)
    pub sharps: i8,
    pub minor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub time: f64,
    pub bpm: f64,
}

/// Events of one channel within one source track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: Option<String>,
    pub channel: u8,
    pub program: u8,
    pub notes: Vec<Note>,
    pub pitch_bends: Vec<PitchBend>,
    pub control_changes: Vec<ControlChange>,
}

impl Instrument {
    pub fn new(channel: u8, program: u8) -> Self {
        Self {
            name: None,
            channel,
            program,
            notes: Vec::new(),
            pitch_bends: Vec::new(),
            control_changes: Vec::new(),
        }
    }

    pub fn is_drum(&self) -> bool {
        self.channel == DRUM_CHANNEL
    }
}

/// Decoded MIDI file with all times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Ticks per quarter note of the source file
    pub resolution: u16,
    pub instruments: Vec<Instrument>,
    pub time_signatures: Vec<TimeSignature>,
    pub key_signatures: Vec<KeySignature>,
    pub tempo_changes: Vec<TempoChange>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            instruments: Vec::new(),
            time_signatures: Vec::new(),
            key_signatures: Vec::new(),
            tempo_changes: Vec::new(),
        }
    }
}

impl Timeline {
    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|i| i.notes.len()).sum()
    }

    /// Time of the last event offset in seconds
    pub fn duration(&self) -> f64 {
        let notes = self
            .instruments
            .iter()
            .flat_map(|i| i.notes.iter().map(|n| n.end));
        let bends = self
            .instruments
            .iter()
            .flat_map(|i| i.pitch_bends.iter().map(|b| b.time));
        let ccs = self
            .instruments
            .iter()
            .flat_map(|i| i.control_changes.iter().map(|c| c.time));
        notes.chain(bends).chain(ccs).fold(0.0, f64::max)
    }

    /// Sorted note onset times across all instruments
    pub fn onsets(&self) -> Vec<f64> {
        let mut onsets: Vec<f64> = self
            .instruments
            .iter()
            .flat_map(|i| i.notes.iter().map(|n| n.start))
            .collect();
        onsets.sort_by(f64::total_cmp);
        onsets
    }

    /// BPM of the first tempo event, if the file carried one
    pub fn initial_tempo(&self) -> Option<f64> {
        self.tempo_changes.first().map(|t| t.bpm)
    }
}

// =============================================================================
// Decoding
// =============================================================================

struct TempoSegment {
    tick: u64,
    seconds: f64,
    seconds_per_tick: f64,
}

/// Piecewise-linear tick to seconds mapping
struct TempoMap {
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    fn metrical(ppq: u16, tempo_events: &mut [(u64, u32)]) -> Self {
        let ppq = f64::from(ppq.max(1));
        let spt = |us: u32| f64::from(us) / 1_000_000.0 / ppq;

        tempo_events.sort_by_key(|(tick, _)| *tick);

        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            seconds_per_tick: spt(DEFAULT_US_PER_BEAT),
        }];

        for &(tick, us) in tempo_events.iter() {
            let Some(last) = segments.last_mut() else {
                break;
            };
            if tick == last.tick {
                last.seconds_per_tick = spt(us);
                continue;
            }
            let seconds = last.seconds + (tick - last.tick) as f64 * last.seconds_per_tick;
            segments.push(TempoSegment {
                tick,
                seconds,
                seconds_per_tick: spt(us),
            });
        }

        Self { segments }
    }

    fn timecode(frames_per_second: f32, subframes: u8) -> Self {
        let ticks_per_second = f64::from(frames_per_second) * f64::from(subframes.max(1));
        Self {
            segments: vec![TempoSegment {
                tick: 0,
                seconds: 0.0,
                seconds_per_tick: 1.0 / ticks_per_second,
            }],
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|s| s.tick <= tick).saturating_sub(1);
        let seg = &self.segments[idx];
        seg.seconds + (tick - seg.tick) as f64 * seg.seconds_per_tick
    }
}

/// Decode a Standard MIDI File into a timeline
///
/// `source_name` is only used for error messages.
pub fn decode(bytes: &[u8], source_name: &str) -> Result<Timeline> {
    let smf = Smf::parse(bytes).map_err(|e| MuprepError::decode_error(source_name, e.to_string()))?;

    // Gather tempo events from every track; format 1 files keep them in
    // the conductor track but nothing forbids them elsewhere.
    let mut tempo_events: Vec<(u64, u32)> = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
                tempo_events.push((tick, us.as_int()));
            }
        }
    }

    let (resolution, tempo_map) = match smf.header.timing {
        Timing::Metrical(ppq) => {
            let ppq = ppq.as_int();
            (ppq, TempoMap::metrical(ppq, &mut tempo_events))
        }
        Timing::Timecode(fps, subframes) => {
            (DEFAULT_RESOLUTION, TempoMap::timecode(fps.as_f32(), subframes))
        }
    };

    let mut timeline = Timeline {
        resolution: resolution.max(1),
        ..Timeline::default()
    };

    if matches!(smf.header.timing, Timing::Metrical(_)) {
        timeline.tempo_changes = tempo_events
            .iter()
            .filter(|(_, us)| *us > 0)
            .map(|&(tick, us)| TempoChange {
                time: tempo_map.seconds(tick),
                bpm: 60_000_000.0 / f64::from(us),
            })
            .collect();
    }

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut track_name: Option<String> = None;
        let mut programs = [0u8; 16];
        let mut open_notes: HashMap<(u8, u8), VecDeque<(f64, u8)>> = HashMap::new();
        // channel -> index into timeline.instruments, for this track only
        let mut by_channel: HashMap<u8, usize> = HashMap::new();
        let first_instrument = timeline.instruments.len();

        for event in track {
            tick += u64::from(event.delta.as_int());
            let time = tempo_map.seconds(tick);

            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();

                    if let MidiMessage::ProgramChange { program } = message {
                        programs[usize::from(channel)] = program.as_int();
                        if let Some(&idx) = by_channel.get(&channel) {
                            let inst = &mut timeline.instruments[idx];
                            if inst.notes.is_empty() {
                                inst.program = program.as_int();
                            }
                        }
                        continue;
                    }

                    let idx = *by_channel.entry(channel).or_insert_with(|| {
                        timeline
                            .instruments
                            .push(Instrument::new(channel, programs[usize::from(channel)]));
                        timeline.instruments.len() - 1
                    });
                    let inst = &mut timeline.instruments[idx];

                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open_notes
                                .entry((channel, key.as_int()))
                                .or_default()
                                .push_back((time, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let key = key.as_int();
                            if let Some((start, velocity)) = open_notes
                                .get_mut(&(channel, key))
                                .and_then(|q| q.pop_front())
                            {
                                inst.notes.push(Note {
                                    start,
                                    end: time,
                                    key,
                                    velocity,
                                });
                            }
                        }
                        MidiMessage::PitchBend { bend } => {
                            inst.pitch_bends.push(PitchBend {
                                time,
                                value: bend.0.as_int() as i16 - 8192,
                            });
                        }
                        MidiMessage::Controller { controller, value } => {
                            inst.control_changes.push(ControlChange {
                                time,
                                controller: controller.as_int(),
                                value: value.as_int(),
                            });
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if track_name.is_none() => {
                    track_name = Some(String::from_utf8_lossy(name).trim().to_string());
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    timeline.time_signatures.push(TimeSignature {
                        time,
                        numerator: num,
                        denominator: 1u8.checked_shl(u32::from(denom_pow)).unwrap_or(4),
                    });
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                    timeline.key_signatures.push(KeySignature { time, sharps, minor });
                }
                _ => {}
            }
        }

        let dangling: usize = open_notes.values().map(VecDeque::len).sum();
        if dangling > 0 {
            trace!("Track {}: dropped {} unterminated notes", track_idx, dangling);
        }

        for inst in &mut timeline.instruments[first_instrument..] {
            if inst.name.is_none() {
                inst.name = track_name.clone().filter(|n| !n.is_empty());
            }
            inst.notes
                .sort_by(|a, b| a.start.total_cmp(&b.start).then(a.key.cmp(&b.key)));
        }
    }

    timeline.time_signatures.sort_by(|a, b| a.time.total_cmp(&b.time));
    timeline.key_signatures.sort_by(|a, b| a.time.total_cmp(&b.time));

    debug!(
        "Decoded {}: {} instruments, {} notes, {:.1}s",
        source_name,
        timeline.instruments.len(),
        timeline.note_count(),
        timeline.duration()
    );

    Ok(timeline)
}
