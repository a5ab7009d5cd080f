//! Pair generation within a key group

use super::align::{AlignmentOutcome, TempoAligner};
use super::grouping::KeyGroup;
use crate::types::Song;
use serde::Serialize;
use std::sync::Arc;

/// A directed mashup: the target is moved toward the reference's tempo
#[derive(Debug, Clone)]
pub struct MashupPair {
    pub reference: Arc<Song>,
    pub target: Arc<Song>,
    pub outcome: AlignmentOutcome,
}

impl MashupPair {
    /// Tempo the target ends up at: the decided tempo, or its own when skipped
    pub fn resolved_target_bpm(&self) -> f64 {
        self.outcome
            .target_bpm()
            .unwrap_or_else(|| self.target.original_bpm())
    }
}

/// A key group with a single song, passed through without pairing
#[derive(Debug, Clone)]
pub struct SoloEntry {
    pub song: Arc<Song>,
}

#[derive(Debug, Clone)]
pub enum GroupEntry {
    Solo(SoloEntry),
    Pair(MashupPair),
}

/// Flat, serializable view of an entry for reports
#[derive(Debug, Clone, Serialize)]
pub struct EntryRecord {
    pub key: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentOutcome>,
}

impl GroupEntry {
    pub fn is_pair(&self) -> bool {
        matches!(self, GroupEntry::Pair(_))
    }

    pub fn record(&self) -> EntryRecord {
        match self {
            GroupEntry::Solo(solo) => EntryRecord {
                key: solo.song.key_tonic.clone(),
                reference: solo.song.id.clone(),
                target: None,
                alignment: None,
            },
            GroupEntry::Pair(pair) => EntryRecord {
                key: pair.reference.key_tonic.clone(),
                reference: pair.reference.id.clone(),
                target: Some(pair.target.id.clone()),
                alignment: Some(pair.outcome),
            },
        }
    }
}

/// Expand a group into one solo entry or every ordered pair
///
/// A group of `n > 1` songs yields `n * (n - 1)` pairs, reference-major:
/// `(s0, s1), (s0, s2), ..., (s1, s0), (s1, s2), ...`. Each pair is aligned
/// from the two songs' original tempos.
pub fn expand(group: &KeyGroup, aligner: &TempoAligner) -> Vec<GroupEntry> {
    if let [only] = group.songs.as_slice() {
        return vec![GroupEntry::Solo(SoloEntry {
            song: Arc::clone(only),
        })];
    }

    let n = group.songs.len();
    let mut entries = Vec::with_capacity(n * n.saturating_sub(1));
    for (i, reference) in group.songs.iter().enumerate() {
        for (j, target) in group.songs.iter().enumerate() {
            if i == j {
                continue;
            }
            let outcome = aligner.align(reference.original_bpm(), target.original_bpm());
            entries.push(GroupEntry::Pair(MashupPair {
                reference: Arc::clone(reference),
                target: Arc::clone(target),
                outcome,
            }));
        }
    }
    entries
}
