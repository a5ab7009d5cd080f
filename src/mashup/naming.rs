//! Archive path naming
//!
//! Every path is a pure function of the songs involved, their role and the
//! alignment outcome:
//!
//! ```text
//! {key}/{name}/{name}^{artist}^{key}^{bpm}^SongA.mid                  solo
//! {refKey}/{ref} + {tgt}/{ref}^{artist}^{key}^{bpm:.1}^SongA.mid      reference
//! {refKey}/{ref} + {tgt}/{tgt}^{artist}^{key}^{bpm:.1}^SongB.mid      target
//! {refKey}/{ref} + {tgt}/{tgt}^{artist}^{key}^{bpm:.1}^SongB^skip.mid target, not rescaled
//! ```
//!
//! Folders encode the ordered pair, so two songs with distinct names never
//! collide.

use super::pairs::MashupPair;
use crate::types::Song;

/// Marker appended to a target that kept its own tempo
pub const SKIP_MARKER: &str = "skip";

/// Extension used when none is configured
pub const DEFAULT_EXTENSION: &str = "mid";

#[derive(Debug, Clone)]
pub struct NamingScheme {
    extension: String,
}

impl Default for NamingScheme {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl NamingScheme {
    /// `extension` may be given with or without a leading dot; empty means none
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim().trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of a song passed through on its own
    pub fn solo_path(&self, song: &Song) -> String {
        format!(
            "{}/{}/{}",
            song.key_tonic,
            song.id,
            self.file_name(song, &whole(song.original_bpm()), "SongA")
        )
    }

    /// Folder shared by both files of a pair
    pub fn mashup_folder(&self, pair: &MashupPair) -> String {
        format!("{}/{} + {}", pair.reference.key_tonic, pair.reference.id, pair.target.id)
    }

    pub fn reference_path(&self, pair: &MashupPair) -> String {
        let reference = &pair.reference;
        format!(
            "{}/{}",
            self.mashup_folder(pair),
            self.file_name(reference, &tenths(reference.original_bpm()), "SongA")
        )
    }

    pub fn target_path(&self, pair: &MashupPair) -> String {
        let role = if pair.outcome.is_skipped() {
            format!("SongB^{SKIP_MARKER}")
        } else {
            "SongB".to_string()
        };
        format!(
            "{}/{}",
            self.mashup_folder(pair),
            self.file_name(&pair.target, &tenths(pair.resolved_target_bpm()), &role)
        )
    }

    fn file_name(&self, song: &Song, bpm: &str, role: &str) -> String {
        let stem = format!("{}^{}^{}^{}^{}", song.id, song.artist, song.key_tonic, bpm, role);
        if self.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }
}

/// Tempo rounded to a whole number, as shown in solo names
pub fn whole(bpm: f64) -> String {
    format!("{:.0}", bpm.round())
}

/// Tempo rounded to one decimal, as shown in pair names and the summary
pub fn tenths(bpm: f64) -> String {
    format!("{:.1}", (bpm * 10.0).round() / 10.0)
}
