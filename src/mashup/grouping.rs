//! Key grouping

use crate::types::Song;
use std::collections::HashMap;
use std::sync::Arc;

/// Songs sharing a detected key tonic, in the order they were seen
#[derive(Debug, Clone)]
pub struct KeyGroup {
    pub key: String,
    pub songs: Vec<Arc<Song>>,
}

impl KeyGroup {
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Partition songs by their raw key tonic
///
/// Groups come out in order of each key's first occurrence and songs keep
/// their input order inside a group.
pub fn group(songs: &[Arc<Song>]) -> Vec<KeyGroup> {
    let mut groups: Vec<KeyGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for song in songs {
        let slot = *index.entry(song.key_tonic.as_str()).or_insert_with(|| {
            groups.push(KeyGroup {
                key: song.key_tonic.clone(),
                songs: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].songs.push(Arc::clone(song));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mashup::test_support::song;

    #[test]
    fn test_groups_in_first_seen_order() {
        let songs = vec![
            song("a", "C", 120.0),
            song("b", "a", 90.0),
            song("c", "C", 100.0),
            song("d", "F#", 128.0),
            song("e", "a", 95.0),
        ];
        let groups = group(&songs);

        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "a", "F#"]);

        let c_ids: Vec<&str> = groups[0].songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(c_ids, vec!["a", "c"]);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[2].len(), 1);
    }

    #[test]
    fn test_major_and_minor_tonics_stay_apart() {
        let groups = group(&[song("x", "C", 120.0), song("y", "c", 120.0)]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(group(&[]).is_empty());
    }
}
