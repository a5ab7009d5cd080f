//! MIDI file discovery

mod scanner;

pub use scanner::{clean_name, read_inputs, scan, unique_ids, DiscoveredFile, FALLBACK_ID};
