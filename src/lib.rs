//! muprep - Key-grouped, tempo-aligned MIDI mashup preparation
//!
//! Takes a batch of MIDI files, detects each file's key and tempo, groups
//! files that share a key tonic, and emits every directed pair in a group
//! with the second song rescaled toward the first one's tempo. Results are
//! packaged as a zip archive or a CSV summary.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: MIDI file scanning and song naming
//! - `midi`: timeline model, SMF decode/encode, uniform rescaling
//! - `analysis`: tempo and key detection (with swappable backends)
//! - `mashup`: alignment policy, key grouping, pair expansion, naming
//! - `pipeline`: batch orchestration
//! - `export`: zip archive, CSV summary and JSON report
//! - `server`: HTTP submission endpoint
//!
//! # Example
//!
//! ```no_run
//! use muprep::analysis::MidiAnalyzer;
//! use muprep::mashup::{AlignmentPolicy, NamingScheme};
//! use muprep::pipeline::MashupPipeline;
//! use muprep::types::TrackInput;
//! use std::sync::Arc;
//!
//! let pipeline = MashupPipeline::new(
//!     Arc::new(MidiAnalyzer::default()),
//!     AlignmentPolicy::default(),
//!     NamingScheme::default(),
//! );
//! let bytes = std::fs::read("song.mid").expect("read failed");
//! let batch = pipeline.run(vec![TrackInput::new("song.mid", bytes)]).expect("batch failed");
//! println!("{} artifacts", batch.artifacts.len());
//! ```

pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod mashup;
pub mod midi;
pub mod pipeline;
pub mod server;
pub mod types;

// Re-export key types at crate root
pub use error::{MuprepError, Result};
pub use types::{OutputArtifact, OutputMode, Song, SummaryRow, TrackInput};
