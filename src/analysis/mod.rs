//! Track analysis
//!
//! This module provides traits for analysis backends and concrete implementations.
//! The trait abstraction allows swapping backends without changing pipeline code.

pub mod bpm;
pub mod key;
pub mod midi_analyzer;
pub mod traits;

pub use traits::{Analyzer, KeyDetector, TempoDetector};

pub use bpm::{MidiTempoDetector, TempoConfig};
pub use key::KrumhanslKeyDetector;
pub use midi_analyzer::MidiAnalyzer;
