//! MIDI timeline model, codec, and tempo rescaling
//!
//! - `timeline`: owned event model and SMF decoding (midly)
//! - `encode`: SMF writing at a single target tempo
//! - `rescale`: uniform time scaling of a timeline

pub mod encode;
pub mod rescale;
pub mod timeline;

pub use encode::encode;
pub use rescale::rescale;
pub use timeline::{decode, Instrument, Note, Timeline};
