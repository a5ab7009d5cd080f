//! Batch orchestration

mod orchestrator;

pub use orchestrator::{run, BatchStats, MashupBatch, MashupPipeline, PipelineResult, TrackFailure};
