//! Pipeline orchestration
//!
//! Coordinates analysis, grouping, pairing and rendering for one batch.
//! Per-track analysis runs in parallel; a track that fails is logged and
//! left out of every group without stopping the batch.

use crate::analysis::Analyzer;
use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{MuprepError, Result};
use crate::export;
use crate::mashup::{self, AlignmentPolicy, GroupEntry, MashupPair, NamingScheme, TempoAligner};
use crate::midi;
use crate::types::{OutputArtifact, Song, SummaryRow, SummarySide, TrackAnalysis, TrackInput};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A track left out of the batch
#[derive(Debug, Clone, Serialize)]
pub struct TrackFailure {
    pub file_name: String,
    pub reason: String,
}

/// Batch counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub submitted: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub key_groups: usize,
    pub pairs: usize,
    pub solos: usize,
    /// Pairs whose tempos were too far apart to rescale
    pub skipped_pairs: usize,
}

/// Everything produced for one batch
#[derive(Debug, Clone)]
pub struct MashupBatch {
    /// Analyzed songs in input order
    pub songs: Vec<Arc<Song>>,
    /// Solo entries and pairs, group by group
    pub entries: Vec<GroupEntry>,
    pub artifacts: Vec<OutputArtifact>,
    pub summary: Vec<SummaryRow>,
    pub failures: Vec<TrackFailure>,
    pub stats: BatchStats,
}

/// Composes analysis and the mashup engine over a batch of raw tracks
pub struct MashupPipeline {
    analyzer: Arc<dyn Analyzer>,
    aligner: TempoAligner,
    naming: NamingScheme,
    show_progress: bool,
}

impl MashupPipeline {
    pub fn new(analyzer: Arc<dyn Analyzer>, policy: AlignmentPolicy, naming: NamingScheme) -> Self {
        Self {
            analyzer,
            aligner: TempoAligner::new(policy),
            naming,
            show_progress: false,
        }
    }

    /// Show a progress bar while analyzing
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run(&self, inputs: Vec<TrackInput>) -> Result<MashupBatch> {
        if inputs.is_empty() {
            return Err(MuprepError::NoSubmittedTracks);
        }
        let submitted = inputs.len();

        let analysis_start = Instant::now();
        let (analyzed, mut failures) = self.analyze_all(inputs);
        info!(
            "Analyzed {}/{} tracks in {:.2}s",
            analyzed.len(),
            submitted,
            analysis_start.elapsed().as_secs_f64()
        );

        if analyzed.is_empty() {
            return Err(MuprepError::NoAnalyzableTracks { submitted });
        }

        let songs = build_songs(analyzed);
        let groups = mashup::group(&songs);
        debug!("Formed {} key groups", groups.len());

        let expanded: Vec<GroupEntry> = groups
            .par_iter()
            .map(|group| mashup::expand(group, &self.aligner))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        let rendered: Vec<Result<(Vec<OutputArtifact>, SummaryRow)>> =
            expanded.par_iter().map(|entry| self.render(entry)).collect();

        // An entry that fails to render is dropped; entries and summary rows stay aligned
        let mut entries = Vec::with_capacity(expanded.len());
        let mut artifacts = Vec::with_capacity(expanded.len() * 2);
        let mut summary = Vec::with_capacity(expanded.len());
        for (entry, result) in expanded.into_iter().zip(rendered) {
            match result {
                Ok((entry_artifacts, row)) => {
                    artifacts.extend(entry_artifacts);
                    summary.push(row);
                    entries.push(entry);
                }
                Err(e) => {
                    let file_name = match &entry {
                        GroupEntry::Solo(solo) => solo.song.source_name.clone(),
                        GroupEntry::Pair(pair) => pair.target.source_name.clone(),
                    };
                    error!("Dropping {}: {}", entry_label(&entry), e);
                    failures.push(TrackFailure {
                        file_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let pairs = entries.iter().filter(|e| e.is_pair()).count();
        let skipped_pairs = entries
            .iter()
            .filter(|e| matches!(e, GroupEntry::Pair(p) if p.outcome.is_skipped()))
            .count();

        let stats = BatchStats {
            submitted,
            analyzed: songs.len(),
            failed: failures.len(),
            key_groups: groups.len(),
            pairs,
            solos: entries.len() - pairs,
            skipped_pairs,
        };

        info!(
            "Produced {} pairs ({} skipped) and {} solo entries from {} key groups",
            stats.pairs, stats.skipped_pairs, stats.solos, stats.key_groups
        );

        Ok(MashupBatch {
            songs,
            entries,
            artifacts,
            summary,
            failures,
            stats,
        })
    }

    /// Analyze every input, keeping input order; failures are isolated
    fn analyze_all(&self, inputs: Vec<TrackInput>) -> (Vec<(TrackInput, TrackAnalysis)>, Vec<TrackFailure>) {
        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(inputs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let results: Vec<(TrackInput, Result<TrackAnalysis>)> = inputs
            .into_par_iter()
            .map(|input| {
                let result = self.analyzer.analyze(&input.content, &input.file_name);
                if let Some(ref pb) = progress_bar {
                    pb.inc(1);
                    pb.set_message(input.file_name.clone());
                }
                (input, result)
            })
            .collect();

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Analysis complete");
        }

        let mut analyzed = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (input, result) in results {
            match result {
                Ok(analysis) => analyzed.push((input, analysis)),
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Skipping {}: {}", input.file_name, e);
                    } else {
                        error!("Failed {}: {}", input.file_name, e);
                    }
                    failures.push(TrackFailure {
                        file_name: input.file_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (analyzed, failures)
    }

    /// Artifacts and summary row for one entry
    fn render(&self, entry: &GroupEntry) -> Result<(Vec<OutputArtifact>, SummaryRow)> {
        match entry {
            GroupEntry::Solo(solo) => {
                let path = self.naming.solo_path(&solo.song);
                let row = SummaryRow {
                    song_a: summary_side(&solo.song, solo.song.original_bpm(), &path),
                    song_b: None,
                };
                let artifact = OutputArtifact {
                    content: Arc::clone(&solo.song.content),
                    archive_path: path,
                };
                Ok((vec![artifact], row))
            }
            GroupEntry::Pair(pair) => {
                let reference_path = self.naming.reference_path(pair);
                let target_path = self.naming.target_path(pair);

                let row = SummaryRow {
                    song_a: summary_side(&pair.reference, pair.reference.original_bpm(), &reference_path),
                    song_b: Some(summary_side(&pair.target, pair.resolved_target_bpm(), &target_path)),
                };

                let artifacts = vec![
                    OutputArtifact {
                        content: Arc::clone(&pair.reference.content),
                        archive_path: reference_path,
                    },
                    OutputArtifact {
                        content: render_target(pair)?,
                        archive_path: target_path,
                    },
                ];
                Ok((artifacts, row))
            }
        }
    }
}

/// Target side of a pair: rescaled and re-encoded, or untouched when skipped
fn render_target(pair: &MashupPair) -> Result<Arc<[u8]>> {
    let Some(factor) = pair.outcome.scaling_factor() else {
        debug!(
            "Keeping {} at {} BPM against {} (too far apart)",
            pair.target.id,
            pair.target.original_bpm(),
            pair.reference.id
        );
        return Ok(Arc::clone(&pair.target.content));
    };

    let rescaled = midi::rescale(&pair.target.timeline, factor)?;

    // Written tempo follows the rescaled beat so bars line up in a sequencer
    let tempo = rescaled
        .initial_tempo()
        .unwrap_or_else(|| pair.target.original_bpm() / factor);

    let bytes = midi::encode(&rescaled, tempo).map_err(|e| match e {
        MuprepError::EncodeError { reason, .. } => MuprepError::EncodeError {
            name: pair.target.source_name.clone(),
            reason,
        },
        other => other,
    })?;

    debug!(
        "Rescaled {} by {:.4} toward {} ({})",
        pair.target.id,
        factor,
        pair.reference.id,
        pair.outcome.label()
    );

    Ok(Arc::from(bytes))
}

fn entry_label(entry: &GroupEntry) -> String {
    match entry {
        GroupEntry::Solo(solo) => solo.song.id.clone(),
        GroupEntry::Pair(pair) => format!("{} + {}", pair.reference.id, pair.target.id),
    }
}

fn summary_side(song: &Song, tempo: f64, path: &str) -> SummarySide {
    SummarySide {
        title: song.id.clone(),
        artist: song.artist.clone(),
        key: song.key_tonic.clone(),
        tempo,
        path: path.to_string(),
    }
}

/// Turn analyzed inputs into songs with unique ids
fn build_songs(analyzed: Vec<(TrackInput, TrackAnalysis)>) -> Vec<Arc<Song>> {
    let cleaned: Vec<String> = analyzed
        .iter()
        .map(|(input, _)| discovery::clean_name(&input.file_name))
        .collect();
    let ids = discovery::unique_ids(cleaned.iter().map(String::as_str));

    analyzed
        .into_iter()
        .zip(ids)
        .map(|((input, analysis), id)| Arc::new(Song::new(id, input.file_name, input.content, analysis)))
        .collect()
}

// =============================================================================
// CLI batch
// =============================================================================

/// Pipeline result summary
#[derive(Debug)]
pub struct PipelineResult {
    pub total_files: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub pairs: usize,
    pub solos: usize,
    /// Packaged output, `None` for dry runs
    pub output_path: Option<PathBuf>,
}

/// Run a batch over files on disk and write the packaged output
pub fn run(settings: &Settings, analyzer: Arc<dyn Analyzer>) -> Result<PipelineResult> {
    let pipeline_start = Instant::now();

    configure_thread_pool(settings.analysis_threads)?;

    // Phase 1: Discovery
    let discovery_start = Instant::now();
    info!("Scanning for MIDI files...");
    let files = discovery::scan(&settings.input, settings.recursive)?;
    info!(
        "Found {} MIDI files in {:.2}s",
        files.len(),
        discovery_start.elapsed().as_secs_f64()
    );

    if settings.dry_run {
        return Ok(run_dry_run(&files, settings));
    }

    // Phase 2: Analysis and pairing
    let inputs = discovery::read_inputs(&files);
    let unreadable = files.len() - inputs.len();

    let pipeline = MashupPipeline::new(analyzer, settings.policy, NamingScheme::new(&settings.extension))
        .with_progress(settings.show_progress);
    let batch = pipeline.run(inputs)?;

    // Phase 3: Export
    let export_start = Instant::now();
    std::fs::create_dir_all(&settings.output)
        .map_err(|e| MuprepError::output_error(&settings.output, e))?;

    let package = export::package(&batch.artifacts, &batch.summary, settings.output_mode)?;
    let output_path = settings.output.join(export::package_file_name(settings.output_mode));
    export::write_atomic(&package, &output_path)?;

    if settings.output_json {
        export::write_json(&batch, &settings.output.join(export::REPORT_FILE_NAME))?;
    }
    info!(
        "Export completed in {:.2}s",
        export_start.elapsed().as_secs_f64()
    );

    println!();
    println!(
        "✓ Wrote {} artifacts to {}",
        batch.artifacts.len(),
        output_path.display()
    );

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(PipelineResult {
        total_files: files.len(),
        analyzed: batch.stats.analyzed,
        failed: batch.stats.failed + unreadable,
        pairs: batch.stats.pairs,
        solos: batch.stats.solos,
        output_path: Some(output_path),
    })
}

/// Dry run mode - show what would be processed without analyzing
fn run_dry_run(files: &[DiscoveredFile], settings: &Settings) -> PipelineResult {
    println!();
    println!("=== DRY RUN MODE ===");
    println!();

    let total_bytes: u64 = files.iter().map(|f| f.size_bytes).sum();
    for file in files {
        println!("  {}", file.path.display());
    }

    println!();
    println!("─────────────────────────────────────────");
    println!();
    println!(
        "Would analyze {} MIDI files ({:.1} KiB)",
        files.len(),
        total_bytes as f64 / 1024.0
    );

    // Worst case: every file lands in one key group
    let n = files.len();
    println!("At most {} directed pairs", n * n.saturating_sub(1));
    println!();
    println!("Would create:");
    println!(
        "  {}",
        settings
            .output
            .join(export::package_file_name(settings.output_mode))
            .display()
    );
    if settings.output_json {
        println!("  {}", settings.output.join(export::REPORT_FILE_NAME).display());
    }
    println!();

    PipelineResult {
        total_files: files.len(),
        analyzed: 0,
        failed: 0,
        pairs: 0,
        solos: 0,
        output_path: None,
    }
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // Already initialized (tests, or a server that set it up first)
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(MuprepError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::timeline::{Instrument, Note, TempoChange, Timeline};
    use crate::types::{BpmResult, KeyResult, Mode, PitchClass, TempoSource};

    /// Reads "bpm|tonic" from the file body; tonic "x" fails analysis.
    /// A trailing "|0" adds a zero-BPM tempo event, which cannot be re-encoded.
    struct TextAnalyzer;

    impl Analyzer for TextAnalyzer {
        fn analyze(&self, content: &[u8], source_name: &str) -> Result<TrackAnalysis> {
            let text = std::str::from_utf8(content)
                .map_err(|e| MuprepError::decode_error(source_name, e.to_string()))?;
            let (bpm, key) = text
                .split_once('|')
                .ok_or_else(|| MuprepError::decode_error(source_name, "missing separator"))?;
            let (key, zero_tempo) = match key.split_once('|') {
                Some((key, "0")) => (key, true),
                _ => (key, false),
            };
            let bpm: f64 = bpm
                .parse()
                .map_err(|_| MuprepError::analysis_error(source_name, "bad bpm"))?;
            let (pitch_class, mode) = match key {
                "C" => (PitchClass::C, Mode::Major),
                "a" => (PitchClass::A, Mode::Minor),
                "G" => (PitchClass::G, Mode::Major),
                _ => return Err(MuprepError::analysis_error(source_name, "no key")),
            };

            let mut inst = Instrument::new(0, 0);
            inst.notes = (0..4)
                .map(|i| Note {
                    start: i as f64 * 0.5,
                    end: i as f64 * 0.5 + 0.25,
                    key: 60,
                    velocity: 100,
                })
                .collect();

            Ok(TrackAnalysis {
                bpm: BpmResult {
                    value: bpm,
                    confidence: 1.0,
                    source: TempoSource::TempoEvent,
                },
                key: KeyResult {
                    pitch_class,
                    mode,
                    confidence: 1.0,
                },
                timeline: Timeline {
                    instruments: vec![inst],
                    tempo_changes: if zero_tempo {
                        vec![TempoChange { time: 0.0, bpm: 0.0 }]
                    } else {
                        Vec::new()
                    },
                    ..Timeline::default()
                },
            })
        }

        fn name(&self) -> &'static str {
            "text"
        }
    }

    fn pipeline() -> MashupPipeline {
        MashupPipeline::new(Arc::new(TextAnalyzer), AlignmentPolicy::default(), NamingScheme::default())
    }

    fn input(name: &str, body: &str) -> TrackInput {
        TrackInput::new(name, body.as_bytes().to_vec())
    }

    #[test]
    fn test_empty_batch_is_reported() {
        assert!(matches!(pipeline().run(Vec::new()), Err(MuprepError::NoSubmittedTracks)));
    }

    #[test]
    fn test_nothing_analyzable_is_reported() {
        let err = pipeline()
            .run(vec![input("a.mid", "garbage"), input("b.mid", "90|x")])
            .unwrap_err();
        assert!(matches!(err, MuprepError::NoAnalyzableTracks { submitted: 2 }));
    }

    #[test]
    fn test_failed_track_leaves_one_solo() {
        let batch = pipeline()
            .run(vec![input("Good-Song.mid", "120|C"), input("Bad.mid", "not midi")])
            .unwrap();

        assert_eq!(batch.entries.len(), 1);
        assert!(matches!(&batch.entries[0], GroupEntry::Solo(s) if s.song.id == "Good-Song"));
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].file_name, "Bad.mid");
        assert_eq!(batch.stats.failed, 1);

        assert_eq!(batch.artifacts.len(), 1);
        assert_eq!(batch.artifacts[0].archive_path, "C/Good-Song/Good-Song^Good^C^120^SongA.mid");
        assert_eq!(&batch.artifacts[0].content[..], b"120|C");

        assert_eq!(batch.summary.len(), 1);
        assert!(batch.summary[0].song_b.is_none());
    }

    #[test]
    fn test_key_group_of_three() {
        let batch = pipeline()
            .run(vec![
                input("a.mid", "80|C"),
                input("b.mid", "150|C"),
                input("c.mid", "20|C"),
                input("d.mid", "100|a"),
            ])
            .unwrap();

        assert_eq!(batch.stats.key_groups, 2);
        assert_eq!(batch.stats.pairs, 6);
        assert_eq!(batch.stats.solos, 1);
        // c (20) is more than 42 away from both after folding
        assert_eq!(batch.stats.skipped_pairs, 4);
        assert_eq!(batch.artifacts.len(), 6 * 2 + 1);
        assert_eq!(batch.summary.len(), 7);

        let a_to_b = &batch.summary[0];
        assert_eq!(a_to_b.song_a.title, "a");
        assert_eq!(a_to_b.song_a.tempo, 80.0);
        let song_b = a_to_b.song_b.as_ref().unwrap();
        assert_eq!(song_b.title, "b");
        assert_eq!(song_b.tempo, 80.0);
        assert_eq!(song_b.path, "C/a + b/b^Unknown^C^80.0^SongB.mid");
    }

    #[test]
    fn test_rescaled_target_is_reencoded_and_skipped_is_untouched() {
        let batch = pipeline()
            .run(vec![input("a.mid", "80|G"), input("b.mid", "150|G"), input("c.mid", "20|G")])
            .unwrap();

        let find = |path: &str| {
            batch
                .artifacts
                .iter()
                .find(|a| a.archive_path == path)
                .unwrap_or_else(|| panic!("missing artifact {path}"))
        };

        let rescaled = find("G/a + b/b^Unknown^G^80.0^SongB.mid");
        let timeline = midi::decode(&rescaled.content, "b").unwrap();
        let starts: Vec<f64> = timeline.instruments[0].notes.iter().map(|n| n.start).collect();
        assert!((starts[1] - 0.5 * 0.9375).abs() < 0.002);

        let skipped = find("G/a + c/c^Unknown^G^20.0^SongB^skip.mid");
        assert_eq!(&skipped.content[..], b"20|G");

        let reference = find("G/a + b/a^Unknown^G^80.0^SongA.mid");
        assert_eq!(&reference.content[..], b"80|G");
    }

    #[test]
    fn test_unrenderable_pair_is_dropped_not_fatal() {
        let batch = pipeline()
            .run(vec![
                input("good.mid", "100|C"),
                input("broken.mid", "110|C|0"),
                input("other.mid", "90|a"),
            ])
            .unwrap();

        // good -> broken needs broken re-encoded and fails; broken -> good keeps good's bytes
        assert_eq!(batch.stats.pairs, 1);
        assert_eq!(batch.stats.solos, 1);
        assert_eq!(batch.entries.len(), batch.summary.len());
        assert_eq!(batch.artifacts.len(), 2 + 1);

        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].file_name, "broken.mid");
        assert_eq!(batch.stats.failed, 1);

        let kept = batch.summary[0].song_a.title.as_str();
        assert_eq!(kept, "broken");
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let batch = pipeline()
            .run(vec![input("x/song.mid", "120|C"), input("y/song.mid", "121|C")])
            .unwrap();
        let ids: Vec<&str> = batch.songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["song", "song_2"]);

        let mut paths: Vec<&str> = batch.artifacts.iter().map(|a| a.archive_path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), batch.artifacts.len());
    }
}
