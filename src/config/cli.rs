//! CLI argument parsing and configuration

use crate::mashup::align::AlignmentPolicy;
use crate::mashup::naming::DEFAULT_EXTENSION;
use crate::types::OutputMode;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// muprep - key-grouped, tempo-aligned MIDI mashups
///
/// Analyzes MIDI files for key and tempo, pairs every two songs that share
/// a key, and rescales each pair onto a common tempo. Outputs a zip of the
/// pairs with a CSV summary, or the summary alone.
#[derive(Parser, Debug)]
#[command(name = "muprep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a file or directory of MIDI files into a mashup package
    Run(RunArgs),

    /// Serve the mashup endpoint over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Input path (file or directory)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory for the package and report
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Package format
    #[arg(long, value_enum, default_value_t = OutputMode::Archive)]
    pub format: OutputMode,

    /// Also write a JSON batch report
    #[arg(long)]
    pub json: bool,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Scan subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Dry run - show files that would be analyzed without processing
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub alignment: AlignmentArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Largest accepted request body in MiB
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub alignment: AlignmentArgs,
}

/// Thresholds and naming shared by both commands
#[derive(Args, Debug, Clone)]
pub struct AlignmentArgs {
    /// Tempos above this are halved before comparison
    #[arg(long, value_name = "BPM", default_value_t = 144.0)]
    pub octave_threshold: f64,

    /// Largest tempo difference that snaps the target to the reference
    #[arg(long, value_name = "BPM", default_value_t = 22.0)]
    pub align_tolerance: f64,

    /// Largest tempo difference that averages both tempos
    #[arg(long, value_name = "BPM", default_value_t = 42.0)]
    pub average_tolerance: f64,

    /// File extension for artifacts inside the package
    #[arg(long, value_name = "EXT", default_value = DEFAULT_EXTENSION)]
    pub extension: String,
}

impl AlignmentArgs {
    pub fn policy(&self) -> AlignmentPolicy {
        AlignmentPolicy {
            octave_threshold: self.octave_threshold,
            align_tolerance: self.align_tolerance,
            average_tolerance: self.average_tolerance,
        }
    }
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["muprep", "run", "-i", "in", "-o", "out"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.format, OutputMode::Archive);
        assert!(!args.json);
        assert_eq!(args.alignment.policy(), AlignmentPolicy::default());
        assert_eq!(args.alignment.extension, "mid");
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "muprep", "-vv", "run", "-i", "in", "-o", "out", "--format", "tabular", "--json",
            "--align-tolerance", "10", "-r",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.format, OutputMode::Tabular);
        assert!(args.json);
        assert!(args.recursive);
        assert_eq!(args.alignment.policy().align_tolerance, 10.0);
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["muprep", "serve", "-q"]).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::ERROR);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.port(), 8000);
        assert_eq!(args.max_upload_mb, 64);
    }
}
