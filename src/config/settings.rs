//! Runtime configuration settings

use super::cli::{RunArgs, ServeArgs};
use crate::mashup::align::AlignmentPolicy;
use crate::mashup::naming::DEFAULT_EXTENSION;
use crate::types::OutputMode;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime settings for a CLI batch
#[derive(Debug, Clone)]
pub struct Settings {
    /// Input path (file or directory)
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Archive or tabular package
    pub output_mode: OutputMode,
    /// Output JSON report
    pub output_json: bool,
    /// Extension given to artifacts inside the package
    pub extension: String,
    /// Tempo alignment thresholds
    pub policy: AlignmentPolicy,
    /// Number of analysis worker threads
    pub analysis_threads: usize,
    /// Scan recursively
    pub recursive: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// Dry run mode - show files without processing
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(args: &RunArgs, quiet: bool) -> Self {
        // Leave one core for the main thread
        let default_threads = num_cpus::get().saturating_sub(1).max(1);

        Self {
            input: args.input.clone(),
            output: args.output.clone(),
            output_mode: args.format,
            output_json: args.json,
            extension: args.alignment.extension.clone(),
            policy: args.alignment.policy(),
            analysis_threads: args.threads.unwrap_or(default_threads).max(1),
            recursive: args.recursive,
            show_progress: !quiet,
            dry_run: args.dry_run,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("./output"),
            output_mode: OutputMode::Archive,
            output_json: false,
            extension: DEFAULT_EXTENSION.to_string(),
            policy: AlignmentPolicy::default(),
            analysis_threads: num_cpus::get().saturating_sub(1).max(1),
            recursive: false,
            show_progress: true,
            dry_run: false,
        }
    }
}

/// Runtime settings for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    pub extension: String,
    pub policy: AlignmentPolicy,
}

impl ServerSettings {
    pub fn from_cli(args: &ServeArgs) -> Self {
        Self {
            bind: args.bind,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            extension: args.alignment.extension.clone(),
            policy: args.alignment.policy(),
        }
    }

    /// Check thresholds before starting to listen
    pub fn validate(&self) -> Result<(), String> {
        validate_policy(&self.policy)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_upload_bytes: 64 * 1024 * 1024,
            extension: DEFAULT_EXTENSION.to_string(),
            policy: AlignmentPolicy::default(),
        }
    }
}

/// Thresholds must be finite, non-negative and ordered
pub fn validate_policy(policy: &AlignmentPolicy) -> Result<(), String> {
    let values = [
        policy.octave_threshold,
        policy.align_tolerance,
        policy.average_tolerance,
    ];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err("alignment thresholds must be finite and non-negative".to_string());
    }
    if policy.align_tolerance > policy.average_tolerance {
        return Err(format!(
            "align tolerance ({}) must not exceed average tolerance ({})",
            policy.align_tolerance, policy.average_tolerance
        ));
    }
    Ok(())
}
