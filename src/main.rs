//! muprep CLI entry point

use clap::Parser;
use muprep::analysis::MidiAnalyzer;
use muprep::config::{validate_policy, Cli, Command, RunArgs, ServerSettings, Settings};
use muprep::pipeline;
use muprep::server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    match &cli.command {
        Command::Run(args) => run_batch(args, cli.quiet),
        Command::Serve(args) => serve(ServerSettings::from_cli(args)),
    }
}

fn run_batch(args: &RunArgs, quiet: bool) -> ExitCode {
    let settings = Settings::from_cli(args, quiet);

    // Validate inputs
    if let Err(e) = validate_inputs(&settings) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match pipeline::run(&settings, Arc::new(MidiAnalyzer::default())) {
        Ok(result) => {
            println!();
            println!(
                "Summary: {} analyzed, {} failed (of {} total); {} pairs, {} solo",
                result.analyzed, result.failed, result.total_files, result.pairs, result.solos
            );

            if result.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) if e.is_empty_batch() => {
            eprintln!("Nothing to do: {}", e);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn serve(settings: ServerSettings) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server::run_server(settings, Arc::new(MidiAnalyzer::default()))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(settings: &Settings) -> Result<(), String> {
    // Check input exists
    if !settings.input.exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Examples:\n    muprep run -i ~/Music/MIDI -o ./mashups\n    muprep run -i ./song.mid -o ./output",
            settings.input.display()
        ));
    }

    // Check output parent directory exists (we'll create the output dir itself)
    if let Some(parent) = settings.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Tip: The output directory will be created automatically,\n  but its parent directory must exist.\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    validate_policy(&settings.policy)
}
