//! Bonetone CLI - Conduction Voice Simulator
//!
//! Command-line interface for the Bonetone processing pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use bonetone::cli::{commands, Cli, Commands};
use bonetone::conduction::SyntheticIrParams;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins over the default filter
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Bonetone v{}", env!("CARGO_PKG_VERSION"));

    handle_command(cli.command)
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Process {
            input,
            output,
            options,
            report,
        } => commands::process_file(&input, &output, &options, report.as_deref())
            .with_context(|| format!("failed to process {}", input.display())),
        Commands::Batch {
            input_dir,
            output_dir,
            options,
        } => {
            let summary = commands::batch(&input_dir, &output_dir, &options)
                .with_context(|| format!("batch over {} failed", input_dir.display()))?;
            if !summary.failed.is_empty() {
                anyhow::bail!("{} file(s) could not be processed", summary.failed.len());
            }
            Ok(())
        }
        Commands::SynthIr {
            output,
            sample_rate,
            duration_ms,
            freq,
            decay,
            amplitude,
            cutoff,
        } => {
            let params = SyntheticIrParams {
                duration_ms,
                freq_hz: freq,
                decay_rate: decay,
                amplitude,
                lowpass_cutoff_hz: cutoff,
            };
            commands::synth_ir(&output, sample_rate, params)
                .with_context(|| format!("failed to write {}", output.display()))
        }
        Commands::InitConfig { path } => commands::init_config(&path)
            .with_context(|| format!("failed to write {}", path.display())),
    }
}
