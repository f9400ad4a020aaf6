//! CLI Module
//!
//! Command-line interface for the Bonetone conduction simulator.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bonetone - hear your voice the way you hear it from the inside
#[derive(Parser, Debug)]
#[command(name = "bonetone")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct ProcessOptions {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pitch shift in semitones
    #[arg(short, long, allow_negative_numbers = true)]
    pub pitch: Option<f32>,

    /// WAV impulse response for the bone layer
    #[arg(long)]
    pub bone_ir: Option<PathBuf>,

    /// WAV impulse response for the cartilage layer
    #[arg(long)]
    pub cartilage_ir: Option<PathBuf>,

    /// Peak level every normalization stage targets
    #[arg(long)]
    pub target_peak: Option<f32>,

    /// Run the conduction layers one after the other
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one WAV file
    #[command(name = "process")]
    Process {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Process every WAV file under a directory
    #[command(name = "batch")]
    Batch {
        /// Directory to search for WAV files
        input_dir: PathBuf,

        /// Directory to write results to (mirrors the input layout)
        output_dir: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Write a synthetic impulse response to a WAV file
    #[command(name = "synth-ir")]
    SynthIr {
        /// Output WAV file
        output: PathBuf,

        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        #[arg(long, default_value_t = 5.0)]
        duration_ms: f64,

        /// Frequency of the decaying sinusoid
        #[arg(long, default_value_t = 500.0)]
        freq: f64,

        /// Exponential decay rate (1/s)
        #[arg(long, default_value_t = 6.0)]
        decay: f64,

        #[arg(long, default_value_t = 0.1)]
        amplitude: f64,

        /// Lowpass cutoff applied to the response
        #[arg(long, default_value_t = 3000.0)]
        cutoff: f64,
    },

    /// Write the default configuration as JSON
    #[command(name = "init-config")]
    InitConfig {
        /// Path of the configuration file to create
        path: PathBuf,
    },
}
