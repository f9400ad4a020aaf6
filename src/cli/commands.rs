//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use super::ProcessOptions;
use crate::conduction::SyntheticIrParams;
use crate::engine::{export_wav, ExportFormat};
use crate::error::{BonetoneError, Result};
use crate::pipeline::{ImpulseSource, Pipeline, PipelineConfig};

/// Load the configuration file (if any) and apply command-line overrides
pub fn build_config(options: &ProcessOptions) -> Result<PipelineConfig> {
    let mut config = match &options.config {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(pitch) = options.pitch {
        config.pitch_shift_semitones = pitch;
    }
    if let Some(target_peak) = options.target_peak {
        config.target_peak = target_peak;
    }
    if let Some(path) = &options.bone_ir {
        config.bone.impulse = ImpulseSource::File { path: path.clone() };
    }
    if let Some(path) = &options.cartilage_ir {
        config.cartilage.impulse = ImpulseSource::File { path: path.clone() };
    }
    if options.sequential {
        config.parallel_layers = false;
    }

    config.validate()?;
    Ok(config)
}

/// Process a single WAV file.
pub fn process_file(
    input: &Path,
    output: &Path,
    options: &ProcessOptions,
    report_path: Option<&Path>,
) -> Result<()> {
    let pipeline = Pipeline::new(build_config(options)?)?;
    let report = pipeline.run_file(input, output)?;

    println!("Processed: {} -> {}", input.display(), output.display());
    if let Some(stats) = report.stage("output") {
        println!(
            "  {} samples at {} Hz, peak {:.3}, pitch {:+} st, {} ms",
            report.num_samples,
            report.sample_rate,
            stats.peak,
            report.pitch_shift_semitones,
            report.elapsed_ms
        );
    }

    if let Some(path) = report_path {
        report.to_json_file(path)?;
        println!("Report written: {}", path.display());
    }

    Ok(())
}

/// Outcome of a batch run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<PathBuf>,
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// WAV files under `input_dir` in name order, skipping the `output_dir`
/// subtree when it is nested inside.
fn collect_inputs(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let output_root = fs::canonicalize(output_dir).ok();
    let is_output_root = |path: &Path| {
        output_root.is_some() && fs::canonicalize(path).ok() == output_root
    };

    let mut inputs = Vec::new();
    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && is_output_root(entry.path())));

    for entry in walker {
        let entry = entry.map_err(|e| BonetoneError::io(input_dir, e.into()))?;
        if entry.file_type().is_file() && is_wav(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    Ok(inputs)
}

/// Process every WAV file under `input_dir` with one pipeline.
///
/// The file list is fixed before anything is written. A file that fails is
/// logged and skipped; the rest of the batch still runs.
pub fn batch(input_dir: &Path, output_dir: &Path, options: &ProcessOptions) -> Result<BatchSummary> {
    let pipeline = Pipeline::new(build_config(options)?)?;
    let mut summary = BatchSummary::default();

    let inputs = collect_inputs(input_dir, output_dir)?;
    info!("Found {} WAV files under {}", inputs.len(), input_dir.display());

    for path in &inputs {
        let relative = path.strip_prefix(input_dir).unwrap_or(path);
        let destination = output_dir.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| BonetoneError::io(parent, e))?;
        }

        match pipeline.run_file(path, &destination) {
            Ok(_) => {
                info!("Processed {}", relative.display());
                summary.processed += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {} ({})", path.display(), e, e.recovery_hint());
                summary.failed.push(path.clone());
            }
        }
    }

    println!(
        "Batch complete: {} processed, {} failed",
        summary.processed,
        summary.failed.len()
    );

    Ok(summary)
}

/// Synthesize an impulse response and write it as 32-bit float WAV.
pub fn synth_ir(output: &Path, sample_rate: u32, params: SyntheticIrParams) -> Result<()> {
    let response = params.synthesize(sample_rate)?;
    export_wav(&response.to_buffer(), output, ExportFormat::new(32))?;

    println!(
        "Impulse response written: {} ({} samples at {} Hz)",
        output.display(),
        response.len(),
        sample_rate
    );
    Ok(())
}

/// Write the default configuration.
pub fn init_config(path: &Path) -> Result<()> {
    PipelineConfig::default().to_json_file(path)?;
    println!("Configuration written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{import_wav, AudioBuffer};
    use tempfile::TempDir;

    fn write_tone(path: &Path) {
        let tone = AudioBuffer::sine_wave(440.0, 0.2, 44100, 0.5);
        export_wav(&tone, path, ExportFormat::default()).unwrap();
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        init_config(&config_path).unwrap();

        let options = ProcessOptions {
            config: Some(config_path),
            pitch: Some(4.0),
            target_peak: Some(0.5),
            sequential: true,
            ..Default::default()
        };
        let config = build_config(&options).unwrap();

        assert_eq!(config.pitch_shift_semitones, 4.0);
        assert_eq!(config.target_peak, 0.5);
        assert!(!config.parallel_layers);
        assert_eq!(config.bone, PipelineConfig::default().bone);
    }

    #[test]
    fn test_override_validation() {
        let options = ProcessOptions {
            pitch: Some(100.0),
            ..Default::default()
        };
        assert!(build_config(&options).is_err());
    }

    #[test]
    fn test_batch_mirrors_directory_layout() {
        let input_dir = TempDir::new().unwrap();
        let output_dir = TempDir::new().unwrap();

        fs::create_dir(input_dir.path().join("takes")).unwrap();
        write_tone(&input_dir.path().join("a.wav"));
        write_tone(&input_dir.path().join("takes").join("b.WAV"));
        fs::write(input_dir.path().join("notes.txt"), "not audio").unwrap();
        fs::write(input_dir.path().join("broken.wav"), "not a wav").unwrap();

        let summary = batch(input_dir.path(), output_dir.path(), &ProcessOptions::default()).unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, vec![input_dir.path().join("broken.wav")]);
        assert!(output_dir.path().join("a.wav").exists());
        assert!(output_dir.path().join("takes").join("b.WAV").exists());
    }

    #[test]
    fn test_batch_skips_nested_output_dir() {
        let input_dir = TempDir::new().unwrap();
        let output_dir = input_dir.path().join("out");
        write_tone(&input_dir.path().join("a.wav"));

        let first = batch(input_dir.path(), &output_dir, &ProcessOptions::default()).unwrap();
        let second = batch(input_dir.path(), &output_dir, &ProcessOptions::default()).unwrap();

        assert_eq!(first.processed, 1);
        assert_eq!(second.processed, 1);
        assert!(second.failed.is_empty());
        assert!(output_dir.join("a.wav").exists());
        assert!(!output_dir.join("out").exists());
    }

    #[test]
    fn test_synth_ir_writes_expected_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ir.wav");
        synth_ir(&path, 48000, SyntheticIrParams::CARTILAGE).unwrap();

        let (buffer, format) = import_wav(&path).unwrap();
        assert_eq!(buffer.len(), 96);
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.bits_per_sample, 32);
    }
}
