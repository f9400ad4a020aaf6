//! Integration Tests
//!
//! End-to-end tests for the Bonetone conduction pipeline.

use std::path::Path;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use bonetone::conduction::{self, SyntheticIrParams};
use bonetone::dsp::{mix, normalize_peak, shift_pitch, soft_clip_sample, MixPlan, MAX_EXCURSION};
use bonetone::engine::{dominant_frequency, export_wav, import_wav, AudioBuffer, ExportFormat};
use bonetone::pipeline::{ImpulseSource, Pipeline, PipelineConfig, RunReport};

/// Write a mono 16-bit test tone and return its path
fn write_tone(dir: &Path, name: &str, frequency: f32, duration_secs: f32) -> std::path::PathBuf {
    let path = dir.join(name);
    let tone = AudioBuffer::sine_wave(frequency, duration_secs, 44100, 0.5);
    export_wav(&tone, &path, ExportFormat::default()).unwrap();
    path
}

// === Stage Scenarios ===

#[test]
fn test_bone_layer_round_trip_scenario() {
    let input = AudioBuffer::sine_wave(1000.0, 1.0, 44100, 0.9);
    let ir = conduction::synthesize(44100, 5.0, 500.0, 6.0, 0.1, 3000.0).unwrap();

    let output = conduction::process(&input, 44100, 4000.0, 300.0, 2.0, &ir, true).unwrap();

    assert_eq!(output.len(), 44100);
    assert!(output.peak() <= 0.5 + MAX_EXCURSION + 1e-6);
    // Every sample lies on the clip curve's range
    assert!(output.samples().iter().all(|s| s.abs() < 1.5));
}

#[test]
fn test_air_only_mix_scenario() {
    let air = AudioBuffer::sine_wave(440.0, 0.5, 44100, 0.7);
    let silent = AudioBuffer::silence(air.len(), 44100);

    let mixed = mix(&MixPlan::new(0.9)
        .layer(&air, 1.0)
        .layer(&silent, 0.3)
        .layer(&silent, 0.5))
    .unwrap();

    assert_eq!(mixed, normalize_peak(&air, 0.9).unwrap());
}

#[test]
fn test_soft_clip_never_reaches_one_above_threshold() {
    for threshold in [0.1_f32, 0.5, 0.8] {
        for i in 0..5000 {
            let s = i as f32 * 0.01 - 25.0;
            assert!(soft_clip_sample(s, threshold).abs() < threshold + 1.0);
        }
    }
}

#[test]
fn test_pitch_shift_down_lowers_dominant_frequency() {
    let input = AudioBuffer::sine_wave(880.0, 1.0, 44100, 0.9);
    let output = shift_pitch(&input, -12.0, 0.9).unwrap();

    assert_eq!(output.len(), input.len());
    let measured = dominant_frequency(&output, 8192).unwrap();
    assert!((measured - 440.0).abs() < 15.0, "measured {} Hz", measured);
}

// === Full Pipeline Tests ===

#[test]
fn test_run_file_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_tone(dir.path(), "voice.wav", 220.0, 1.0);
    let output = dir.path().join("voice_inside.wav");

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.run_file(&input, &output).unwrap();

    let (buffer, format) = import_wav(&output).unwrap();
    assert_eq!(format.sample_rate, 44100);
    assert_eq!(format.channels, 1);
    assert_eq!(format.bits_per_sample, 16);
    assert_eq!(buffer.len(), 44100);
    // 16-bit quantization of a 0.9 peak
    assert_abs_diff_eq!(buffer.peak(), 0.9, epsilon = 1e-3);

    assert_eq!(report.num_samples, 44100);
    assert_eq!(report.sample_rate, 44100);
    assert_eq!(report.input_path.as_deref(), Some(input.as_path()));
    assert_eq!(report.output_path.as_deref(), Some(output.as_path()));
    assert_eq!(report.input_sha256.as_ref().map(|h| h.len()), Some(64));
    assert_eq!(report.stages.len(), 5);
}

#[test]
fn test_stereo_input_is_downmixed() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("stereo.wav");
    let output = dir.path().join("out.wav");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&input, spec).unwrap();
    for i in 0..22050 {
        let s = ((i as f32 * 0.05).sin() * 16000.0) as i16;
        writer.write_sample(s).unwrap();
        writer.write_sample(s / 2).unwrap();
    }
    writer.finalize().unwrap();

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.run_file(&input, &output).unwrap();

    let (buffer, format) = import_wav(&output).unwrap();
    assert_eq!(format.channels, 1);
    assert_eq!(format.sample_rate, 22050);
    assert_eq!(buffer.len(), 22050);
}

#[test]
fn test_measured_impulse_responses_from_disk() {
    let dir = TempDir::new().unwrap();
    let bone_ir = dir.path().join("bone_ir.wav");
    let cartilage_ir = dir.path().join("cartilage_ir.wav");

    // Stereo 16-bit response: loaded with downmix and full-scale conversion
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&bone_ir, spec).unwrap();
    for i in 0..300 {
        let s = (3000.0 * (-(i as f32) / 40.0).exp()) as i16;
        writer.write_sample(s).unwrap();
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let cartilage = SyntheticIrParams::CARTILAGE.synthesize(48000).unwrap();
    export_wav(&cartilage.to_buffer(), &cartilage_ir, ExportFormat::new(24)).unwrap();

    let loaded = conduction::load_from_file(&bone_ir, 44100).unwrap();
    assert_eq!(loaded.len(), 300);
    assert_abs_diff_eq!(loaded.samples()[0], 3000.0 / 32768.0, epsilon = 1e-6);

    let mut config = PipelineConfig::default();
    config.bone.impulse = ImpulseSource::File { path: bone_ir };
    config.cartilage.impulse = ImpulseSource::File { path: cartilage_ir };

    let pipeline = Pipeline::new(config).unwrap();
    let input = AudioBuffer::sine_wave(300.0, 0.5, 44100, 0.8);
    let result = pipeline.process(&input).unwrap();

    assert_eq!(result.bone.len(), input.len());
    assert_eq!(result.cartilage.len(), input.len());
    assert_abs_diff_eq!(result.output.peak(), 0.9, epsilon = 1e-6);
}

#[test]
fn test_config_file_drives_pipeline() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{ "pitch_shift_semitones": 0.0, "target_peak": 0.5, "parallel_layers": false }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&config_path).unwrap();
    let pipeline = Pipeline::new(config).unwrap();
    let result = pipeline
        .process(&AudioBuffer::sine_wave(500.0, 0.3, 44100, 0.9))
        .unwrap();

    // No pitch shift: output is the mix renormalized to the same target
    assert!(result.output.is_approx_equal(&result.mix, 1e-6));
    assert_abs_diff_eq!(result.output.peak(), 0.5, epsilon = 1e-6);
}

#[test]
fn test_report_json_roundtrip() {
    let dir = TempDir::new().unwrap();
    let input = write_tone(dir.path(), "in.wav", 440.0, 0.5);
    let output = dir.path().join("out.wav");
    let report_path = dir.path().join("report.json");

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.run_file(&input, &output).unwrap();
    report.to_json_file(&report_path).unwrap();

    let loaded: RunReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.pitch_shift_semitones, -2.0);
}

// === Error Paths ===

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();

    let err = pipeline
        .run_file(&dir.path().join("missing.wav"), &dir.path().join("out.wav"))
        .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
    assert!(!dir.path().join("out.wav").exists());
}

#[test]
fn test_corrupt_impulse_response_aborts_construction() {
    let dir = TempDir::new().unwrap();
    let ir = dir.path().join("ir.wav");
    std::fs::write(&ir, b"RIFF garbage").unwrap();

    let mut config = PipelineConfig::default();
    config.cartilage.impulse = ImpulseSource::File { path: ir };

    let err = Pipeline::new(config).unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}
