//! Run Report
//!
//! JSON summary of one pipeline run: levels after every stage, where the
//! spectral peak landed before and after the pitch shift, and enough
//! provenance (run id, timestamp, input hash) to tie an output file back to
//! its source.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::engine::{dominant_frequency, AudioBuffer};
use crate::error::{BonetoneError, Result};

use super::{PipelineConfig, PipelineOutput};

/// Largest FFT used for the dominant-frequency measurement
const ANALYSIS_FFT_SIZE: usize = 8192;

/// Level statistics for one stage's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: String,
    pub peak: f32,
    /// RMS in dBFS, `None` for a silent buffer
    pub rms_db: Option<f32>,
}

impl StageStats {
    pub fn measure(stage: &str, buffer: &AudioBuffer) -> Self {
        let rms_db = buffer.rms_db();
        Self {
            stage: stage.to_string(),
            peak: buffer.peak(),
            rms_db: rms_db.is_finite().then_some(rms_db),
        }
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub input_path: Option<PathBuf>,
    /// Hex SHA-256 of the input file's bytes
    pub input_sha256: Option<String>,
    pub output_path: Option<PathBuf>,
    pub sample_rate: u32,
    pub num_samples: usize,
    pub stages: Vec<StageStats>,
    pub mix_dominant_hz: Option<f32>,
    pub output_dominant_hz: Option<f32>,
    pub pitch_shift_semitones: f32,
    pub bitrate_kbps: u32,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Build a report from the intermediate buffers of a run
    pub fn from_output(
        output: &PipelineOutput,
        config: &PipelineConfig,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        let stages = [
            ("input", &output.input),
            ("bone", &output.bone),
            ("cartilage", &output.cartilage),
            ("mix", &output.mix),
            ("output", &output.output),
        ]
        .into_iter()
        .map(|(stage, buffer)| StageStats::measure(stage, buffer))
        .collect();

        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            input_path: None,
            input_sha256: None,
            output_path: None,
            sample_rate: output.output.sample_rate(),
            num_samples: output.output.len(),
            stages,
            mix_dominant_hz: measure_dominant(&output.mix),
            output_dominant_hz: measure_dominant(&output.output),
            pitch_shift_semitones: config.pitch_shift_semitones,
            bitrate_kbps: config.output.bitrate_kbps,
            elapsed_ms,
        }
    }

    /// Record the input file and the hash of its contents as they were read
    pub fn with_input_file(mut self, path: &Path, sha256: String) -> Self {
        self.input_sha256 = Some(sha256);
        self.input_path = Some(path.to_path_buf());
        self
    }

    pub fn with_output_file(mut self, path: &Path) -> Self {
        self.output_path = Some(path.to_path_buf());
        self
    }

    /// Look up a stage's statistics by name
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| BonetoneError::io(path, e))
    }
}

/// Lowercase hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| BonetoneError::io(path, e))?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Dominant frequency over the largest power-of-two window that fits
fn measure_dominant(buffer: &AudioBuffer) -> Option<f32> {
    let available = buffer.len().min(ANALYSIS_FFT_SIZE);
    if available < 2 {
        return None;
    }
    // Largest power of two <= available
    let fft_size = 1usize << (usize::BITS - 1 - available.leading_zeros());
    dominant_frequency(buffer, fft_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output_from(buffer: &AudioBuffer) -> PipelineOutput {
        PipelineOutput {
            input: buffer.clone(),
            bone: AudioBuffer::silence(buffer.len(), buffer.sample_rate()),
            cartilage: buffer.clone(),
            mix: buffer.clone(),
            output: buffer.clone(),
        }
    }

    #[test]
    fn test_report_stages_and_levels() {
        let tone = AudioBuffer::sine_wave(1000.0, 0.5, 44100, 0.9);
        let report = RunReport::from_output(
            &output_from(&tone),
            &PipelineConfig::default(),
            Utc::now(),
            12,
        );

        assert_eq!(report.stages.len(), 5);
        assert_eq!(report.num_samples, tone.len());
        assert_eq!(report.sample_rate, 44100);
        assert_eq!(report.bitrate_kbps, 192);

        let bone = report.stage("bone").unwrap();
        assert_eq!(bone.peak, 0.0);
        assert_eq!(bone.rms_db, None);

        let out = report.stage("output").unwrap();
        assert!((out.peak - 0.9).abs() < 1e-3);
        assert!(out.rms_db.unwrap() < 0.0);

        let dominant = report.output_dominant_hz.unwrap();
        assert!((dominant - 1000.0).abs() < 2.0 * 44100.0 / 8192.0);
    }

    #[test]
    fn test_short_buffers_use_smaller_analysis_window() {
        let tone = AudioBuffer::sine_wave(2000.0, 0.01, 44100, 0.9);
        assert_eq!(tone.len(), 441);
        assert!(measure_dominant(&tone).is_some());
        assert_eq!(measure_dominant(&AudioBuffer::silence(1, 44100)), None);
        assert_eq!(measure_dominant(&AudioBuffer::silence(512, 44100)), None);
    }

    #[test]
    fn test_input_hash_and_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.bin");
        fs::write(&input, b"abc").unwrap();

        let tone = AudioBuffer::sine_wave(440.0, 0.1, 22050, 0.5);
        let report = RunReport::from_output(
            &output_from(&tone),
            &PipelineConfig::default(),
            Utc::now(),
            3,
        )
        .with_input_file(&input, sha256_file(&input).unwrap());

        assert_eq!(
            report.input_sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );

        let path = dir.path().join("report.json");
        report.to_json_file(&path).unwrap();
        let loaded: RunReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_sha256_of_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = sha256_file(&dir.path().join("missing.wav")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_run_ids_are_unique() {
        let tone = AudioBuffer::sine_wave(440.0, 0.1, 44100, 0.5);
        let output = output_from(&tone);
        let config = PipelineConfig::default();

        let a = RunReport::from_output(&output, &config, Utc::now(), 0);
        let b = RunReport::from_output(&output, &config, Utc::now(), 0);
        assert_ne!(a.run_id, b.run_id);
    }
}
