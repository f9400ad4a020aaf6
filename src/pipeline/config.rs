//! Pipeline Configuration
//!
//! One immutable struct holds every tunable of a run. Defaults reproduce the
//! stock bone/cartilage voicing; JSON files may override any subset of the
//! top-level fields.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conduction::SyntheticIrParams;
use crate::dsp::{DEFAULT_TARGET_PEAK, MAX_SEMITONES};
use crate::engine::ExportFormat;
use crate::error::{BonetoneError, Result};

/// Where a conduction layer gets its impulse response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpulseSource {
    /// Generated at the signal's sample rate
    Synthetic(SyntheticIrParams),
    /// Decoded from a WAV file when the pipeline is built
    File { path: PathBuf },
}

/// Settings for one conduction layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub lowpass_cutoff_hz: f64,
    pub mid_boost_freq_hz: f64,
    pub mid_boost_gain_db: f64,
    pub impulse: ImpulseSource,
    pub compression_enabled: bool,
    /// Linear weight of this layer in the mix
    pub gain: f32,
}

impl LayerConfig {
    pub fn bone() -> Self {
        Self {
            lowpass_cutoff_hz: 4000.0,
            mid_boost_freq_hz: 300.0,
            mid_boost_gain_db: 2.0,
            impulse: ImpulseSource::Synthetic(SyntheticIrParams::BONE),
            compression_enabled: true,
            gain: 0.3,
        }
    }

    pub fn cartilage() -> Self {
        Self {
            lowpass_cutoff_hz: 6000.0,
            mid_boost_freq_hz: 300.0,
            mid_boost_gain_db: 1.0,
            impulse: ImpulseSource::Synthetic(SyntheticIrParams::CARTILAGE),
            compression_enabled: false,
            gain: 0.5,
        }
    }

    fn validate(&self, stage: &'static str) -> Result<()> {
        let positive = [
            ("lowpass_cutoff_hz", self.lowpass_cutoff_hz),
            ("mid_boost_freq_hz", self.mid_boost_freq_hz),
        ];
        for (param, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(BonetoneError::invalid_parameter(
                    stage,
                    param,
                    value,
                    "must be a finite frequency > 0 Hz",
                ));
            }
        }

        if !self.mid_boost_gain_db.is_finite() {
            return Err(BonetoneError::invalid_parameter(
                stage,
                "mid_boost_gain_db",
                self.mid_boost_gain_db,
                "must be finite",
            ));
        }
        if !self.gain.is_finite() {
            return Err(BonetoneError::invalid_parameter(
                stage,
                "gain",
                self.gain as f64,
                "must be finite",
            ));
        }

        match &self.impulse {
            ImpulseSource::Synthetic(params) => params.validate(),
            ImpulseSource::File { .. } => Ok(()),
        }
    }
}

/// Output encoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// WAV bit depth: 16, 24 or 32 (float)
    pub bit_depth: u16,
    /// Bitrate handed to an external compressed-format encoder
    pub bitrate_kbps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bit_depth: 16,
            bitrate_kbps: 192,
        }
    }
}

impl OutputConfig {
    pub fn export_format(&self) -> ExportFormat {
        ExportFormat::new(self.bit_depth)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Final pitch shift in semitones (negative lowers the voice)
    pub pitch_shift_semitones: f32,
    /// Peak every normalization stage scales to
    pub target_peak: f32,
    /// Linear weight of the unprocessed air layer in the mix
    pub air_gain: f32,
    /// Run bone and cartilage layers on separate threads
    pub parallel_layers: bool,
    pub bone: LayerConfig,
    pub cartilage: LayerConfig,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pitch_shift_semitones: -2.0,
            target_peak: DEFAULT_TARGET_PEAK,
            air_gain: 1.0,
            parallel_layers: true,
            bone: LayerConfig::bone(),
            cartilage: LayerConfig::cartilage(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BonetoneError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| BonetoneError::io(path, e))
    }

    /// Check every value that does not depend on the input's sample rate
    ///
    /// Filter frequencies are checked against Nyquist when the filters are
    /// designed.
    pub fn validate(&self) -> Result<()> {
        if !self.pitch_shift_semitones.is_finite()
            || self.pitch_shift_semitones.abs() > MAX_SEMITONES
        {
            return Err(BonetoneError::invalid_parameter(
                "config",
                "pitch_shift_semitones",
                self.pitch_shift_semitones as f64,
                format!("must be finite and within +/-{}", MAX_SEMITONES),
            ));
        }
        if !self.target_peak.is_finite() || self.target_peak <= 0.0 {
            return Err(BonetoneError::invalid_parameter(
                "config",
                "target_peak",
                self.target_peak as f64,
                "must be a finite value > 0",
            ));
        }
        if !self.air_gain.is_finite() {
            return Err(BonetoneError::invalid_parameter(
                "config",
                "air_gain",
                self.air_gain as f64,
                "must be finite",
            ));
        }
        if self.output.bitrate_kbps == 0 {
            return Err(BonetoneError::invalid_parameter(
                "config",
                "bitrate_kbps",
                0.0,
                "must be > 0",
            ));
        }

        self.bone.validate("bone_layer")?;
        self.cartilage.validate("cartilage_layer")?;
        self.output.export_format().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();

        assert_eq!(config.pitch_shift_semitones, -2.0);
        assert_eq!(config.target_peak, 0.9);
        assert_eq!(config.bone.gain, 0.3);
        assert_eq!(config.cartilage.gain, 0.5);
        assert!(config.bone.compression_enabled);
        assert!(!config.cartilage.compression_enabled);
        assert_eq!(config.output.bit_depth, 16);
        assert_eq!(config.output.bitrate_kbps, 192);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::default();
        config.pitch_shift_semitones = 3.5;
        config.cartilage.impulse = ImpulseSource::File {
            path: PathBuf::from("irs/cartilage.wav"),
        };
        config.to_json_file(&path).unwrap();

        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "pitch_shift_semitones": 0.0, "parallel_layers": false }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.pitch_shift_semitones, 0.0);
        assert!(!config.parallel_layers);
        assert_eq!(config.bone, LayerConfig::bone());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_impulse_source_tagging() {
        let json = serde_json::to_value(ImpulseSource::File {
            path: PathBuf::from("a.wav"),
        })
        .unwrap();
        assert_eq!(json["kind"], "file");

        let synthetic: ImpulseSource = serde_json::from_str(
            r#"{ "kind": "synthetic", "duration_ms": 5.0, "freq_hz": 500.0,
                 "decay_rate": 6.0, "amplitude": 0.1, "lowpass_cutoff_hz": 3000.0 }"#,
        )
        .unwrap();
        assert_eq!(synthetic, ImpulseSource::Synthetic(SyntheticIrParams::BONE));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.target_peak = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.pitch_shift_semitones = 48.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bone.lowpass_cutoff_hz = -1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.output.bit_depth = 12;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cartilage.gain = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = PipelineConfig::from_json_file(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
