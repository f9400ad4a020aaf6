//! Pipeline Orchestrator
//!
//! Sequences the stages of a conduction simulation:
//! normalize -> {bone, cartilage} layers -> mix with air -> pitch shift.
//!
//! A [`Pipeline`] owns its configuration and any impulse responses read from
//! disk. Synthetic responses are built once per sample rate and shared by
//! later runs. [`Pipeline::process`] touches no files and its output depends
//! only on its input, so one pipeline can serve any number of inputs.

mod config;
mod report;

pub use config::{ImpulseSource, LayerConfig, OutputConfig, PipelineConfig};
pub use report::{sha256_file, RunReport, StageStats};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use chrono::Utc;

use crate::conduction::{self, ImpulseResponse, SyntheticIrParams};
use crate::dsp::{mix, normalize_peak, shift_pitch, MixPlan};
use crate::engine::{export_wav, import_wav, AudioBuffer};
use crate::error::{BonetoneError, Result};

/// Every intermediate buffer of one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Input after peak normalization (the air layer)
    pub input: AudioBuffer,
    pub bone: AudioBuffer,
    pub cartilage: AudioBuffer,
    /// Normalized weighted sum of air, bone and cartilage
    pub mix: AudioBuffer,
    /// Pitch-shifted, normalized final signal
    pub output: AudioBuffer,
}

/// Synthesized responses keyed by sample rate
type ResponseCache = Arc<Mutex<HashMap<u32, Arc<ImpulseResponse>>>>;

/// Impulse response of a layer, resolved at construction time
#[derive(Debug, Clone)]
enum LayerImpulse {
    /// Synthesized on first use at each input sample rate
    Synthetic {
        params: SyntheticIrParams,
        cache: ResponseCache,
    },
    Loaded {
        path: PathBuf,
        response: Arc<ImpulseResponse>,
    },
}

#[derive(Debug, Clone)]
struct LayerStage {
    name: &'static str,
    config: LayerConfig,
    impulse: LayerImpulse,
}

impl LayerStage {
    fn new(name: &'static str, config: &LayerConfig) -> Result<Self> {
        let impulse = match &config.impulse {
            ImpulseSource::Synthetic(params) => LayerImpulse::Synthetic {
                params: *params,
                cache: ResponseCache::default(),
            },
            ImpulseSource::File { path } => LayerImpulse::Loaded {
                path: path.clone(),
                response: Arc::new(conduction::read_wav(path)?),
            },
        };

        Ok(Self {
            name,
            config: config.clone(),
            impulse,
        })
    }

    fn impulse_for(&self, sample_rate: u32) -> Result<Arc<ImpulseResponse>> {
        match &self.impulse {
            LayerImpulse::Synthetic { params, cache } => {
                let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(response) = cache.get(&sample_rate) {
                    return Ok(Arc::clone(response));
                }

                log::debug!("Synthesizing {} response at {} Hz", self.name, sample_rate);
                let response = Arc::new(params.synthesize(sample_rate)?);
                cache.insert(sample_rate, Arc::clone(&response));
                Ok(response)
            }
            LayerImpulse::Loaded { path, response } => {
                response.check_sample_rate(sample_rate, &path.display().to_string());
                Ok(Arc::clone(response))
            }
        }
    }

    fn run(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let sample_rate = input.sample_rate();
        let response = self.impulse_for(sample_rate)?;

        let output = conduction::process(
            input,
            sample_rate,
            self.config.lowpass_cutoff_hz,
            self.config.mid_boost_freq_hz,
            self.config.mid_boost_gain_db,
            &response,
            self.config.compression_enabled,
        )?;

        log::debug!("{} layer peak {:.4}", self.name, output.peak());
        Ok(output)
    }
}

/// Configured conduction pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    bone: LayerStage,
    cartilage: LayerStage,
}

impl Pipeline {
    /// Validate `config` and read any file-based impulse responses
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let bone = LayerStage::new("bone", &config.bone)?;
        let cartilage = LayerStage::new("cartilage", &config.cartilage)?;

        Ok(Self {
            config,
            bone,
            cartilage,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full chain over a mono buffer
    pub fn process(&self, input: &AudioBuffer) -> Result<PipelineOutput> {
        input.ensure_processable("pipeline")?;
        let target_peak = self.config.target_peak;

        let air = normalize_peak(input, target_peak)?;
        let (bone, cartilage) = self.run_layers(&air)?;

        let mixed = mix(&MixPlan::new(target_peak)
            .layer(&air, self.config.air_gain)
            .layer(&bone, self.config.bone.gain)
            .layer(&cartilage, self.config.cartilage.gain))?;

        let output = shift_pitch(&mixed, self.config.pitch_shift_semitones, target_peak)?;

        log::info!(
            "Processed {} samples at {} Hz (pitch {:+} st)",
            output.len(),
            output.sample_rate(),
            self.config.pitch_shift_semitones
        );

        Ok(PipelineOutput {
            input: air,
            bone,
            cartilage,
            mix: mixed,
            output,
        })
    }

    /// Bone and cartilage are independent; run them side by side when
    /// configured to
    fn run_layers(&self, air: &AudioBuffer) -> Result<(AudioBuffer, AudioBuffer)> {
        if !self.config.parallel_layers {
            return Ok((self.bone.run(air)?, self.cartilage.run(air)?));
        }

        let (bone, cartilage) = thread::scope(|scope| {
            let bone = scope.spawn(|| self.bone.run(air));
            let cartilage = scope.spawn(|| self.cartilage.run(air));
            (bone.join(), cartilage.join())
        });

        let bone = bone.map_err(|_| BonetoneError::WorkerPanicked { layer: "bone" })??;
        let cartilage =
            cartilage.map_err(|_| BonetoneError::WorkerPanicked { layer: "cartilage" })??;
        Ok((bone, cartilage))
    }

    /// Decode `input`, process it, write the result to `output` and report
    /// on the run
    pub fn run_file(&self, input: &Path, output: &Path) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        log::info!("Processing {} -> {}", input.display(), output.display());

        // `output` may overwrite `input`
        let input_sha256 = sha256_file(input)?;
        let (buffer, _format) = import_wav(input)?;
        let result = self.process(&buffer)?;
        export_wav(&result.output, output, self.config.output.export_format())?;

        let elapsed_ms = timer.elapsed().as_millis() as u64;
        Ok(
            RunReport::from_output(&result, &self.config, started_at, elapsed_ms)
                .with_input_file(input, input_sha256)
                .with_output_file(output),
        )
    }
}
