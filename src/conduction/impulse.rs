//! Impulse Response Provider
//!
//! Supplies the short response each conduction layer is convolved with:
//! either measured data decoded from a WAV file, or a synthetic exponentially
//! decaying sinusoid band-limited by a 2nd-order Butterworth lowpass.

use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::{design_lowpass, filtfilt};
use crate::engine::{import_wav, AudioBuffer};
use crate::error::{BonetoneError, Result};

/// Butterworth order used to band-limit synthetic responses
const SYNTHETIC_LOWPASS_ORDER: usize = 2;

/// A mono impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl ImpulseResponse {
    /// Wrap response samples, rejecting empty or non-finite data
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(BonetoneError::invalid_parameter(
                "impulse_response",
                "length",
                0.0,
                "impulse response must contain at least one sample",
            ));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(BonetoneError::InvalidAudio {
                stage: "impulse_response",
                reason: "impulse response contains NaN or infinite samples".to_string(),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Sample rate the response was recorded or synthesized at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert to an audio buffer, e.g. for writing to disk
    pub fn to_buffer(&self) -> AudioBuffer {
        AudioBuffer::from_raw(
            self.samples.iter().map(|&s| s as f32).collect(),
            self.sample_rate,
        )
    }

    /// Log a warning if this response was not made for `target_sample_rate`
    ///
    /// Returns whether the rates match. The response is never resampled.
    pub fn check_sample_rate(&self, target_sample_rate: u32, origin: &str) -> bool {
        if self.sample_rate == target_sample_rate {
            return true;
        }

        log::warn!(
            "Impulse response {} is {} Hz but the signal is {} Hz; using it without resampling",
            origin,
            self.sample_rate,
            target_sample_rate
        );
        false
    }
}

/// Decode an impulse response from a WAV file at its native rate
///
/// Multi-channel files are downmixed by averaging and integer PCM is scaled
/// to full-scale float.
///
/// # Errors
/// * `Io` / `Codec` - If the file is missing or not a valid WAV file
/// * `InvalidParameter` - If the file contains no samples
pub fn read_wav(path: &Path) -> Result<ImpulseResponse> {
    let (buffer, format) = import_wav(path)?;

    let samples = buffer.samples().iter().map(|&s| s as f64).collect();
    let response = ImpulseResponse::new(samples, format.sample_rate)?;

    log::info!(
        "Loaded impulse response {} ({} samples at {} Hz)",
        path.display(),
        response.len(),
        response.sample_rate()
    );

    Ok(response)
}

/// Load an impulse response from a WAV file for a signal at
/// `target_sample_rate`
///
/// A file recorded at another rate is used as-is; the mismatch is only
/// logged.
pub fn load_from_file(path: &Path, target_sample_rate: u32) -> Result<ImpulseResponse> {
    let response = read_wav(path)?;
    response.check_sample_rate(target_sample_rate, &path.display().to_string());
    Ok(response)
}

/// Synthesize a decaying sinusoid impulse response
///
/// Produces `round(fs * duration_ms / 1000)` samples of
/// `amplitude * sin(2*pi*freq*t) * exp(-decay*t)` and zero-phase lowpass
/// filters them at `lowpass_cutoff_hz`.
pub fn synthesize(
    sample_rate_hz: u32,
    duration_ms: f64,
    freq_hz: f64,
    decay_rate: f64,
    amplitude: f64,
    lowpass_cutoff_hz: f64,
) -> Result<ImpulseResponse> {
    SyntheticIrParams {
        duration_ms,
        freq_hz,
        decay_rate,
        amplitude,
        lowpass_cutoff_hz,
    }
    .synthesize(sample_rate_hz)
}

/// Parameters of a synthetic impulse response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticIrParams {
    pub duration_ms: f64,
    pub freq_hz: f64,
    pub decay_rate: f64,
    pub amplitude: f64,
    pub lowpass_cutoff_hz: f64,
}

impl SyntheticIrParams {
    /// Short, low-pitched response for the bone layer
    pub const BONE: Self = Self {
        duration_ms: 5.0,
        freq_hz: 500.0,
        decay_rate: 6.0,
        amplitude: 0.1,
        lowpass_cutoff_hz: 3000.0,
    };

    /// Shorter, brighter response for the cartilage layer
    pub const CARTILAGE: Self = Self {
        duration_ms: 2.0,
        freq_hz: 700.0,
        decay_rate: 8.0,
        amplitude: 0.05,
        lowpass_cutoff_hz: 5000.0,
    };

    /// Check everything that does not depend on the sample rate
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("duration_ms", self.duration_ms, self.duration_ms > 0.0),
            ("freq_hz", self.freq_hz, self.freq_hz >= 0.0),
            ("decay_rate", self.decay_rate, self.decay_rate >= 0.0),
            ("amplitude", self.amplitude, true),
            ("lowpass_cutoff_hz", self.lowpass_cutoff_hz, self.lowpass_cutoff_hz > 0.0),
        ];

        for (param, value, in_range) in checks {
            if !value.is_finite() || !in_range {
                return Err(BonetoneError::invalid_parameter(
                    "synthetic_ir",
                    param,
                    value,
                    "out of range",
                ));
            }
        }
        Ok(())
    }

    /// Generate the response at `sample_rate_hz`
    pub fn synthesize(&self, sample_rate_hz: u32) -> Result<ImpulseResponse> {
        self.validate()?;

        let num_samples = (sample_rate_hz as f64 * self.duration_ms / 1000.0).round() as usize;
        if num_samples == 0 {
            return Err(BonetoneError::invalid_parameter(
                "synthetic_ir",
                "duration_ms",
                self.duration_ms,
                format!("yields zero samples at {} Hz", sample_rate_hz),
            ));
        }

        let cascade = design_lowpass(
            self.lowpass_cutoff_hz,
            sample_rate_hz,
            SYNTHETIC_LOWPASS_ORDER,
        )?;

        let fs = sample_rate_hz as f64;
        let raw: Vec<f64> = (0..num_samples)
            .map(|n| {
                let t = n as f64 / fs;
                self.amplitude * (2.0 * PI * self.freq_hz * t).sin() * (-self.decay_rate * t).exp()
            })
            .collect();

        let response = ImpulseResponse::new(filtfilt(&cascade, &raw), sample_rate_hz)?;
        log::debug!(
            "Synthesized {} sample impulse response ({} Hz, decay {})",
            response.len(),
            self.freq_hz,
            self.decay_rate
        );
        Ok(response)
    }
}
