//! Audio Buffer Management
//!
//! Provides the mono audio buffer type that flows between every stage of the
//! conduction pipeline, plus level measurement helpers.

use crate::error::{BonetoneError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Maximum absolute sample value of a slice (0.0 for empty input)
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Linear RMS of a slice (0.0 for empty input)
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Mono audio buffer
///
/// Every pipeline stage borrows its input and returns a fresh buffer, so a
/// buffer is never mutated after it has been handed to the next stage.
///
/// # Example
/// ```
/// use bonetone::engine::AudioBuffer;
///
/// let tone = AudioBuffer::sine_wave(1000.0, 1.0, 44100, 0.9);
/// assert_eq!(tone.len(), 44100);
/// assert!((tone.peak() - 0.9).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono samples, nominally in -1.0..1.0
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from samples, rejecting a zero sample rate or
    /// non-finite samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(BonetoneError::invalid_parameter(
                "buffer",
                "sample_rate",
                0.0,
                "must be a positive number of Hz",
            ));
        }

        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(BonetoneError::InvalidAudio {
                stage: "buffer",
                reason: format!("non-finite sample at index {}", index),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a buffer from samples the crate itself produced
    pub(crate) fn from_raw(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Downmix interleaved multi-channel data to mono by averaging channels
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        let channels = channels as usize;
        if channels == 0 {
            return Err(BonetoneError::UnsupportedFormat {
                details: "audio with zero channels".to_string(),
            });
        }

        if interleaved.len() % channels != 0 {
            return Err(BonetoneError::UnsupportedFormat {
                details: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
            });
        }

        let mono = if channels == 1 {
            interleaved.to_vec()
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: f64 = frame.iter().map(|&s| s as f64).sum();
                    (sum / channels as f64) as f32
                })
                .collect()
        };

        Self::new(mono, sample_rate)
    }

    /// Create a silent buffer with the given number of samples
    pub fn silence(num_samples: usize, sample_rate: u32) -> Self {
        Self::from_raw(vec![0.0; num_samples], sample_rate)
    }

    /// Create a sine wave test tone with the given peak amplitude
    pub fn sine_wave(frequency: f32, duration_secs: f32, sample_rate: u32, amplitude: f32) -> Self {
        let num_samples = (duration_secs * sample_rate as f32).round() as usize;
        let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;

        let samples = (0..num_samples)
            .map(|i| (amplitude as f64 * (angular_freq * i as f64).sin()) as f32)
            .collect();

        Self::from_raw(samples, sample_rate)
    }

    /// Get a reference to the samples
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Get the sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Maximum absolute sample value
    pub fn peak(&self) -> f32 {
        calculate_peak(&self.samples)
    }

    /// Linear RMS level
    pub fn rms(&self) -> f32 {
        calculate_rms(&self.samples)
    }

    /// RMS level in dBFS
    pub fn rms_db(&self) -> f32 {
        linear_to_db(self.rms())
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Reject buffers that cannot enter a processing stage
    pub fn ensure_processable(&self, stage: &'static str) -> Result<()> {
        if self.is_empty() {
            return Err(BonetoneError::InvalidAudio {
                stage,
                reason: "buffer contains no samples".to_string(),
            });
        }

        if !self.is_finite() {
            return Err(BonetoneError::InvalidAudio {
                stage,
                reason: "buffer contains NaN or infinite samples".to_string(),
            });
        }

        Ok(())
    }

    /// Produce a new buffer by applying `f` to every sample
    pub fn map<F>(&self, f: F) -> AudioBuffer
    where
        F: Fn(f32) -> f32,
    {
        Self::from_raw(self.samples.iter().map(|&s| f(s)).collect(), self.sample_rate)
    }

    /// Check if buffers are approximately equal within tolerance
    pub fn is_approx_equal(&self, other: &AudioBuffer, tolerance: f32) -> bool {
        self.sample_rate == other.sample_rate
            && self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(other.samples.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_linear_roundtrip() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert!((linear_to_db(0.5) - (-6.0206)).abs() < 1e-3);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    #[test]
    fn test_new_rejects_zero_sample_rate() {
        let result = AudioBuffer::new(vec![0.0; 4], 0);
        assert!(matches!(
            result,
            Err(BonetoneError::InvalidParameter {
                param: "sample_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let result = AudioBuffer::new(vec![0.0, f32::NAN, 0.5], 44100);
        assert!(matches!(result, Err(BonetoneError::InvalidAudio { .. })));
    }

    #[test]
    fn test_downmix_averages_channels() {
        // L, R, L, R, L, R
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 48000).unwrap();

        assert_eq!(buffer.samples(), &[0.5, 0.5, 0.0]);
        assert_eq!(buffer.sample_rate(), 48000);
    }

    #[test]
    fn test_downmix_rejects_ragged_frames() {
        let result = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2, 48000);
        assert!(matches!(result, Err(BonetoneError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_sine_wave_generation() {
        let buffer = AudioBuffer::sine_wave(1000.0, 1.0, 44100, 0.9);
        assert_eq!(buffer.len(), 44100);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
        assert!((buffer.peak() - 0.9).abs() < 1e-3);
        // Sine RMS is peak / sqrt(2)
        assert!((buffer.rms() - 0.9 / 2.0_f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_silence_is_silent() {
        let buffer = AudioBuffer::silence(100, 44100);
        assert_eq!(buffer.peak(), 0.0);
        assert!(buffer.rms_db().is_infinite());
    }

    #[test]
    fn test_ensure_processable() {
        assert!(AudioBuffer::silence(0, 44100)
            .ensure_processable("test")
            .is_err());
        assert!(AudioBuffer::silence(10, 44100)
            .ensure_processable("test")
            .is_ok());

        let broken = AudioBuffer::from_raw(vec![0.0, f32::INFINITY], 44100);
        assert!(broken.ensure_processable("test").is_err());
    }

    #[test]
    fn test_map_leaves_original_untouched() {
        let original = AudioBuffer::new(vec![0.1, -0.2, 0.3], 44100).unwrap();
        let doubled = original.map(|s| s * 2.0);

        assert_eq!(original.samples(), &[0.1, -0.2, 0.3]);
        assert!(doubled.is_approx_equal(
            &AudioBuffer::new(vec![0.2, -0.4, 0.6], 44100).unwrap(),
            1e-7
        ));
    }
}
