//! Pitch Shifter
//!
//! Duration-preserving pitch shift: a phase vocoder stretches the signal in
//! time by the pitch ratio, then the stretched signal is resampled back to
//! the original sample count, scaling every frequency by `2^(steps/12)`.
//! The result is peak-normalized because resynthesis does not preserve
//! amplitude.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::dsp::filter::{design_lowpass, filtfilt};
use crate::dsp::mixer::normalize_peak;
use crate::engine::AudioBuffer;
use crate::error::{BonetoneError, Result};

/// STFT frame length
pub const FFT_SIZE: usize = 2048;

/// STFT hop between frames
pub const HOP_SIZE: usize = 512;

/// Largest shift accepted in either direction (two octaves)
pub const MAX_SEMITONES: f32 = 24.0;

const NUM_BINS: usize = FFT_SIZE / 2 + 1;

/// Order of the lowpass guarding the resampler in either direction
const RESAMPLE_FILTER_ORDER: usize = 8;

/// Fraction of the narrower Nyquist band the resampling lowpass keeps
const RESAMPLE_PASSBAND: f64 = 0.9;

/// Frequency scale factor for a shift in semitones
pub fn pitch_ratio(semitone_steps: f32) -> f64 {
    2.0_f64.powf(semitone_steps as f64 / 12.0)
}

/// Shift the pitch of `buffer` by `semitone_steps`, keeping its length, and
/// normalize the result to `target_peak`
pub fn shift_pitch(
    buffer: &AudioBuffer,
    semitone_steps: f32,
    target_peak: f32,
) -> Result<AudioBuffer> {
    buffer.ensure_processable("pitch_shift")?;

    if !semitone_steps.is_finite() || semitone_steps.abs() > MAX_SEMITONES {
        return Err(BonetoneError::invalid_parameter(
            "pitch_shift",
            "semitone_steps",
            semitone_steps as f64,
            format!("must be finite and within +/-{}", MAX_SEMITONES),
        ));
    }

    if semitone_steps == 0.0 {
        return normalize_peak(buffer, target_peak);
    }

    let ratio = pitch_ratio(semitone_steps);
    let input: Vec<f64> = buffer.samples().iter().map(|&s| s as f64).collect();

    let vocoder = PhaseVocoder::new();
    let mut stretched = vocoder.time_stretch(&input, 1.0 / ratio);
    let nyquist = buffer.sample_rate() as f64 / 2.0;

    // Squeezing the stretched signal raises every frequency: remove what
    // would fold past Nyquist before resampling.
    if ratio > 1.0 {
        let anti_alias = design_lowpass(
            RESAMPLE_PASSBAND * nyquist / ratio,
            buffer.sample_rate(),
            RESAMPLE_FILTER_ORDER,
        )?;
        stretched = filtfilt(&anti_alias, &stretched);
    }

    let mut shifted = resample_linear(&stretched, input.len());

    // Spreading it lowers every frequency and leaves interpolation images
    // above the old Nyquist, now at `nyquist * ratio`.
    if ratio < 1.0 {
        let anti_image = design_lowpass(
            RESAMPLE_PASSBAND * nyquist * ratio,
            buffer.sample_rate(),
            RESAMPLE_FILTER_ORDER,
        )?;
        shifted = filtfilt(&anti_image, &shifted);
    }

    log::debug!(
        "Pitch shift {:+.2} st (ratio {:.4}): {} -> {} -> {} samples",
        semitone_steps,
        ratio,
        input.len(),
        stretched.len(),
        shifted.len()
    );

    let shifted = AudioBuffer::from_raw(
        shifted.into_iter().map(|s| s as f32).collect(),
        buffer.sample_rate(),
    );
    normalize_peak(&shifted, target_peak)
}

// ============================================================================
// Phase Vocoder
// ============================================================================

type Spectrum = Vec<Complex<f64>>;

/// STFT analysis / resynthesis with a periodic Hann window
struct PhaseVocoder {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl PhaseVocoder {
    fn new() -> Self {
        let mut planner = FftPlanner::new();
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / FFT_SIZE as f64).cos())
            .collect();

        Self {
            forward: planner.plan_fft_forward(FFT_SIZE),
            inverse: planner.plan_fft_inverse(FFT_SIZE),
            window,
        }
    }

    /// Change duration by `1 / rate` without changing pitch
    fn time_stretch(&self, input: &[f64], rate: f64) -> Vec<f64> {
        let frames = self.stft(input);
        let stretched = stretch_frames(&frames, rate);
        let expected_len = (input.len() as f64 / rate).round() as usize;
        self.istft(&stretched, expected_len)
    }

    /// Centered STFT: frame `t` is centered on sample `t * HOP_SIZE`
    fn stft(&self, input: &[f64]) -> Vec<Spectrum> {
        let half = FFT_SIZE / 2;
        let mut padded = vec![0.0; input.len() + FFT_SIZE];
        padded[half..half + input.len()].copy_from_slice(input);

        let num_frames = 1 + (padded.len() - FFT_SIZE) / HOP_SIZE;

        (0..num_frames)
            .map(|t| {
                let start = t * HOP_SIZE;
                let mut frame: Spectrum = padded[start..start + FFT_SIZE]
                    .iter()
                    .zip(&self.window)
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                self.forward.process(&mut frame);
                frame.truncate(NUM_BINS);
                frame
            })
            .collect()
    }

    /// Windowed overlap-add resynthesis, trimmed to `expected_len`
    fn istft(&self, frames: &[Spectrum], expected_len: usize) -> Vec<f64> {
        if frames.is_empty() {
            return vec![0.0; expected_len];
        }

        let total = FFT_SIZE + HOP_SIZE * (frames.len() - 1);
        let mut output = vec![0.0; total];
        let mut window_sum = vec![0.0; total];
        let scale = 1.0 / FFT_SIZE as f64;

        let mut full: Spectrum = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        for (t, frame) in frames.iter().enumerate() {
            full[..NUM_BINS].copy_from_slice(frame);
            for k in 1..FFT_SIZE / 2 {
                full[FFT_SIZE - k] = frame[k].conj();
            }
            self.inverse.process(&mut full);

            let start = t * HOP_SIZE;
            for (i, (c, &w)) in full.iter().zip(&self.window).enumerate() {
                output[start + i] += c.re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &w) in output.iter_mut().zip(&window_sum) {
            if w > 1e-10 {
                *sample /= w;
            }
        }

        let mut trimmed: Vec<f64> = output
            .into_iter()
            .skip(FFT_SIZE / 2)
            .take(expected_len)
            .collect();
        trimmed.resize(expected_len, 0.0);
        trimmed
    }
}

/// Resample STFT frames at fractional steps of `rate`, interpolating
/// magnitudes and accumulating phase so partials stay coherent
fn stretch_frames(frames: &[Spectrum], rate: f64) -> Vec<Spectrum> {
    let Some(first) = frames.first() else {
        return Vec::new();
    };

    let silent: Spectrum = vec![Complex::new(0.0, 0.0); NUM_BINS];
    let frame_at = |i: usize| frames.get(i).unwrap_or(&silent);

    let phase_advance: Vec<f64> = (0..NUM_BINS)
        .map(|k| 2.0 * PI * HOP_SIZE as f64 * k as f64 / FFT_SIZE as f64)
        .collect();
    let mut phase: Vec<f64> = first.iter().map(|c| c.arg()).collect();

    let mut output = Vec::new();
    let mut t = 0usize;
    loop {
        let step = t as f64 * rate;
        if step >= frames.len() as f64 {
            break;
        }

        let index = step.floor() as usize;
        let alpha = step - index as f64;
        let current = frame_at(index);
        let next = frame_at(index + 1);

        let frame = (0..NUM_BINS)
            .map(|k| {
                let magnitude = (1.0 - alpha) * current[k].norm() + alpha * next[k].norm();
                Complex::from_polar(magnitude, phase[k])
            })
            .collect();
        output.push(frame);

        for k in 0..NUM_BINS {
            let mut deviation = next[k].arg() - current[k].arg() - phase_advance[k];
            deviation -= 2.0 * PI * (deviation / (2.0 * PI)).round();
            phase[k] += phase_advance[k] + deviation;
        }

        t += 1;
    }

    output
}

/// Linear interpolation resampling to exactly `target_len` samples
fn resample_linear(samples: &[f64], target_len: usize) -> Vec<f64> {
    if samples.is_empty() {
        return vec![0.0; target_len];
    }

    let source_len = samples.len();
    let step = source_len as f64 / target_len as f64;

    (0..target_len)
        .map(|i| {
            let src_pos = i as f64 * step;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos - src_idx as f64;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else if src_idx < source_len {
                samples[src_idx]
            } else {
                0.0
            }
        })
        .collect()
}
