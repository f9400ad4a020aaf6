//! Filter Designer
//!
//! Biquad coefficient design (Butterworth lowpass cascades and cookbook
//! peaking EQ) and zero-phase forward-backward filtering.
//!
//! Sections run in transposed direct form II. Zero-phase filtering pads the
//! signal with an odd reflection at both ends and starts every section from
//! its steady-state response to the first padded sample, so a constant input
//! comes out constant with no edge transient. Because the cascade runs
//! twice, the net magnitude response is |H|^2 and the net phase is zero.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::engine::AudioBuffer;
use crate::error::{BonetoneError, Result};

/// Biquad filter coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
/// with every coefficient already divided by a0. A first-order section is a
/// biquad with `b2 == a2 == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Build a section from raw coefficients, folding `a0` in
    pub fn from_raw(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Unity pass-through section
    pub fn identity() -> Self {
        BiquadCoeffs {
            b0: 1.0,
            ..Default::default()
        }
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Magnitude of the response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate_hz: u32) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate_hz as f64;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }

    /// TDF-II state after an infinitely long unit step
    fn step_state(&self) -> [f64; 2] {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            return [0.0, 0.0];
        }

        let y = (self.b0 + self.b1 + self.b2) / den;
        let z2 = self.b2 - self.a2 * y;
        let z1 = self.b1 - self.a1 * y + z2;
        [z1, z2]
    }

    fn is_first_order(&self) -> bool {
        self.b2 == 0.0 && self.a2 == 0.0
    }
}

// ============================================================================
// Design
// ============================================================================

fn validate_frequency(
    stage: &'static str,
    param: &'static str,
    freq_hz: f64,
    sample_rate_hz: u32,
) -> Result<()> {
    if sample_rate_hz == 0 {
        return Err(BonetoneError::invalid_parameter(
            stage,
            "sample_rate_hz",
            0.0,
            "must be > 0",
        ));
    }

    let nyquist = sample_rate_hz as f64 / 2.0;
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(BonetoneError::invalid_parameter(
            stage,
            param,
            freq_hz,
            "must be a finite frequency > 0 Hz",
        ));
    }
    if freq_hz >= nyquist {
        return Err(BonetoneError::invalid_parameter(
            stage,
            param,
            freq_hz,
            format!("must be below Nyquist ({} Hz)", nyquist),
        ));
    }

    Ok(())
}

/// Design a Butterworth lowpass as a cascade of second-order sections
///
/// The analog prototype is prewarped so the digital response is exactly
/// -3 dB at `cutoff_hz`. Odd orders end with one first-order section.
pub fn design_lowpass(
    cutoff_hz: f64,
    sample_rate_hz: u32,
    order: usize,
) -> Result<Vec<BiquadCoeffs>> {
    validate_frequency("lowpass", "cutoff_hz", cutoff_hz, sample_rate_hz)?;
    if order < 1 {
        return Err(BonetoneError::invalid_parameter(
            "lowpass",
            "order",
            order as f64,
            "must be >= 1",
        ));
    }

    let k = (PI * cutoff_hz / sample_rate_hz as f64).tan();
    let k2 = k * k;
    let n = order as f64;

    let mut sections = Vec::with_capacity(order.div_ceil(2));

    // One section per conjugate pole pair in the upper half plane
    for pair in 0..order / 2 {
        let theta = PI * (2.0 * pair as f64 + n + 1.0) / (2.0 * n);
        let q = -1.0 / (2.0 * theta.cos());

        sections.push(BiquadCoeffs::from_raw(
            k2,
            2.0 * k2,
            k2,
            1.0 + k / q + k2,
            2.0 * (k2 - 1.0),
            1.0 - k / q + k2,
        ));
    }

    // Remaining real pole
    if order % 2 == 1 {
        sections.push(BiquadCoeffs::from_raw(k, k, 0.0, 1.0 + k, k - 1.0, 0.0));
    }

    Ok(sections)
}

/// Design a cookbook peaking EQ section
///
/// `A = 10^(gain_db/40)`, `w0 = 2*pi*center_hz/fs`, `alpha = sin(w0)/(2Q)`.
pub fn design_peaking(
    center_hz: f64,
    sample_rate_hz: u32,
    gain_db: f64,
    q: f64,
) -> Result<BiquadCoeffs> {
    validate_frequency("peaking", "center_hz", center_hz, sample_rate_hz)?;
    if !q.is_finite() || q <= 0.0 {
        return Err(BonetoneError::invalid_parameter(
            "peaking",
            "q",
            q,
            "must be a finite value > 0",
        ));
    }
    if !gain_db.is_finite() {
        return Err(BonetoneError::invalid_parameter(
            "peaking",
            "gain_db",
            gain_db,
            "must be finite",
        ));
    }

    let a = 10.0_f64.powf(gain_db / 40.0);
    let w0 = 2.0 * PI * center_hz / sample_rate_hz as f64;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    Ok(BiquadCoeffs::from_raw(
        1.0 + alpha * a,
        -2.0 * cos_w0,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w0,
        1.0 - alpha / a,
    ))
}

/// Magnitude response of a cascade at `freq_hz` (single pass)
pub fn frequency_response(cascade: &[BiquadCoeffs], freq_hz: f64, sample_rate_hz: u32) -> f64 {
    cascade
        .iter()
        .map(|section| section.magnitude_at(freq_hz, sample_rate_hz))
        .product()
}

// ============================================================================
// Filtering
// ============================================================================

/// Run `input` through the cascade once, starting from `state`
fn run_cascade(cascade: &[BiquadCoeffs], input: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
    let mut signal = input.to_vec();

    for (c, z) in cascade.iter().zip(state.iter_mut()) {
        for sample in signal.iter_mut() {
            let x = *sample;
            let y = c.b0 * x + z[0];
            z[0] = c.b1 * x - c.a1 * y + z[1];
            z[1] = c.b2 * x - c.a2 * y;
            *sample = y;
        }
    }

    signal
}

/// Causal single-pass filtering from rest
pub fn filter(cascade: &[BiquadCoeffs], input: &[f64]) -> Vec<f64> {
    let mut state = vec![[0.0; 2]; cascade.len()];
    run_cascade(cascade, input, &mut state)
}

/// Per-section step states, scaled by the DC gain of the sections before
fn cascade_step_states(cascade: &[BiquadCoeffs]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    cascade
        .iter()
        .map(|section| {
            let [z1, z2] = section.step_state();
            let zi = [z1 * scale, z2 * scale];
            scale *= section.dc_gain();
            zi
        })
        .collect()
}

/// Number of samples of odd-reflection padding for a cascade
fn pad_length(cascade: &[BiquadCoeffs]) -> usize {
    let first_order = cascade.iter().filter(|c| c.is_first_order()).count();
    let ntaps = 2 * cascade.len() + 1 - first_order;
    3 * ntaps
}

fn odd_extend(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}

/// Zero-phase forward-backward filtering
///
/// Output length equals input length.
pub fn filtfilt(cascade: &[BiquadCoeffs], input: &[f64]) -> Vec<f64> {
    if input.is_empty() || cascade.is_empty() {
        return input.to_vec();
    }

    let padlen = pad_length(cascade).min(input.len() - 1);
    let ext = odd_extend(input, padlen);
    let zi = cascade_step_states(cascade);

    let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * ext[0], z[1] * ext[0]]).collect();
    let mut forward = run_cascade(cascade, &ext, &mut state);
    forward.reverse();

    let head = forward[0];
    let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * head, z[1] * head]).collect();
    let mut backward = run_cascade(cascade, &forward, &mut state);
    backward.reverse();

    backward[padlen..padlen + input.len()].to_vec()
}

/// Zero-phase filter a buffer, returning a new buffer
pub fn apply_zero_phase(buffer: &AudioBuffer, cascade: &[BiquadCoeffs]) -> AudioBuffer {
    let input: Vec<f64> = buffer.samples().iter().map(|&s| s as f64).collect();
    let output = filtfilt(cascade, &input);

    AudioBuffer::from_raw(
        output.into_iter().map(|s| s as f32).collect(),
        buffer.sample_rate(),
    )
}

// ============================================================================
// Tests
// ============================================================================
