//! Soft Clipper
//!
//! Smooth saturation used to tame convolution-amplified peaks in a
//! conduction layer. Samples inside the threshold pass untouched; the
//! excursion beyond it is compressed with `d / (1 + d^2)`.

use crate::engine::AudioBuffer;
use crate::error::{BonetoneError, Result};

/// Threshold used by the conduction layer when compression is enabled
pub const LAYER_CLIP_THRESHOLD: f32 = 0.5;

/// Largest value the excursion term `d / (1 + d^2)` can reach (at d = 1)
pub const MAX_EXCURSION: f32 = 0.5;

/// Soft-clip one sample
///
/// Continuous and odd-symmetric. Output magnitude never exceeds
/// `threshold + MAX_EXCURSION`.
#[inline]
pub fn soft_clip_sample(sample: f32, threshold: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= threshold {
        return sample;
    }

    let d = (magnitude - threshold) as f64;
    let shaped = threshold as f64 + d / (1.0 + d * d);
    (shaped as f32).copysign(sample)
}

/// Soft-clip a buffer, returning a new buffer
pub fn soft_clip(buffer: &AudioBuffer, threshold: f32) -> Result<AudioBuffer> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(BonetoneError::invalid_parameter(
            "soft_clip",
            "threshold",
            threshold as f64,
            "must be a finite value > 0",
        ));
    }

    Ok(buffer.map(|s| soft_clip_sample(s, threshold)))
}
