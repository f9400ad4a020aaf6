//! Mixer / Normalizer
//!
//! Weighted sum of equally shaped layers followed by peak normalization.
//! Normalizing a single buffer is the one-layer, unity-gain case of the same
//! routine, so input, mix and post-pitch normalization all share it.

use crate::engine::AudioBuffer;
use crate::error::{BonetoneError, Result};

/// Default target peak as a fraction of full scale
pub const DEFAULT_TARGET_PEAK: f32 = 0.9;

/// One weighted input to a mix
#[derive(Debug, Clone, Copy)]
pub struct MixLayer<'a> {
    pub buffer: &'a AudioBuffer,
    pub gain: f32,
}

/// Layers to sum and the peak to normalize the result to
///
/// Exists only for the duration of one [`mix`] call.
#[derive(Debug, Clone)]
pub struct MixPlan<'a> {
    layers: Vec<MixLayer<'a>>,
    target_peak: f32,
}

impl<'a> MixPlan<'a> {
    /// Start an empty plan normalizing to `target_peak`
    pub fn new(target_peak: f32) -> Self {
        Self {
            layers: Vec::new(),
            target_peak,
        }
    }

    /// Add a layer with a linear gain
    pub fn layer(mut self, buffer: &'a AudioBuffer, gain: f32) -> Self {
        self.layers.push(MixLayer { buffer, gain });
        self
    }

    pub fn layers(&self) -> &[MixLayer<'a>] {
        &self.layers
    }

    pub fn target_peak(&self) -> f32 {
        self.target_peak
    }
}

fn validate_target_peak(target_peak: f32) -> Result<()> {
    if !target_peak.is_finite() || target_peak <= 0.0 {
        return Err(BonetoneError::invalid_parameter(
            "mixer",
            "target_peak",
            target_peak as f64,
            "must be a finite value > 0",
        ));
    }
    Ok(())
}

/// Sum the plan's layers and normalize the result to the target peak
///
/// # Errors
/// * `ShapeMismatch` - If the plan is empty or layers differ in length or
///   sample rate
/// * `InvalidParameter` - If the target peak or a gain is not finite
pub fn mix(plan: &MixPlan<'_>) -> Result<AudioBuffer> {
    validate_target_peak(plan.target_peak)?;

    let first = plan.layers.first().ok_or_else(|| BonetoneError::ShapeMismatch {
        stage: "mixer",
        details: "mix plan has no layers".to_string(),
    })?;
    let len = first.buffer.len();
    let sample_rate = first.buffer.sample_rate();

    for (index, layer) in plan.layers.iter().enumerate() {
        if layer.buffer.len() != len || layer.buffer.sample_rate() != sample_rate {
            return Err(BonetoneError::ShapeMismatch {
                stage: "mixer",
                details: format!(
                    "layer {} is {} samples at {} Hz, layer 0 is {} samples at {} Hz",
                    index,
                    layer.buffer.len(),
                    layer.buffer.sample_rate(),
                    len,
                    sample_rate
                ),
            });
        }
        if !layer.gain.is_finite() {
            return Err(BonetoneError::invalid_parameter(
                "mixer",
                "gain",
                layer.gain as f64,
                format!("gain of layer {} must be finite", index),
            ));
        }
    }

    let mut sum = vec![0.0_f64; len];
    for layer in &plan.layers {
        let gain = layer.gain as f64;
        for (acc, &s) in sum.iter_mut().zip(layer.buffer.samples()) {
            *acc += gain * s as f64;
        }
    }

    let peak = sum.iter().map(|s| s.abs()).fold(0.0_f64, f64::max);
    let scale = if peak > 0.0 {
        plan.target_peak as f64 / peak
    } else {
        // Silence stays silence
        1.0
    };

    log::debug!(
        "Mixed {} layers: raw peak {:.4}, scale {:.4}",
        plan.layers.len(),
        peak,
        scale
    );

    Ok(AudioBuffer::from_raw(
        sum.into_iter().map(|s| (s * scale) as f32).collect(),
        sample_rate,
    ))
}

/// Rescale a buffer so its peak equals `target_peak`
///
/// Silent buffers are returned unchanged.
pub fn normalize_peak(buffer: &AudioBuffer, target_peak: f32) -> Result<AudioBuffer> {
    mix(&MixPlan::new(target_peak).layer(buffer, 1.0))
}
