//! Conduction Layer Processor
//!
//! Turns the normalized air signal into one conduction path: band-limit,
//! add body with a mid boost, smear through the path's impulse response,
//! and optionally soft clip the result.

use crate::dsp::{
    apply_zero_phase, convolve_truncated, design_lowpass, design_peaking, soft_clip,
    LAYER_CLIP_THRESHOLD,
};
use crate::engine::AudioBuffer;
use crate::error::{BonetoneError, Result};

use super::impulse::ImpulseResponse;

/// Butterworth order of the layer lowpass
pub const LAYER_LOWPASS_ORDER: usize = 4;

/// Q of the mid-boost peaking section
pub const MID_BOOST_Q: f64 = 0.7;

/// Run one conduction layer over `input`
///
/// The output always has exactly `input.len()` samples: the convolution tail
/// is discarded. No normalization happens here.
///
/// # Errors
/// * `InvalidAudio` - If the input is empty or non-finite
/// * `InvalidParameter` - If a filter parameter is out of range or
///   `sample_rate_hz` disagrees with the input buffer
pub fn process(
    input: &AudioBuffer,
    sample_rate_hz: u32,
    lowpass_cutoff_hz: f64,
    mid_boost_freq_hz: f64,
    mid_boost_gain_db: f64,
    impulse_response: &ImpulseResponse,
    compression_enabled: bool,
) -> Result<AudioBuffer> {
    input.ensure_processable("conduction_layer")?;
    if sample_rate_hz != input.sample_rate() {
        return Err(BonetoneError::invalid_parameter(
            "conduction_layer",
            "sample_rate_hz",
            sample_rate_hz as f64,
            format!("input buffer is {} Hz", input.sample_rate()),
        ));
    }

    let lowpass = design_lowpass(lowpass_cutoff_hz, sample_rate_hz, LAYER_LOWPASS_ORDER)?;
    let mid_boost = design_peaking(mid_boost_freq_hz, sample_rate_hz, mid_boost_gain_db, MID_BOOST_Q)?;

    let band_limited = apply_zero_phase(input, &lowpass);
    let boosted = apply_zero_phase(&band_limited, &[mid_boost]);

    let signal: Vec<f64> = boosted.samples().iter().map(|&s| s as f64).collect();
    let convolved = convolve_truncated(&signal, impulse_response.samples());
    let convolved = AudioBuffer::from_raw(
        convolved.into_iter().map(|s| s as f32).collect(),
        input.sample_rate(),
    );

    let output = if compression_enabled {
        soft_clip(&convolved, LAYER_CLIP_THRESHOLD)?
    } else {
        convolved
    };

    log::debug!(
        "Conduction layer (lowpass {} Hz, boost {:+} dB @ {} Hz, {} tap IR): peak {:.4} -> {:.4}",
        lowpass_cutoff_hz,
        mid_boost_gain_db,
        mid_boost_freq_hz,
        impulse_response.len(),
        input.peak(),
        output.peak()
    );

    Ok(output)
}
