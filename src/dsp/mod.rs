//! DSP Building Blocks
//!
//! Stateless signal processing stages used by the conduction pipeline.
//! Every stage borrows its input and returns a new buffer.

mod convolution;
mod filter;
mod mixer;
mod pitch;
mod saturation;

pub use convolution::{convolve_direct, convolve_fft, convolve_truncated, DIRECT_CONVOLUTION_MAX_TAPS};
pub use filter::{
    apply_zero_phase, design_lowpass, design_peaking, filter, filtfilt, frequency_response,
    BiquadCoeffs,
};
pub use mixer::{mix, normalize_peak, MixLayer, MixPlan, DEFAULT_TARGET_PEAK};
pub use pitch::{pitch_ratio, shift_pitch, FFT_SIZE, HOP_SIZE, MAX_SEMITONES};
pub use saturation::{soft_clip, soft_clip_sample, LAYER_CLIP_THRESHOLD, MAX_EXCURSION};
