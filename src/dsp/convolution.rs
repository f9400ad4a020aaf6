//! Linear convolution truncated to the input length
//!
//! Keeps samples `[0, len(signal))` of the full convolution and drops the
//! tail, so every conduction layer stays sample-aligned with its input.

use rustfft::{num_complex::Complex, FftPlanner};

/// Responses up to this many taps are convolved directly
pub const DIRECT_CONVOLUTION_MAX_TAPS: usize = 64;

/// Full linear convolution of `signal` with `kernel`, truncated to
/// `signal.len()` samples
pub fn convolve_truncated(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return vec![0.0; signal.len()];
    }

    if kernel.len() <= DIRECT_CONVOLUTION_MAX_TAPS {
        convolve_direct(signal, kernel)
    } else {
        convolve_fft(signal, kernel)
    }
}

/// Time-domain convolution, O(N*M)
pub fn convolve_direct(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    (0..signal.len())
        .map(|n| {
            let taps = kernel.len().min(n + 1);
            (0..taps).map(|k| kernel[k] * signal[n - k]).sum()
        })
        .collect()
}

/// Frequency-domain convolution through one zero-padded FFT
pub fn convolve_fft(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let full_len = signal.len() + kernel.len() - 1;
    let fft_len = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let pad = |data: &[f64]| -> Vec<Complex<f64>> {
        let mut padded: Vec<Complex<f64>> = data.iter().map(|&x| Complex::new(x, 0.0)).collect();
        padded.resize(fft_len, Complex::new(0.0, 0.0));
        padded
    };

    let mut signal_spectrum = pad(signal);
    let mut kernel_spectrum = pad(kernel);
    forward.process(&mut signal_spectrum);
    forward.process(&mut kernel_spectrum);

    for (s, k) in signal_spectrum.iter_mut().zip(kernel_spectrum.iter()) {
        *s = *s * *k;
    }
    inverse.process(&mut signal_spectrum);

    // rustfft leaves the inverse unnormalized
    let scale = 1.0 / fft_len as f64;
    signal_spectrum
        .iter()
        .take(signal.len())
        .map(|c| c.re * scale)
        .collect()
}
