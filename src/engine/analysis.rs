//! Spectral measurements
//!
//! Used by the run report and by tests that check where energy ends up
//! after filtering or pitch shifting.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::engine::buffer::AudioBuffer;

/// Magnitude spectrum of the first `fft_size` samples (Hann windowed)
///
/// Returns `fft_size / 2` bins, or an empty vector when the buffer is
/// shorter than `fft_size`.
pub fn magnitude_spectrum(buffer: &AudioBuffer, fft_size: usize) -> Vec<f32> {
    let samples = buffer.samples();
    if fft_size < 2 || samples.len() < fft_size {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut spectrum: Vec<Complex<f32>> = samples
        .iter()
        .take(fft_size)
        .enumerate()
        .map(|(i, &s)| {
            let window =
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos());
            Complex::new(s * window, 0.0)
        })
        .collect();

    fft.process(&mut spectrum);

    spectrum
        .iter()
        .take(fft_size / 2)
        .map(|c| c.norm() / (fft_size as f32 / 2.0))
        .collect()
}

/// Frequency (Hz) of the strongest bin, ignoring DC
///
/// Returns `None` for buffers shorter than `fft_size` or with no energy.
pub fn dominant_frequency(buffer: &AudioBuffer, fft_size: usize) -> Option<f32> {
    let spectrum = magnitude_spectrum(buffer, fft_size);
    let bin_hz = buffer.sample_rate() as f32 / fft_size as f32;

    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &m)| m > 0.0)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(bin, _)| bin as f32 * bin_hz)
}

/// Magnitude at a specific frequency (nearest bin)
pub fn magnitude_at_frequency(buffer: &AudioBuffer, frequency: f32, fft_size: usize) -> f32 {
    let spectrum = magnitude_spectrum(buffer, fft_size);
    let bin_hz = buffer.sample_rate() as f32 / fft_size as f32;
    let bin = (frequency / bin_hz).round() as usize;
    spectrum.get(bin).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_frequency_of_sine() {
        let tone = AudioBuffer::sine_wave(1000.0, 0.5, 44100, 0.8);
        let freq = dominant_frequency(&tone, 8192).unwrap();

        let bin_hz = 44100.0 / 8192.0;
        assert!((freq - 1000.0).abs() <= bin_hz, "got {}", freq);
    }

    #[test]
    fn test_silence_has_no_dominant_frequency() {
        let silence = AudioBuffer::silence(4096, 44100);
        assert_eq!(dominant_frequency(&silence, 4096), None);
    }

    #[test]
    fn test_short_buffer_has_empty_spectrum() {
        let tone = AudioBuffer::sine_wave(440.0, 0.01, 44100, 1.0);
        assert!(magnitude_spectrum(&tone, 4096).is_empty());
    }

    #[test]
    fn test_magnitude_at_frequency_prefers_tone() {
        let tone = AudioBuffer::sine_wave(2000.0, 0.5, 48000, 1.0);
        let on = magnitude_at_frequency(&tone, 2000.0, 4096);
        let off = magnitude_at_frequency(&tone, 6000.0, 4096);
        assert!(on > 100.0 * off, "on={} off={}", on, off);
    }
}
