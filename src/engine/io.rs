//! Audio file I/O for Bonetone
//!
//! WAV decoding and encoding at the pipeline boundary. Decoded audio is
//! downmixed to mono and converted to 32-bit float; sample rates are kept
//! as found in the file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::AudioBuffer;
use crate::error::{BonetoneError, Result};

/// Format of a decoded WAV file before downmixing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 16 }
    }
}

impl ExportFormat {
    /// Create a new export format with the given bit depth
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    /// Check that the bit depth is one the encoder can write
    pub fn validate(&self) -> Result<()> {
        match self.bit_depth {
            16 | 24 | 32 => Ok(()),
            other => Err(BonetoneError::UnsupportedFormat {
                details: format!("{}-bit audio (only 16, 24, 32 supported)", other),
            }),
        }
    }
}

/// Decode a WAV file and downmix it to a mono buffer
///
/// # Errors
/// * `Io` - If the file does not exist or cannot be opened
/// * `Codec` - If the file is not a valid WAV file
/// * `UnsupportedFormat` - If the integer bit depth is not 8/16/24/32
pub fn import_wav(path: &Path) -> Result<(AudioBuffer, SourceFormat)> {
    let file = File::open(path).map_err(|e| BonetoneError::io(path, e))?;
    let reader = WavReader::new(BufReader::new(file)).map_err(|e| BonetoneError::codec(path, e))?;

    let spec = reader.spec();
    let format = SourceFormat {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    };

    let interleaved = read_samples_as_f32(reader, path, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, spec.channels, spec.sample_rate)?;

    log::debug!(
        "Decoded {}: {} Hz, {} ch, {}-bit, {} mono samples",
        path.display(),
        format.sample_rate,
        format.channels,
        format.bits_per_sample,
        buffer.len()
    );

    Ok((buffer, format))
}

/// Encode a mono buffer as a WAV file
pub fn export_wav(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    format.validate()?;

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| BonetoneError::codec(path, e))?;

    match format.bit_depth {
        16 => {
            for &sample in buffer.samples() {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(scaled)
                    .map_err(|e| BonetoneError::codec(path, e))?;
            }
        }
        24 => {
            for &sample in buffer.samples() {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer
                    .write_sample(scaled)
                    .map_err(|e| BonetoneError::codec(path, e))?;
            }
        }
        _ => {
            for &sample in buffer.samples() {
                writer
                    .write_sample(sample)
                    .map_err(|e| BonetoneError::codec(path, e))?;
            }
        }
    }

    writer.finalize().map_err(|e| BonetoneError::codec(path, e))?;

    log::debug!(
        "Encoded {} samples to {} ({}-bit)",
        buffer.len(),
        path.display(),
        format.bit_depth
    );

    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    path: &Path,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| BonetoneError::codec(path, e));
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(BonetoneError::UnsupportedFormat {
                details: format!("{}-bit integer audio", bits),
            });
        }
    };

    // hound widens every integer depth to i32 on request
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| BonetoneError::codec(path, e))
}

// ============================================================================
// Tests
// ============================================================================
