//! Audio Engine Module
//!
//! Core audio types shared by every stage:
//! - Mono audio buffer and level helpers
//! - WAV file I/O at the pipeline boundary
//! - Spectral measurements

pub mod analysis;
pub mod buffer;
pub mod io;

pub use analysis::{dominant_frequency, magnitude_at_frequency, magnitude_spectrum};
pub use buffer::{calculate_peak, calculate_rms, db_to_linear, linear_to_db, AudioBuffer};
pub use io::{export_wav, import_wav, ExportFormat, SourceFormat};
