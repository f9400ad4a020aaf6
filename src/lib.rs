//! Bonetone - Conduction Voice Simulator
//!
//! Recorded speech sounds unfamiliar to the speaker because it lacks the
//! sound that reaches the inner ear through the skull and the ear's
//! cartilage. Bonetone approximates those paths offline and mixes them back
//! with the recording.
//!
//! # Architecture
//!
//! - `engine`: mono audio buffer, WAV I/O and spectral measurements
//! - `dsp`: filter design, convolution, soft clipping, mixing, pitch shifting
//! - `conduction`: impulse responses and the per-path layer processor
//! - `pipeline`: configuration, orchestration and run reports
//!
//! ```no_run
//! use std::path::Path;
//! use bonetone::pipeline::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! pipeline.run_file(Path::new("voice.wav"), Path::new("voice_inside.wav"))?;
//! # Ok::<(), bonetone::BonetoneError>(())
//! ```

pub mod cli;
pub mod conduction;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use error::{BonetoneError, Result};
