//! Error handling for Bonetone
//!
//! Every failure names the stage and parameter (or file) that caused it.
//! Nothing is retried: processing is deterministic, so errors surface
//! immediately to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Bonetone operations
pub type Result<T> = std::result::Result<T, BonetoneError>;

/// Main error type for Bonetone operations
#[derive(Error, Debug)]
pub enum BonetoneError {
    // Parameter Errors
    #[error("[{stage}] invalid parameter {param} = {value}: {reason}")]
    InvalidParameter {
        stage: &'static str,
        param: &'static str,
        value: f64,
        reason: String,
    },

    // Shape Errors
    #[error("[{stage}] shape mismatch: {details}")]
    ShapeMismatch {
        stage: &'static str,
        details: String,
    },

    // Audio Errors
    #[error("[{stage}] invalid audio: {reason}")]
    InvalidAudio {
        stage: &'static str,
        reason: String,
    },

    // File Errors
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio codec error on {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {details}")]
    UnsupportedFormat { details: String },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    // Concurrency Errors
    #[error("Conduction layer worker '{layer}' panicked")]
    WorkerPanicked { layer: &'static str },
}

impl BonetoneError {
    /// Shorthand for an [`BonetoneError::InvalidParameter`]
    pub fn invalid_parameter(
        stage: &'static str,
        param: &'static str,
        value: f64,
        reason: impl Into<String>,
    ) -> Self {
        BonetoneError::InvalidParameter {
            stage,
            param,
            value,
            reason: reason.into(),
        }
    }

    /// Wrap a file-system error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BonetoneError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a WAV codec error with the path it happened on
    pub fn codec(path: impl Into<PathBuf>, source: hound::Error) -> Self {
        BonetoneError::Codec {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    ///
    /// Missing and corrupt files share `IO_ERROR`: both abort the run the
    /// same way.
    pub fn error_code(&self) -> &'static str {
        match self {
            BonetoneError::InvalidParameter { .. } => "INVALID_PARAMETER",
            BonetoneError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            BonetoneError::InvalidAudio { .. } => "INVALID_AUDIO",
            BonetoneError::Io { .. } | BonetoneError::Codec { .. } => "IO_ERROR",
            BonetoneError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            BonetoneError::Config(_) => "CONFIG_ERROR",
            BonetoneError::WorkerPanicked { .. } => "WORKER_PANICKED",
        }
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            BonetoneError::InvalidParameter { .. } => {
                "Keep frequencies between 0 and the Nyquist frequency, Q and order positive"
            }
            BonetoneError::ShapeMismatch { .. } => {
                "Mix only layers derived from the same input buffer"
            }
            BonetoneError::InvalidAudio { .. } => "Check that the input contains finite, non-empty audio",
            BonetoneError::Io { .. } => "Check the file path is correct and readable",
            BonetoneError::Codec { .. } => "Convert the file to PCM or float WAV and try again",
            BonetoneError::UnsupportedFormat { .. } => "Use 16-bit, 24-bit or 32-bit float WAV",
            BonetoneError::Config(_) => "Regenerate the config with 'bonetone init-config'",
            BonetoneError::WorkerPanicked { .. } => "Re-run with --sequential to isolate the failure",
        }
    }
}
