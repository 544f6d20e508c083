//! Error types for the composer.
//!
//! Every fallible operation in the crate reports a [`ComposerError`] carrying
//! an [`ErrorCode`], so callers can tell model problems from storage problems
//! without string matching.

use std::fmt;

/// Error codes identifying the failing stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// ONNX model files not found at expected path.
    ModelNotFound,

    /// Failed to load an ONNX model or the tokenizer.
    /// Trigger: Corrupt file, wrong format, or OOM during load.
    ModelLoadFailed,

    /// Failed to download model files from the hub.
    ModelDownloadFailed,

    /// Model inference failed during generation.
    /// Trigger: Numerical instability, OOM, malformed model output.
    ModelInferenceFailed,

    /// Requested duration is not a positive number of seconds.
    InvalidDuration,

    /// Writing the lossless audio file failed.
    AudioWriteFailed,

    /// Converting the lossless file to the compressed container failed.
    TranscodeFailed,

    /// The media directory could not be prepared.
    StorageFailed,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::InvalidDuration => "INVALID_DURATION",
            ErrorCode::AudioWriteFailed => "AUDIO_WRITE_FAILED",
            ErrorCode::TranscodeFailed => "TRANSCODE_FAILED",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "ONNX model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load ONNX model into memory",
            ErrorCode::ModelDownloadFailed => "Failed to download model from remote source",
            ErrorCode::ModelInferenceFailed => "Model inference failed during generation",
            ErrorCode::InvalidDuration => "Duration must be a positive number of seconds",
            ErrorCode::AudioWriteFailed => "Failed to write audio file",
            ErrorCode::TranscodeFailed => "Failed to transcode audio to the compressed format",
            ErrorCode::StorageFailed => "Failed to prepare the media directory",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => {
                "Enable COMPOSER_AUTO_DOWNLOAD or place the MusicGen ONNX export \
                 in COMPOSER_MODEL_PATH"
            }
            ErrorCode::ModelLoadFailed => {
                "Check available memory (4GB+ recommended), verify model files are not corrupted, \
                 or delete the model directory and re-download"
            }
            ErrorCode::ModelDownloadFailed => {
                "Check internet connection and disk space (500MB+ required), then try again"
            }
            ErrorCode::ModelInferenceFailed => {
                "Try a shorter duration or force CPU execution with COMPOSER_DEVICE=cpu"
            }
            ErrorCode::InvalidDuration => "Request at least one second of audio",
            ErrorCode::AudioWriteFailed => {
                "Check that the media root is writable and the disk is not full"
            }
            ErrorCode::TranscodeFailed => {
                "Install ffmpeg or build with the `mp3` feature; WAV output is kept meanwhile"
            }
            ErrorCode::StorageFailed => {
                "Check permissions on COMPOSER_MEDIA_ROOT"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for composer operations.
#[derive(Debug)]
pub struct ComposerError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ComposerError {
    /// Creates a new ComposerError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ComposerError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_INFERENCE_FAILED error.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelInferenceFailed,
            format!("Inference failed: {}", reason.into()),
        )
    }

    /// Creates an INVALID_DURATION error.
    pub fn invalid_duration(duration: u32) -> Self {
        Self::new(
            ErrorCode::InvalidDuration,
            format!("Invalid duration: {} seconds (must be at least 1)", duration),
        )
    }

    /// Creates an AUDIO_WRITE_FAILED error.
    pub fn audio_write_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::AudioWriteFailed, reason)
    }

    /// Creates a TRANSCODE_FAILED error.
    pub fn transcode_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::TranscodeFailed,
            format!("Transcoding failed: {}", reason.into()),
        )
    }

    /// Creates a STORAGE_FAILED error wrapping an I/O error.
    pub fn storage_failed(reason: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_source(ErrorCode::StorageFailed, reason, source)
    }
}

impl fmt::Display for ComposerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for ComposerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<hound::Error> for ComposerError {
    fn from(error: hound::Error) -> Self {
        Self::with_source(
            ErrorCode::AudioWriteFailed,
            format!("WAV I/O failed: {}", error),
            error,
        )
    }
}

/// Result type alias using ComposerError.
pub type Result<T> = std::result::Result<T, ComposerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    const ALL_CODES: [ErrorCode; 8] = [
        ErrorCode::ModelNotFound,
        ErrorCode::ModelLoadFailed,
        ErrorCode::ModelDownloadFailed,
        ErrorCode::ModelInferenceFailed,
        ErrorCode::InvalidDuration,
        ErrorCode::AudioWriteFailed,
        ErrorCode::TranscodeFailed,
        ErrorCode::StorageFailed,
    ];

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::ModelNotFound.as_str(), "MODEL_NOT_FOUND");
        assert_eq!(ErrorCode::ModelInferenceFailed.as_str(), "MODEL_INFERENCE_FAILED");
        assert_eq!(ErrorCode::TranscodeFailed.as_str(), "TRANSCODE_FAILED");
        assert_eq!(ErrorCode::StorageFailed.as_str(), "STORAGE_FAILED");
    }

    #[test]
    fn every_code_has_description_and_hint() {
        for code in ALL_CODES {
            assert!(!code.description().is_empty(), "{code} has no description");
            assert!(!code.recovery_hint().is_empty(), "{code} has no hint");
        }
    }

    #[test]
    fn display_includes_code_and_recovery() {
        let err = ComposerError::invalid_duration(0);
        let text = err.to_string();
        assert!(text.starts_with("[INVALID_DURATION]"));
        assert!(text.contains("0 seconds"));
        assert!(text.contains("Recovery:"));
    }

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = ComposerError::storage_failed("cannot create compositions/", io);
        assert_eq!(err.code, ErrorCode::StorageFailed);
        assert!(err.source().is_some());
    }
}
