//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::CaptureError;
use crate::classifier::ClassifierError;
use crate::config::ConfigError;
use crate::storage::{CodecError, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Dataset error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Classifier(ClassifierError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            AppError::Classifier(ClassifierError::EmptyDataset) => "EMPTY_DATASET",
            AppError::Classifier(_) => "CLASSIFIER_ERROR",
            AppError::Codec(CodecError::CorruptDataset(_))
            | AppError::Storage(StorageError::Codec(CodecError::CorruptDataset(_))) => "CORRUPT_DATASET",
            AppError::Codec(_) => "DATASET_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
