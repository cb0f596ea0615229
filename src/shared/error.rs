use thiserror::Error;
use serde::Serialize;

/// Session errors
///
/// Every variant is recoverable: the controller turns it into a user-facing
/// message and returns to an interactive state. Transport failures of a
/// submission never show up here, they are `TranslationOutcome` variants.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// The processing server could not be reached
    #[error("Connectivity failure: {0}")]
    ConnectivityFailure(String),

    /// The image acquirer refused access to the photo library
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Upload payload could not be built from the selected image
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not connected to the translation server")]
    NotConnected,

    /// A submission is already in flight
    #[error("Another request is already in progress")]
    Busy,

    #[error("No image selected")]
    NoImageSelected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(format!("Serialization error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("Invalid server address: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
