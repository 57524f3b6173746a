//! Error types for the validation service.

use thiserror::Error;

/// Result type alias for service operations.
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Result type alias for dataset inspection.
pub type InspectResult<T> = Result<T, InspectError>;

/// Result type alias for remote fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Errors from the external GDAL tooling.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("gdalinfo produced invalid JSON: {0}")]
    InvalidInfo(#[from] serde_json::Error),

    #[error("validator command is empty")]
    NoValidatorCommand,

    #[error("validator failed: {0}")]
    Validator(String),
}

/// Errors from HTTP fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("cannot reach {url}: {source}")]
    Unreachable {
        url: String,
        source: reqwest::Error,
    },
}
