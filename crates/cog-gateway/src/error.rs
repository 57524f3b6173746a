//! Error types for the gateway adapter.

use thiserror::Error;

/// Result type alias for adapter operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the adapter to its host process.
///
/// Handler failures are not represented here: the handler reports those
/// through the normal status/body channel.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound event is missing a required field or has the wrong shape.
    #[error("malformed event: {0}")]
    MalformedInput(String),

    /// The response body could not be decoded as UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    EncodingFailure(#[from] std::string::FromUtf8Error),
}
