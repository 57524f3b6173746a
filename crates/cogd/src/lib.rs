//! cogd: hosts for the COG validator.
//!
//! - `serve`: standalone HTTP/1.1 server ([`trigger::HttpTrigger`])
//! - `lambda`: serverless runtime loop ([`lambda::run`])
//!
//! Both feed requests through the same [`cog_gateway::Gateway`].

pub mod convert;
pub mod lambda;
pub mod trigger;

use cog_gateway::Gateway;
use cog_validator::CogConfig;

/// Adapter configured from the service settings.
pub fn gateway_for(config: &CogConfig) -> Gateway {
    Gateway::new().with_binary_media_types(config.binary_media_types.iter().cloned())
}
