//! cog-validator: Cloud Optimized GeoTIFF validation service.
//!
//! Accepts a GeoTIFF by URL, multipart upload or base64 form field, stages
//! it when needed, hands it to the external GDAL tooling and renders the
//! verdict as JSON or HTML. The service implements
//! [`cog_gateway::Application`], so it runs unchanged behind the gateway
//! adapter or the standalone HTTP server.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET, POST | `/api/validate` | Validate, JSON verdict |
//! | GET | `/html` | Upload form |
//! | POST | `/html/validate` | Validate, HTML verdict |
//! | GET | `/health` | Liveness |
//! | GET | `/self_test/valid.tif` | Known-good COG |
//! | GET | `/self_test/invalid.tif` | Known-bad COG |

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod form;
pub mod html;
pub mod inspect;
pub mod reply;
pub mod router;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

pub use config::CogConfig;
pub use error::{ValidatorError, ValidatorResult};
pub use fetch::{Fetcher, HttpFetcher, Probe};
pub use inspect::{GdalInspector, Inspection, Inspector};
pub use reply::{Outcome, Reply};
pub use router::Request;

/// The validation service. Cheap to share behind an `Arc`.
pub struct CogService {
    config: CogConfig,
    inspector: Arc<dyn Inspector>,
    fetcher: Arc<dyn Fetcher>,
}

impl CogService {
    pub fn new(config: CogConfig, inspector: Arc<dyn Inspector>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            inspector,
            fetcher,
        }
    }

    /// Service backed by the GDAL command-line tools and a blocking HTTP client.
    pub fn from_config(config: CogConfig) -> Self {
        let inspector = GdalInspector::new(config.gdalinfo.clone(), config.validator_command.clone());
        let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs));
        Self::new(config, Arc::new(inspector), Arc::new(fetcher))
    }

    pub fn config(&self) -> &CogConfig {
        &self.config
    }
}
