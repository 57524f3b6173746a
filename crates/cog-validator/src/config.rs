//! cog.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ValidatorResult;

/// Largest accepted request body: the synchronous payload limit of the
/// serverless gateway.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 6 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CogConfig {
    /// Request bodies above this many bytes are rejected with 413.
    pub max_content_length: u64,
    /// Directory for staged uploads and downloads. System temp dir if unset.
    pub staging_dir: Option<PathBuf>,
    /// Directory holding `byte_cog_valid.tif` and `byte.tif`.
    pub self_test_dir: PathBuf,
    pub gdalinfo: String,
    /// COG validator program and leading arguments; the dataset path is appended.
    pub validator_command: Vec<String>,
    /// Host name forced onto serverless events (CDN-fronted deployments).
    pub server_name: Option<String>,
    pub binary_media_types: Vec<String>,
    pub fetch_timeout_secs: u64,
}

impl Default for CogConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            staging_dir: None,
            self_test_dir: PathBuf::from("fixtures"),
            gdalinfo: "gdalinfo".to_string(),
            validator_command: vec![
                "python3".to_string(),
                "validate_cloud_optimized_geotiff.py".to_string(),
            ],
            server_name: None,
            binary_media_types: vec!["image/tiff".to_string()],
            fetch_timeout_secs: 30,
        }
    }
}

impl CogConfig {
    pub fn from_file(path: &Path) -> ValidatorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CogConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` (or defaults) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> ValidatorResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `COG_SERVER_NAME` / `SERVER_NAME` and `COG_MAX_CONTENT_LENGTH`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("COG_SERVER_NAME").or_else(|| lookup("SERVER_NAME")) {
            if !name.is_empty() {
                self.server_name = Some(name);
            }
        }
        if let Some(limit) = lookup("COG_MAX_CONTENT_LENGTH").and_then(|v| v.parse().ok()) {
            self.max_content_length = limit;
        }
    }
}
