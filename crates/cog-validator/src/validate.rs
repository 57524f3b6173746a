//! Validation of a resolved input: a URL (read in place or downloaded) or a
//! staged local file.

use std::io::Write;
use std::path::Path;

use http::StatusCode;
use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::CogService;
use crate::fetch::Probe;
use crate::form::Fields;
use crate::inspect::{Inspection, VSICURL_PREFIX};
use crate::reply::Outcome;

impl CogService {
    /// Validate the dataset named by `args["url"]`.
    ///
    /// `use_vsicurl` (default `true`) selects between reading the URL in
    /// place through GDAL and downloading it to a staged file first.
    pub fn validate(&self, args: &Fields) -> Outcome {
        let Some(url) = args.get("url") else {
            return Outcome::failure(StatusCode::BAD_REQUEST, "url missing");
        };

        let use_vsicurl = match args
            .get("use_vsicurl")
            .unwrap_or("true")
            .to_ascii_lowercase()
            .as_str()
        {
            "true" => true,
            "false" => false,
            _ => {
                return Outcome::failure(
                    StatusCode::BAD_REQUEST,
                    "invalid value for use_vsicurl option. Expected true or false",
                );
            }
        };

        info!(url, use_vsicurl, "validating remote dataset");
        if use_vsicurl {
            self.validate_in_place(url)
        } else {
            self.validate_downloaded(url)
        }
    }

    /// Validate a file already on disk, reported under `name`.
    pub fn validate_local(&self, path: &Path, name: &str) -> Outcome {
        match self.inspector.inspect(&path.to_string_lossy()) {
            Ok(Some(inspection)) => report(name, inspection, true),
            Ok(None) => not_gtiff(name),
            Err(e) => internal_error(&e),
        }
    }

    /// Stage `data` to a temporary file and validate it. The file is removed
    /// before returning.
    pub fn validate_bytes(&self, data: &[u8], name: &str) -> Outcome {
        let staged = match self.stage(data) {
            Ok(staged) => staged,
            Err(e) => return internal_error(&e),
        };
        debug!(path = ?staged.path(), bytes = data.len(), "staged input");
        self.validate_local(staged.path(), name)
    }

    fn validate_in_place(&self, url: &str) -> Outcome {
        let path = format!("{VSICURL_PREFIX}{url}");
        match self.inspector.inspect(&path) {
            Ok(Some(inspection)) => report(url, inspection, false),
            Ok(None) => match self.fetcher.probe(url) {
                Ok(Probe::Readable) => not_gtiff(url),
                Ok(Probe::Empty(reason)) => {
                    let mut msg = format!("Cannot download {url}");
                    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
                        msg.push_str(": ");
                        msg.push_str(&reason);
                    }
                    Outcome::failure(StatusCode::BAD_REQUEST, msg)
                }
                Err(e) => {
                    debug!(url, error = %e, "probe failed");
                    Outcome::failure(StatusCode::BAD_REQUEST, format!("Cannot download {url}"))
                }
            },
            Err(e) => internal_error(&e),
        }
    }

    fn validate_downloaded(&self, url: &str) -> Outcome {
        let data = match self.fetcher.download(url) {
            Ok(data) => data,
            Err(e) => {
                debug!(url, error = %e, "download failed");
                return Outcome::failure(
                    StatusCode::BAD_REQUEST,
                    format!("Cannot download {url}"),
                );
            }
        };
        self.validate_bytes(&data, url)
    }

    fn stage(&self, data: &[u8]) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cog_validator_").suffix(".tif");
        let mut file = match &self.config.staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }
}

fn report(name: &str, mut inspection: Inspection, staged: bool) -> Outcome {
    if let Some(info) = inspection.info.as_object_mut() {
        if staged {
            info.remove("files");
        }
        info.insert("description".to_string(), Value::String(name.to_string()));
    }

    if inspection.errors.is_empty() {
        Outcome::new(
            StatusCode::OK,
            json!({
                "status": "success",
                "gdal_info": inspection.info,
                "details": inspection.details,
            }),
        )
    } else {
        Outcome::new(
            StatusCode::BAD_REQUEST,
            json!({
                "status": "failure",
                "gdal_info": inspection.info,
                "details": inspection.details,
                "validation_errors": inspection.errors,
            }),
        )
    }
}

fn not_gtiff(name: &str) -> Outcome {
    Outcome::failure(
        StatusCode::BAD_REQUEST,
        format!("{name} is not a GTiff file"),
    )
}

fn internal_error(e: &dyn std::fmt::Display) -> Outcome {
    error!(error = %e, "validation failed");
    Outcome::failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
