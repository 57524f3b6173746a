//! Dataset inspection through the external GDAL tooling.
//!
//! Opening the raster, reading its metadata and checking the COG layout are
//! all delegated: `gdalinfo -json` describes the dataset and the COG
//! validator script reports layout errors. This module only runs them and
//! parses what they print.

use std::process::{Command, Output};

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{InspectError, InspectResult};

/// Prefix GDAL uses to open remote files through HTTP range requests.
pub const VSICURL_PREFIX: &str = "/vsicurl/";

/// What the validator learned about one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    /// `gdalinfo -json` output.
    pub info: Value,
    /// COG layout violations; empty when the file is a valid COG.
    pub errors: Vec<String>,
    pub details: Value,
}

/// Opens and validates datasets.
pub trait Inspector: Send + Sync {
    /// Inspect the dataset at `path` (a local path or a `/vsicurl/` URL).
    ///
    /// Returns `Ok(None)` when the path cannot be opened as a GeoTIFF.
    fn inspect(&self, path: &str) -> InspectResult<Option<Inspection>>;
}

/// Runs `gdalinfo` and the COG validator script as subprocesses.
#[derive(Debug, Clone)]
pub struct GdalInspector {
    gdalinfo: String,
    validator: Vec<String>,
}

impl GdalInspector {
    pub fn new(gdalinfo: impl Into<String>, validator: Vec<String>) -> Self {
        Self {
            gdalinfo: gdalinfo.into(),
            validator,
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> InspectResult<Output> {
        Command::new(program)
            .args(args)
            .env("GDAL_DISABLE_READDIR_ON_OPEN", "EMPTY_DIR")
            .output()
            .map_err(|source| InspectError::Spawn {
                program: program.to_string(),
                source,
            })
    }
}

impl Inspector for GdalInspector {
    fn inspect(&self, path: &str) -> InspectResult<Option<Inspection>> {
        let info = self.run(&self.gdalinfo, &["-json", "-if", "GTiff", path])?;
        if !info.status.success() {
            debug!(
                path,
                stderr = %String::from_utf8_lossy(&info.stderr).trim(),
                "gdalinfo could not open dataset"
            );
            return Ok(None);
        }
        let info: Value = serde_json::from_slice(&info.stdout)?;

        let (program, leading) = self
            .validator
            .split_first()
            .ok_or(InspectError::NoValidatorCommand)?;
        let mut args: Vec<&str> = leading.iter().map(String::as_str).collect();
        args.push(path);
        let output = self.run(program, &args)?;

        let report = parse_report(&String::from_utf8_lossy(&output.stdout));
        // Exit status 1 means "not a COG"; anything else without a report
        // is a broken validator run.
        if !output.status.success() && report.errors.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(InspectError::Validator(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(Some(Inspection {
            info,
            errors: report.errors,
            details: json!({ "warnings": report.warnings }),
        }))
    }
}

/// Errors and warnings listed by the COG validator script.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Parse the validator's text report.
///
/// Items are ` - ` lines under a "following errors" or "following warnings"
/// heading.
pub fn parse_report(stdout: &str) -> Report {
    enum Section {
        None,
        Errors,
        Warnings,
    }

    let mut report = Report::default();
    let mut section = Section::None;
    for line in stdout.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("following errors") {
            section = Section::Errors;
        } else if lower.contains("following warnings") {
            section = Section::Warnings;
        } else if let Some(item) = line.strip_prefix(" - ") {
            match section {
                Section::Errors => report.errors.push(item.trim().to_string()),
                Section::Warnings => report.warnings.push(item.trim().to_string()),
                Section::None => {}
            }
        } else if line.trim().is_empty() {
            section = Section::None;
        }
    }
    report
}
