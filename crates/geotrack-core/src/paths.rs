use crate::error::{GeotrackError, Result};
use crate::format::ExportFormat;
use crate::types::SourceQuery;
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_CONFIG_FILE: &str = "geotrack.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "geojson";

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// Deterministic artifact path: one file per source query, generation day and
/// format, so repeated exports on the same day overwrite instead of accumulating.
pub fn artifact_path(
    output_dir: &Path,
    source: &SourceQuery,
    generated_on: NaiveDate,
    format: ExportFormat,
) -> PathBuf {
    output_dir.join(format!(
        "{}_{}.{}",
        source.file_stem(),
        generated_on.format("%Y-%m-%d"),
        format.extension()
    ))
}

/// Resolve a caller-supplied file name inside `output_dir`.
///
/// Only bare file names are accepted; separators and `..` are rejected so HTTP
/// callers cannot write outside the output directory.
pub fn resolve_destination(output_dir: &Path, name: &str, format: ExportFormat) -> Result<PathBuf> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(GeotrackError::InvalidDestination(name.to_string()));
    }
    let mut path = output_dir.join(name);
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// IMEI validation
// ---------------------------------------------------------------------------

static IMEI_RE: OnceLock<Regex> = OnceLock::new();

fn imei_re() -> &'static Regex {
    IMEI_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap())
}

/// Device identifiers end up in artifact file names, so they must be path-safe.
pub fn validate_imei(imei: &str) -> Result<()> {
    if !imei_re().is_match(imei) {
        return Err(GeotrackError::InvalidImei(imei.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
