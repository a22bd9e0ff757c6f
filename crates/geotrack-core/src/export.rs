use crate::error::{GeotrackError, Result};
use crate::format::ExportFormat;
use crate::geojson::FeatureCollection;
use crate::io;
use crate::paths;
use crate::types::{DeviceLocation, SourceQuery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An export that has been written to disk. `collection` is the validated
/// model the file was rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub collection: FeatureCollection,
}

impl ExportArtifact {
    pub fn source(&self) -> &SourceQuery {
        &self.collection.metadata.source
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.collection.metadata.generated_at
    }

    pub fn total_features(&self) -> usize {
        self.collection.metadata.total_features
    }
}

/// Writes FeatureCollections, in any [`ExportFormat`], under a fixed output
/// directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Default artifact path for `source` generated at `at`.
    pub fn destination_for(&self, source: &SourceQuery, at: DateTime<Utc>, format: ExportFormat) -> PathBuf {
        paths::artifact_path(&self.output_dir, source, at.date_naive(), format)
    }

    /// Caller-named artifact inside the output directory.
    pub fn named_destination(&self, name: &str, format: ExportFormat) -> Result<PathBuf> {
        paths::resolve_destination(&self.output_dir, name, format)
    }

    pub fn build(&self, locations: &[DeviceLocation], source: SourceQuery) -> Result<FeatureCollection> {
        FeatureCollection::build(locations, source)
    }

    /// Render fully in memory, then write atomically.
    pub fn write(
        &self,
        collection: FeatureCollection,
        destination: &Path,
        format: ExportFormat,
    ) -> Result<ExportArtifact> {
        let bytes = format.render(&collection)?;
        io::write_artifact(destination, &bytes)?;
        tracing::debug!(
            path = %destination.display(),
            %format,
            features = collection.len(),
            source = %collection.metadata.source,
            "wrote artifact"
        );
        Ok(ExportArtifact {
            path: destination.to_path_buf(),
            format,
            collection,
        })
    }

    /// [`write`](Self::write) on the blocking pool, for async callers.
    pub async fn write_blocking(
        &self,
        collection: FeatureCollection,
        destination: PathBuf,
        format: ExportFormat,
    ) -> Result<ExportArtifact> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || exporter.write(collection, &destination, format))
            .await
            .map_err(|e| GeotrackError::Task(format!("export task join error: {e}")))?
    }

    /// Build and write in one step. `destination` defaults to the deterministic
    /// name for the source query and format.
    pub fn export(
        &self,
        locations: &[DeviceLocation],
        source: SourceQuery,
        destination: Option<&Path>,
        format: ExportFormat,
    ) -> Result<ExportArtifact> {
        let collection = self.build(locations, source)?;
        let path = match destination {
            Some(p) => p.to_path_buf(),
            None => self.destination_for(
                &collection.metadata.source,
                collection.metadata.generated_at,
                format,
            ),
        };
        self.write(collection, &path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn loc(imei: &str, lat: f64, lon: f64) -> DeviceLocation {
        let ts = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        DeviceLocation::new(imei, lat, lon, ts)
    }

    #[test]
    fn export_writes_deterministic_file() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let artifact = exporter
            .export(&[loc("a", 19.4, -99.1)], SourceQuery::Current, None, ExportFormat::GeoJson)
            .unwrap();

        let expected = dir.path().join(format!(
            "current_{}.geojson",
            artifact.generated_at().format("%Y-%m-%d")
        ));
        assert_eq!(artifact.path, expected);

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&artifact.path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
        assert_eq!(written["features"][0]["geometry"]["coordinates"], serde_json::json!([-99.1, 19.4]));
        assert_eq!(written["metadata"]["total_features"], 1);
    }

    #[test]
    fn repeated_exports_overwrite() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let first = exporter.export(&[loc("a", 1.0, 1.0)], SourceQuery::Current, None, ExportFormat::GeoJson).unwrap();
        let second = exporter
            .export(&[loc("a", 1.0, 1.0), loc("b", 2.0, 2.0)], SourceQuery::Current, None, ExportFormat::GeoJson)
            .unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_export_writes_empty_collection() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let artifact = exporter.export(&[], SourceQuery::Current, None, ExportFormat::GeoJson).unwrap();
        assert_eq!(artifact.total_features(), 0);
        assert!(artifact.path.exists());
    }

    #[test]
    fn invalid_coordinates_write_nothing() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let err = exporter
            .export(&[loc("a", 91.0, 0.0)], SourceQuery::Current, None, ExportFormat::GeoJson)
            .unwrap_err();
        assert!(matches!(err, GeotrackError::InvalidCoordinates { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_destination_is_export_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let exporter = Exporter::new(&blocker);

        let err = exporter
            .export(&[loc("a", 1.0, 1.0)], SourceQuery::Current, None, ExportFormat::GeoJson)
            .unwrap_err();
        assert!(matches!(err, GeotrackError::Export { .. }));
    }

    #[test]
    fn explicit_destination_is_used() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let dest = exporter.named_destination("fleet", ExportFormat::GeoJson).unwrap();
        let artifact = exporter
            .export(&[loc("a", 1.0, 1.0)], SourceQuery::Current, Some(&dest), ExportFormat::GeoJson)
            .unwrap();
        assert_eq!(artifact.path, dir.path().join("fleet.geojson"));
        assert!(artifact.path.exists());
    }

    #[test]
    fn csv_and_kml_exports_sit_beside_geojson() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let locations = [loc("a", 19.4, -99.1), loc("b", 20.0, -100.0)];

        let mut csv_path = None;
        for format in ExportFormat::ALL {
            let artifact = exporter
                .export(&locations, SourceQuery::Current, None, format)
                .unwrap();
            assert_eq!(artifact.format, format);
            assert_eq!(artifact.total_features(), 2);
            assert_eq!(
                artifact.path.extension().and_then(|e| e.to_str()),
                Some(format.extension())
            );
            if format == ExportFormat::Csv {
                csv_path = Some(artifact.path);
            }
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);

        let csv = std::fs::read_to_string(csv_path.unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(1).unwrap().starts_with("a,,19.4,-99.1,"));
    }

    #[test]
    fn invalid_coordinates_fail_every_format() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        for format in ExportFormat::ALL {
            let err = exporter
                .export(&[loc("a", 0.0, 181.0)], SourceQuery::Current, None, format)
                .unwrap_err();
            assert!(matches!(err, GeotrackError::InvalidCoordinates { .. }));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
