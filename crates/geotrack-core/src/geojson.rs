//! Typed GeoJSON (RFC 7946) documents built from device locations.
//!
//! Coordinates are always `[longitude, latitude]`. Locations are validated while
//! the collection is built: one bad record fails the whole collection.

use crate::error::{GeotrackError, Result};
use crate::types::{DeviceLocation, SourceQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    Feature,
}

// ---------------------------------------------------------------------------
// Geometry / Feature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub imei: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    /// Point feature for one location, rejecting out-of-range coordinates.
    pub fn from_location(loc: &DeviceLocation) -> Result<Self> {
        if !loc.has_valid_coordinates() {
            return Err(GeotrackError::InvalidCoordinates {
                imei: loc.imei.clone(),
                latitude: loc.latitude,
                longitude: loc.longitude,
            });
        }
        Ok(Self {
            tag: FeatureTag::Feature,
            geometry: Geometry::Point {
                coordinates: [loc.longitude, loc.latitude],
            },
            properties: FeatureProperties {
                imei: loc.imei.clone(),
                timestamp: loc.timestamp,
                device_name: loc.device_name.clone(),
                speed_kmh: loc.speed_kmh,
                heading_deg: loc.heading_deg,
                online: loc.online,
                acc_on: loc.acc_on,
                satellites: loc.satellites,
                battery_percent: loc.battery_percent,
                address: loc.address.clone(),
            },
        })
    }

    pub fn coordinates(&self) -> [f64; 2] {
        match self.geometry {
            Geometry::Point { coordinates } => coordinates,
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureCollection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub generated_at: DateTime<Utc>,
    pub source: SourceQuery,
    pub total_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub tag: FeatureCollectionTag,
    /// `[min_lon, min_lat, max_lon, max_lat]`, absent for an empty collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    pub features: Vec<Feature>,
    pub metadata: ExportMetadata,
}

impl FeatureCollection {
    pub fn build(locations: &[DeviceLocation], source: SourceQuery) -> Result<Self> {
        Self::build_at(locations, source, Utc::now())
    }

    pub fn build_at(
        locations: &[DeviceLocation],
        source: SourceQuery,
        generated_at: DateTime<Utc>,
    ) -> Result<Self> {
        let features = locations
            .iter()
            .map(Feature::from_location)
            .collect::<Result<Vec<_>>>()?;
        let bbox = bounding_box(&features);
        Ok(Self {
            tag: FeatureCollectionTag::FeatureCollection,
            bbox,
            metadata: ExportMetadata {
                generated_at,
                source,
                total_features: features.len(),
            },
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

fn bounding_box(features: &[Feature]) -> Option<[f64; 4]> {
    let mut iter = features.iter().map(Feature::coordinates);
    let [lon, lat] = iter.next()?;
    let init = [lon, lat, lon, lat];
    Some(iter.fold(init, |[min_lon, min_lat, max_lon, max_lat], [lon, lat]| {
        [
            min_lon.min(lon),
            min_lat.min(lat),
            max_lon.max(lon),
            max_lat.max(lat),
        ]
    }))
}
