use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// DeviceLocation
// ---------------------------------------------------------------------------

/// One vendor-reported position of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub imei: String,
    pub latitude: f64,
    pub longitude: f64,
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

impl DeviceLocation {
    /// A location with only the required fields set.
    pub fn new(
        imei: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            imei: imei.into(),
            latitude,
            longitude,
            timestamp,
            device_name: None,
            speed_kmh: None,
            heading_deg: None,
            online: None,
            acc_on: None,
            satellites: None,
            battery_percent: None,
            address: None,
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub imei: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// SourceQuery
// ---------------------------------------------------------------------------

/// What an export was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    Current,
    Historical { imei: String, date: NaiveDate },
}

impl SourceQuery {
    pub fn historical(imei: impl Into<String>, date: NaiveDate) -> Self {
        SourceQuery::Historical {
            imei: imei.into(),
            date,
        }
    }

    /// Filesystem-safe stem used for deterministic artifact names.
    pub fn file_stem(&self) -> String {
        match self {
            SourceQuery::Current => "current".to_string(),
            SourceQuery::Historical { imei, date } => {
                format!("historical_{imei}_{}", date.format("%Y-%m-%d"))
            }
        }
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceQuery::Current => f.write_str("current"),
            SourceQuery::Historical { imei, date } => {
                write!(f, "historical:{imei}:{}", date.format("%Y-%m-%d"))
            }
        }
    }
}

impl Serialize for SourceQuery {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceQuery {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for SourceQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "current" {
            return Ok(SourceQuery::Current);
        }
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("historical"), Some(imei), Some(date)) if !imei.is_empty() => {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| format!("bad date in source '{s}': {e}"))?;
                Ok(SourceQuery::historical(imei, date))
            }
            _ => Err(format!("unknown source query '{s}'")),
        }
    }
}
