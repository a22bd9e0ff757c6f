use crate::error::TrackSolidError;
use chrono::{DateTime, NaiveDateTime, Utc};
use geotrack_core::types::{Device, DeviceLocation};
use serde::Deserialize;

/// Wire format of `gpsTime`, `begin_time`, `end_time` and the request `timestamp`.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Scalar ───────────────────────────────────────────────────────────────

/// A JSON scalar the API may send either as a number or as a string
/// (`"lat": "19.43"` and `"lat": 19.43` both occur).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Bool(_) => None,
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Non-empty text form.
    pub fn as_text(&self) -> Option<String> {
        let s = match self {
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        };
        (!s.is_empty()).then_some(s)
    }

    /// `1`/`"1"`/`true` and `0`/`"0"`/`false`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            other => match other.as_i64()? {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            },
        }
    }
}

fn text(v: &Option<Scalar>) -> Option<String> {
    v.as_ref().and_then(Scalar::as_text)
}

fn number(v: &Option<Scalar>) -> Option<f64> {
    v.as_ref().and_then(Scalar::as_f64).filter(|f| f.is_finite())
}

fn flag(v: &Option<Scalar>) -> Option<bool> {
    v.as_ref().and_then(Scalar::as_flag)
}

pub fn parse_wire_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, WIRE_TIME_FORMAT)
        .map(|t| t.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
}

// ─── Envelope ─────────────────────────────────────────────────────────────

/// `{ "code": 0, "message": "...", "result": ... }` around every response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: Option<Scalar>,
    pub message: Option<String>,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<Option<T>, TrackSolidError> {
        let code = self.code.as_ref().and_then(Scalar::as_i64);
        match code {
            Some(0) => Ok(self.result),
            Some(code) => Err(TrackSolidError::Api {
                code,
                message: self.message.unwrap_or_default(),
            }),
            None => Err(TrackSolidError::Decode(
                "response envelope without a numeric code".into(),
            )),
        }
    }
}

// ─── Results ──────────────────────────────────────────────────────────────

/// `jimi.oauth.token.get`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub access_token: String,
    pub expires_in: Option<Scalar>,
}

/// One entry of `jimi.user.device.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDevice {
    pub imei: Option<Scalar>,
    pub device_name: Option<Scalar>,
    pub mc_type: Option<Scalar>,
    pub vehicle_number: Option<Scalar>,
    pub enabled_flag: Option<Scalar>,
}

impl WireDevice {
    pub fn into_device(self) -> Result<Device, TrackSolidError> {
        let imei = text(&self.imei)
            .ok_or_else(|| TrackSolidError::Decode("device entry without imei".into()))?;
        Ok(Device {
            imei,
            name: text(&self.device_name),
            model: text(&self.mc_type),
            plate: text(&self.vehicle_number),
            enabled: flag(&self.enabled_flag).unwrap_or(true),
        })
    }
}

/// A position record, shared by `jimi.device.location.get` and
/// `jimi.device.track.list` (track points carry `gpsSpeed` and no `imei`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePoint {
    pub imei: Option<Scalar>,
    pub device_name: Option<Scalar>,
    pub lat: Option<Scalar>,
    pub lng: Option<Scalar>,
    pub gps_time: Option<Scalar>,
    pub speed: Option<Scalar>,
    pub gps_speed: Option<Scalar>,
    pub direction: Option<Scalar>,
    pub acc_status: Option<Scalar>,
    pub status: Option<Scalar>,
    pub gps_num: Option<Scalar>,
    pub power_value: Option<Scalar>,
    pub loc_desc: Option<Scalar>,
}

impl WirePoint {
    /// Convert into a [`DeviceLocation`]. `fallback_imei` is used when the
    /// record itself has none. Coordinates are parsed but not range-checked.
    pub fn into_location(self, fallback_imei: Option<&str>) -> Result<DeviceLocation, TrackSolidError> {
        let imei = text(&self.imei)
            .or_else(|| fallback_imei.map(str::to_string))
            .ok_or_else(|| TrackSolidError::Decode("location record without imei".into()))?;

        let (Some(latitude), Some(longitude)) = (number(&self.lat), number(&self.lng)) else {
            return Err(TrackSolidError::Decode(format!(
                "device {imei}: unparseable coordinates"
            )));
        };
        let timestamp = text(&self.gps_time)
            .as_deref()
            .and_then(parse_wire_time)
            .ok_or_else(|| TrackSolidError::Decode(format!("device {imei}: unparseable gpsTime")))?;

        let mut loc = DeviceLocation::new(imei, latitude, longitude, timestamp);
        loc.device_name = text(&self.device_name);
        loc.speed_kmh = number(&self.speed).or_else(|| number(&self.gps_speed));
        loc.heading_deg = number(&self.direction);
        loc.online = flag(&self.status);
        loc.acc_on = flag(&self.acc_status);
        loc.satellites = self
            .gps_num
            .as_ref()
            .and_then(Scalar::as_i64)
            .and_then(|n| u32::try_from(n).ok());
        loc.battery_percent = number(&self.power_value);
        loc.address = text(&self.loc_desc);
        Ok(loc)
    }
}
