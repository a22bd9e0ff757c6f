//! Artifact encodings. Every format renders from a validated
//! [`FeatureCollection`], so coordinate checks happen once regardless of the
//! output chosen.

use crate::error::{GeotrackError, Result};
use crate::geojson::{Feature, FeatureCollection, FeatureProperties};
use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KML_NS: &str = "http://www.opengis.net/kml/2.2";
const KML_STYLE_ID: &str = "devicePoint";
const KML_ICON: &str = "http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png";

/// Column order of CSV exports.
pub const CSV_HEADER: [&str; 12] = [
    "imei",
    "device_name",
    "latitude",
    "longitude",
    "timestamp",
    "speed_kmh",
    "heading_deg",
    "online",
    "acc_on",
    "satellites",
    "battery_percent",
    "address",
];

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    GeoJson,
    Csv,
    Kml,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::GeoJson, ExportFormat::Csv, ExportFormat::Kml];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Csv => "csv",
            ExportFormat::Kml => "kml",
        }
    }

    /// File extension of artifacts in this format.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    pub fn render(self, collection: &FeatureCollection) -> Result<Vec<u8>> {
        match self {
            ExportFormat::GeoJson => collection.to_pretty_json(),
            ExportFormat::Csv => to_csv(collection),
            ExportFormat::Kml => to_kml(collection),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = GeotrackError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GeotrackError::UnknownFormat(s.to_string()))
    }
}

fn render_error(format: ExportFormat, e: impl fmt::Display) -> GeotrackError {
    GeotrackError::Render {
        format,
        message: e.to_string(),
    }
}

fn timestamp(p: &FeatureProperties) -> String {
    p.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CsvRow<'a> {
    imei: &'a str,
    device_name: Option<&'a str>,
    latitude: f64,
    longitude: f64,
    timestamp: String,
    speed_kmh: Option<f64>,
    heading_deg: Option<f64>,
    online: Option<bool>,
    acc_on: Option<bool>,
    satellites: Option<u32>,
    battery_percent: Option<f64>,
    address: Option<&'a str>,
}

impl<'a> From<&'a Feature> for CsvRow<'a> {
    fn from(feature: &'a Feature) -> Self {
        let [longitude, latitude] = feature.coordinates();
        let p = &feature.properties;
        Self {
            imei: &p.imei,
            device_name: p.device_name.as_deref(),
            latitude,
            longitude,
            timestamp: timestamp(p),
            speed_kmh: p.speed_kmh,
            heading_deg: p.heading_deg,
            online: p.online,
            acc_on: p.acc_on,
            satellites: p.satellites,
            battery_percent: p.battery_percent,
            address: p.address.as_deref(),
        }
    }
}

/// One row per feature under a fixed header; absent fields are empty cells.
fn to_csv(collection: &FeatureCollection) -> Result<Vec<u8>> {
    let fail = |e: csv::Error| render_error(ExportFormat::Csv, e);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(fail)?;
    for feature in &collection.features {
        writer.serialize(CsvRow::from(feature)).map_err(fail)?;
    }
    writer
        .into_inner()
        .map_err(|e| render_error(ExportFormat::Csv, e.error()))
}

// ---------------------------------------------------------------------------
// KML
// ---------------------------------------------------------------------------

type XmlResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// KML 2.2 document with one styled Placemark per feature. Properties go into
/// `ExtendedData`, the fix time into `TimeStamp`.
fn to_kml(collection: &FeatureCollection) -> Result<Vec<u8>> {
    write_kml(collection).map_err(|e| render_error(ExportFormat::Kml, e))
}

fn write_kml(collection: &FeatureCollection) -> XmlResult<Vec<u8>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut kml = BytesStart::new("kml");
    kml.push_attribute(("xmlns", KML_NS));
    w.write_event(Event::Start(kml))?;
    start(&mut w, "Document")?;

    let meta = &collection.metadata;
    text_element(&mut w, "name", &format!("geotrack {}", meta.source))?;
    text_element(
        &mut w,
        "description",
        &format!(
            "{} placemark(s) generated at {}",
            meta.total_features,
            meta.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    )?;

    let mut style = BytesStart::new("Style");
    style.push_attribute(("id", KML_STYLE_ID));
    w.write_event(Event::Start(style))?;
    start(&mut w, "IconStyle")?;
    start(&mut w, "Icon")?;
    text_element(&mut w, "href", KML_ICON)?;
    end(&mut w, "Icon")?;
    end(&mut w, "IconStyle")?;
    end(&mut w, "Style")?;

    for feature in &collection.features {
        placemark(&mut w, feature)?;
    }

    end(&mut w, "Document")?;
    end(&mut w, "kml")?;
    Ok(w.into_inner())
}

fn placemark(w: &mut Writer<Vec<u8>>, feature: &Feature) -> XmlResult<()> {
    let p = &feature.properties;
    let [lon, lat] = feature.coordinates();

    start(w, "Placemark")?;
    text_element(w, "name", p.device_name.as_deref().unwrap_or(&p.imei))?;
    text_element(w, "styleUrl", &format!("#{KML_STYLE_ID}"))?;
    start(w, "TimeStamp")?;
    text_element(w, "when", &timestamp(p))?;
    end(w, "TimeStamp")?;

    start(w, "ExtendedData")?;
    for (name, value) in extended_data(p) {
        let mut data = BytesStart::new("Data");
        data.push_attribute(("name", name));
        w.write_event(Event::Start(data))?;
        text_element(w, "value", &value)?;
        end(w, "Data")?;
    }
    end(w, "ExtendedData")?;

    start(w, "Point")?;
    // KML is lon,lat[,alt]
    text_element(w, "coordinates", &format!("{lon},{lat},0"))?;
    end(w, "Point")?;
    end(w, "Placemark")?;
    Ok(())
}

fn extended_data(p: &FeatureProperties) -> Vec<(&'static str, String)> {
    let optional = [
        ("device_name", p.device_name.clone()),
        ("speed_kmh", p.speed_kmh.map(|v| v.to_string())),
        ("heading_deg", p.heading_deg.map(|v| v.to_string())),
        ("online", p.online.map(|v| v.to_string())),
        ("acc_on", p.acc_on.map(|v| v.to_string())),
        ("satellites", p.satellites.map(|v| v.to_string())),
        ("battery_percent", p.battery_percent.map(|v| v.to_string())),
        ("address", p.address.clone()),
    ];
    let mut rows = vec![("imei", p.imei.clone())];
    rows.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
    rows
}

fn start(w: &mut Writer<Vec<u8>>, name: &str) -> XmlResult<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(w: &mut Writer<Vec<u8>>, name: &str) -> XmlResult<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> XmlResult<()> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, name)
}
