use crate::error::TrackSolidError;
use crate::sign::{md5_hex, sign};
use crate::types::{Envelope, TokenResult, WireDevice, WirePoint, WIRE_TIME_FORMAT};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use geotrack_core::config::VendorConfig;
use geotrack_core::types::{Device, DeviceLocation};
use geotrack_core::VendorClient;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const ENV_APP_KEY: &str = "TRACKSOLID_APP_KEY";
pub const ENV_APP_SECRET: &str = "TRACKSOLID_APP_SECRET";
pub const ENV_EMAIL: &str = "TRACKSOLID_EMAIL";
pub const ENV_PASSWORD: &str = "TRACKSOLID_PASSWORD";

/// Sessions this close to expiry are renewed before use.
const RENEW_MARGIN_SECS: i64 = 60;

/// Vendor-reported token lifetimes are clamped to this range.
const MAX_TOKEN_TTL_SECS: i64 = 86_400;

const METHOD_TOKEN: &str = "jimi.oauth.token.get";
const METHOD_DEVICE_LIST: &str = "jimi.user.device.list";
const METHOD_LOCATION: &str = "jimi.device.location.get";
const METHOD_TRACK: &str = "jimi.device.track.list";

// ─── Credentials ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
    pub user_id: String,
    password_md5: String,
}

impl Credentials {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        user_id: impl Into<String>,
        password: &str,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            user_id: user_id.into(),
            password_md5: md5_hex(password),
        }
    }

    /// Read `TRACKSOLID_APP_KEY`, `TRACKSOLID_APP_SECRET`, `TRACKSOLID_EMAIL`
    /// and `TRACKSOLID_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(TrackSolidError::MissingCredential(name))
        };
        Ok(Self::new(
            get(ENV_APP_KEY)?,
            get(ENV_APP_SECRET)?,
            get(ENV_EMAIL)?,
            &get(ENV_PASSWORD)?,
        ))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

// ─── Client ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Session {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(RENEW_MARGIN_SECS) > now
    }
}

/// Client for the TrackSolid Pro open API.
///
/// The access token is cached and shared by all calls; concurrent callers
/// wait for a single token request instead of each fetching their own.
pub struct TrackSolidClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
    token_ttl_secs: u64,
    device_filter: Vec<String>,
    session: Mutex<Option<Session>>,
}

impl TrackSolidClient {
    pub fn new(credentials: Credentials, config: &VendorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            credentials,
            token_ttl_secs: config.token_ttl_secs,
            device_filter: config.devices.clone(),
            session: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// All devices on the account.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let params = BTreeMap::from([("target", self.credentials.user_id.clone())]);
        let entries: Vec<WireDevice> = self
            .call(METHOD_DEVICE_LIST, params)
            .await?
            .unwrap_or_default();
        entries.into_iter().map(WireDevice::into_device).collect()
    }

    /// Latest positions for the given IMEIs in a single request.
    pub async fn locations(&self, imeis: &[String]) -> Result<Vec<DeviceLocation>> {
        if imeis.is_empty() {
            return Ok(Vec::new());
        }
        let params = BTreeMap::from([("imeis", imeis.join(","))]);
        let points: Vec<WirePoint> = self.call(METHOD_LOCATION, params).await?.unwrap_or_default();
        points.into_iter().map(|p| p.into_location(None)).collect()
    }

    /// Track points of `imei` during the UTC day `date`.
    pub async fn track(&self, imei: &str, date: NaiveDate) -> Result<Vec<DeviceLocation>> {
        let params = BTreeMap::from([
            ("imei", imei.to_string()),
            ("begin_time", format!("{date} 00:00:00")),
            ("end_time", format!("{date} 23:59:59")),
        ]);
        let points: Vec<WirePoint> = self.call(METHOD_TRACK, params).await?.unwrap_or_default();
        points
            .into_iter()
            .map(|p| p.into_location(Some(imei)))
            .collect()
    }

    /// Positions of every monitored device, named after the device list.
    pub async fn current_locations(&self) -> Result<Vec<DeviceLocation>> {
        let devices: Vec<Device> = self
            .devices()
            .await?
            .into_iter()
            .filter(|d| self.device_filter.is_empty() || self.device_filter.contains(&d.imei))
            .collect();
        let imeis: Vec<String> = devices.iter().map(|d| d.imei.clone()).collect();

        let names: HashMap<&str, &str> = devices
            .iter()
            .filter_map(|d| Some((d.imei.as_str(), d.name.as_deref()?)))
            .collect();

        let mut locations = self.locations(&imeis).await?;
        for loc in &mut locations {
            if loc.device_name.is_none() {
                loc.device_name = names.get(loc.imei.as_str()).map(|n| n.to_string());
            }
        }
        Ok(locations)
    }

    // ── plumbing ──

    fn base_params(&self, method: &str) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("app_key", self.credentials.app_key.clone()),
            ("format", "json".to_string()),
            ("method", method.to_string()),
            ("sign_method", "md5".to_string()),
            ("timestamp", Utc::now().format(WIRE_TIME_FORMAT).to_string()),
            ("v", "1.0".to_string()),
        ])
    }

    /// Authenticated call. An API error drops the cached session so the next
    /// call authenticates again.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        extra: BTreeMap<&'static str, String>,
    ) -> Result<Option<T>> {
        let token = self.access_token().await?;
        let mut params = self.base_params(method);
        params.insert("access_token", token);
        params.extend(extra);

        let result = self.post(method, params).await;
        if let Err(e) = &result {
            if e.invalidates_session() {
                debug!(method, error = %e, "dropping cached TrackSolid session");
                *self.session.lock().await = None;
            }
        }
        result
    }

    async fn access_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let now = Utc::now();
        if let Some(s) = session.as_ref().filter(|s| s.is_fresh(now)) {
            return Ok(s.access_token.clone());
        }

        let mut params = self.base_params(METHOD_TOKEN);
        params.insert("user_id", self.credentials.user_id.clone());
        params.insert("user_pwd_md5", self.credentials.password_md5.clone());
        params.insert("expires_in", self.token_ttl_secs.to_string());

        let token: TokenResult = self
            .post(METHOD_TOKEN, params)
            .await?
            .ok_or_else(|| TrackSolidError::Decode("token response without result".into()))?;
        let ttl = token
            .expires_in
            .as_ref()
            .and_then(|s| s.as_i64())
            .unwrap_or_else(|| i64::try_from(self.token_ttl_secs).unwrap_or(MAX_TOKEN_TTL_SECS))
            .clamp(1, MAX_TOKEN_TTL_SECS);
        debug!(expires_in = ttl, "obtained TrackSolid access token");

        let expires_at = chrono::TimeDelta::try_seconds(ttl)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| TrackSolidError::Decode(format!("token lifetime {ttl}s out of range")))?;
        let access_token = token.access_token.clone();
        *session = Some(Session {
            access_token: token.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        mut params: BTreeMap<&'static str, String>,
    ) -> Result<Option<T>> {
        let signature = sign(&params, &self.credentials.app_secret);
        params.insert("sign", signature);
        debug!(method, endpoint = %self.endpoint, "TrackSolid request");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TrackSolidError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| TrackSolidError::Decode(format!("{method}: {e}")))?;
        envelope.into_result()
    }
}

#[async_trait]
impl VendorClient for TrackSolidClient {
    async fn list_devices(&self) -> geotrack_core::Result<Vec<Device>> {
        Ok(self.devices().await?)
    }

    async fn fetch_current_locations(&self) -> geotrack_core::Result<Vec<DeviceLocation>> {
        Ok(self.current_locations().await?)
    }

    async fn fetch_history(
        &self,
        imei: &str,
        date: NaiveDate,
    ) -> geotrack_core::Result<Vec<DeviceLocation>> {
        Ok(self.track(imei, date).await?)
    }
}
