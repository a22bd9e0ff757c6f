use crate::error::{GeotrackError, Result};
use crate::paths;
use crate::scheduler::MAX_INTERVAL_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// VendorConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_VENDOR_ENDPOINT: &str = "https://us-open.tracksolidpro.com/route/rest";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// IMEI allow-list; empty means every device on the account.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
}

fn default_endpoint() -> String {
    DEFAULT_VENDOR_ENDPOINT.to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_ttl_secs: default_token_ttl(),
            request_timeout_secs: default_request_timeout(),
            devices: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AutoUpdateConfig
// ---------------------------------------------------------------------------

/// What a periodic cycle does with the fetched data when the artifact write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFailurePolicy {
    /// Advance the in-memory snapshot even though the artifact is stale.
    #[default]
    KeepFresh,
    /// Only advance the snapshot once the artifact has been written.
    KeepConsistent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoUpdateConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Start periodic cycles when the server launches.
    #[serde(default = "default_true")]
    pub start_on_launch: bool,
    #[serde(default)]
    pub on_export_failure: ExportFailurePolicy,
}

fn default_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            start_on_launch: default_true(),
            on_export_failure: ExportFailurePolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExportConfig / ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_OUTPUT_DIR)
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            vendor: VendorConfig::default(),
            auto_update: AutoUpdateConfig::default(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GeotrackError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(GeotrackError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.auto_update.interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "auto_update.interval_secs must be greater than zero".to_string(),
            });
        } else if self.auto_update.interval_secs > MAX_INTERVAL_SECS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "auto_update.interval_secs={} exceeds the maximum of {MAX_INTERVAL_SECS}",
                    self.auto_update.interval_secs
                ),
            });
        } else if ![5, 10, 30, 60].contains(&self.auto_update.interval_secs) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "auto_update.interval_secs={} is unusual (expected 5, 10, 30 or 60)",
                    self.auto_update.interval_secs
                ),
            });
        }

        if self.export.output_dir.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "export.output_dir must not be empty".to_string(),
            });
        }

        if !self.vendor.endpoint.starts_with("http://")
            && !self.vendor.endpoint.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("vendor.endpoint '{}' is not an http(s) URL", self.vendor.endpoint),
            });
        }

        if self.vendor.token_ttl_secs < 120 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "vendor.token_ttl_secs={} is very short; tokens will be renewed on almost every call",
                    self.vendor.token_ttl_secs
                ),
            });
        }

        for imei in &self.vendor.devices {
            if paths::validate_imei(imei).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("vendor.devices entry '{imei}' is not a valid device identifier"),
                });
            }
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
