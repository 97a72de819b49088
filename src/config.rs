use crate::accessor::AccessSettings;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::schema::FormCatalog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "IMS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ims.json";
const DATABASE_DIR: &str = "database";

/// A group of forms living in one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetType {
    /// Display name, e.g. "LW FILES"
    pub name: String,
    pub store_id: String,
    /// Form configuration file, relative to the configuration file
    pub forms: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub read_ttl_secs: u64,
    pub list_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            read_ttl_secs: 300,
            list_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 5,
            base_delay_ms: 750,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub max_calls_per_minute: usize,
    pub min_interval_ms: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        QuotaConfig {
            max_calls_per_minute: 50,
            min_interval_ms: 1000,
        }
    }
}

/// Application configuration.
///
/// Every section has defaults, so a missing file or a partial one is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImsConfig {
    pub sheet_types: Vec<SheetType>,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub quota: QuotaConfig,
    /// Directory holding the local workbook files
    pub data_dir: PathBuf,
    /// Listen address of the HTTP API
    pub bind: String,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for ImsConfig {
    fn default() -> Self {
        ImsConfig {
            sheet_types: vec![
                SheetType {
                    name: "LW FILES".to_string(),
                    store_id: "lw-files".to_string(),
                    forms: PathBuf::from("form_configs.json"),
                },
                SheetType {
                    name: "M&PR FILES".to_string(),
                    store_id: "mpr-files".to_string(),
                    forms: PathBuf::from("forms_mpr_configs.json"),
                },
            ],
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            quota: QuotaConfig::default(),
            data_dir: PathBuf::from(DATABASE_DIR),
            bind: "127.0.0.1:3000".to_string(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl ImsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Json {
            path: "<inline>".into(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ImsConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Load `path`, or the built-in defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    /// Path from `IMS_CONFIG`, falling back to `ims.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn sheet_type(&self, name: &str) -> Result<&SheetType, ConfigError> {
        self.sheet_types
            .iter()
            .find(|t| t.name == name || t.store_id == name)
            .ok_or_else(|| ConfigError::UnknownSheetType(name.to_string()))
    }

    /// Form catalog of a sheet type, resolved against the config location.
    pub fn load_forms(&self, sheet_type: &SheetType) -> Result<FormCatalog, ConfigError> {
        FormCatalog::load(self.resolve(&sheet_type.forms))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    pub fn access_settings(&self) -> AccessSettings {
        AccessSettings {
            read_ttl: Duration::from_secs(self.cache.read_ttl_secs),
            list_ttl: Duration::from_secs(self.cache.list_ttl_secs),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                multiplier: self.retry.multiplier,
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                jitter: Duration::from_millis(self.retry.jitter_ms),
            },
            max_calls_per_minute: self.quota.max_calls_per_minute,
            min_interval: Duration::from_millis(self.quota.min_interval_ms),
        }
    }
}
