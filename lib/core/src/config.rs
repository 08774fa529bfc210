//! Runtime configuration
//!
//! [`ConfigStore`] owns the six recognized options behind a lock. Every write
//! is validated: unknown keys, wrong value types and out-of-range values fail
//! with [`ConfigError`] and leave the store untouched. Bulk loads validate the
//! whole document against a candidate copy and swap it in only when every
//! entry is valid.
//!
//! ```rust
//! use phonodist_core::ConfigStore;
//!
//! let store = ConfigStore::new();
//! store.set("kmeans_clusters", 8).unwrap();
//! assert!(store.set("kmeans_clusters", "eight").is_err());
//! assert!(store.load_json(r#"{"cache_size": 10, "colour": "red"}"#).is_err());
//! assert_eq!(store.cache_size(), 1024);
//! ```

use crate::error::{ConfigError, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How unknown symbols are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Fail with a `LookupError`
    Raise,
    /// Log a warning and continue without the symbol
    #[default]
    Warn,
    /// Continue silently without the symbol
    Ignore,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Raise => "raise",
            OnError::Warn => "warn",
            OnError::Ignore => "ignore",
        }
    }
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnError {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raise" => Ok(OnError::Raise),
            "warn" => Ok(OnError::Warn),
            "ignore" => Ok(OnError::Ignore),
            other => Err(ConfigError::InvalidValue {
                key: ConfigKey::OnError.as_str().to_string(),
                value: other.to_string(),
                expected: "one of raise, warn, ignore".to_string(),
            }),
        }
    }
}

/// Recognized configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    DefaultDistanceMethod,
    DefaultNormalize,
    DefaultPrecision,
    CacheSize,
    KmeansClusters,
    OnError,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::DefaultDistanceMethod,
        ConfigKey::DefaultNormalize,
        ConfigKey::DefaultPrecision,
        ConfigKey::CacheSize,
        ConfigKey::KmeansClusters,
        ConfigKey::OnError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::DefaultDistanceMethod => "default_distance_method",
            ConfigKey::DefaultNormalize => "default_normalize",
            ConfigKey::DefaultPrecision => "default_precision",
            ConfigKey::CacheSize => "cache_size",
            ConfigKey::KmeansClusters => "kmeans_clusters",
            ConfigKey::OnError => "on_error",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ConfigKey::ALL
            .iter()
            .find(|key| key.as_str() == s)
            .copied()
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

/// A configuration value. Never coerced between variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

impl From<OnError> for ConfigValue {
    fn from(v: OnError) -> Self {
        ConfigValue::Text(v.as_str().to_string())
    }
}

impl TryFrom<(&str, &serde_json::Value)> for ConfigValue {
    type Error = ConfigError;

    fn try_from((key, value): (&str, &serde_json::Value)) -> std::result::Result<Self, ConfigError> {
        match value {
            serde_json::Value::Bool(v) => Ok(ConfigValue::Bool(*v)),
            serde_json::Value::String(v) => Ok(ConfigValue::Text(v.clone())),
            serde_json::Value::Number(n) if n.is_i64() => {
                Ok(ConfigValue::Int(n.as_i64().unwrap_or_default()))
            }
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: other.to_string(),
                expected: "a boolean, an integer or a string".to_string(),
            }),
        }
    }
}

pub const MAX_PRECISION: i64 = 17;

/// The full option set with its defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub default_distance_method: String,
    pub default_normalize: bool,
    pub default_precision: usize,
    pub cache_size: usize,
    pub kmeans_clusters: usize,
    pub on_error: OnError,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_distance_method: "hamming".to_string(),
            default_normalize: true,
            default_precision: 4,
            cache_size: 1024,
            kmeans_clusters: 12,
            on_error: OnError::Warn,
        }
    }
}

impl Config {
    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        match key {
            ConfigKey::DefaultDistanceMethod => self.default_distance_method.clone().into(),
            ConfigKey::DefaultNormalize => self.default_normalize.into(),
            ConfigKey::DefaultPrecision => ConfigValue::Int(self.default_precision as i64),
            ConfigKey::CacheSize => ConfigValue::Int(self.cache_size as i64),
            ConfigKey::KmeansClusters => ConfigValue::Int(self.kmeans_clusters as i64),
            ConfigKey::OnError => self.on_error.into(),
        }
    }

    /// Validate and apply one value
    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) -> std::result::Result<(), ConfigError> {
        let invalid = |expected: &str| ConfigError::InvalidValue {
            key: key.as_str().to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        match (key, &value) {
            (ConfigKey::DefaultDistanceMethod, ConfigValue::Text(name)) if !name.trim().is_empty() => {
                self.default_distance_method = name.trim().to_string();
            }
            (ConfigKey::DefaultDistanceMethod, _) => {
                return Err(invalid("a non-empty method name"));
            }
            (ConfigKey::DefaultNormalize, ConfigValue::Bool(v)) => self.default_normalize = *v,
            (ConfigKey::DefaultNormalize, _) => return Err(invalid("a boolean")),
            (ConfigKey::DefaultPrecision, ConfigValue::Int(v)) if (0..=MAX_PRECISION).contains(v) => {
                self.default_precision = *v as usize;
            }
            (ConfigKey::DefaultPrecision, _) => {
                return Err(invalid("an integer between 0 and 17"));
            }
            (ConfigKey::CacheSize, ConfigValue::Int(v)) if *v >= 0 => {
                self.cache_size = usize::try_from(*v).map_err(|_| invalid("a non-negative integer"))?;
            }
            (ConfigKey::CacheSize, _) => return Err(invalid("a non-negative integer")),
            (ConfigKey::KmeansClusters, ConfigValue::Int(v)) if *v >= 1 => {
                self.kmeans_clusters = usize::try_from(*v).map_err(|_| invalid("a positive integer"))?;
            }
            (ConfigKey::KmeansClusters, _) => return Err(invalid("a positive integer")),
            (ConfigKey::OnError, ConfigValue::Text(v)) => self.on_error = v.parse()?,
            (ConfigKey::OnError, _) => return Err(invalid("one of raise, warn, ignore")),
        }
        Ok(())
    }

    /// Re-check every field (used for structs built by hand or deserialized)
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut scratch = Config::default();
        for key in ConfigKey::ALL {
            scratch.set(key, self.get(key))?;
        }
        Ok(())
    }
}

/// Lock-guarded configuration owned by a context object
#[derive(Debug, Default)]
pub struct ConfigStore {
    inner: RwLock<Config>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(config),
        })
    }

    pub fn get(&self, key: &str) -> Result<ConfigValue> {
        let key: ConfigKey = key.parse()?;
        Ok(self.inner.read().get(key))
    }

    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let key: ConfigKey = key.parse()?;
        let value = value.into();
        let mut config = self.inner.write();
        let mut candidate = config.clone();
        candidate.set(key, value.clone())?;
        *config = candidate;
        tracing::debug!("Config set: {} = {}", key, value);
        Ok(())
    }

    /// Restore one key to its default
    pub fn reset(&self, key: &str) -> Result<()> {
        let key: ConfigKey = key.parse()?;
        let default = Config::default().get(key);
        self.inner.write().set(key, default)?;
        Ok(())
    }

    pub fn reset_all(&self) {
        *self.inner.write() = Config::default();
        tracing::info!("Configuration reset to defaults");
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    /// Replace every option at once
    pub fn replace(&self, config: Config) -> Result<()> {
        config.validate()?;
        *self.inner.write() = config;
        Ok(())
    }

    /// Apply a JSON object of key/value pairs. Any invalid entry aborts the
    /// whole load with no partial mutation.
    pub fn load_json(&self, text: &str) -> Result<()> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        let entries = document.as_object().ok_or_else(|| ConfigError::InvalidValue {
            key: "<document>".to_string(),
            value: document.to_string(),
            expected: "a JSON object".to_string(),
        })?;

        let mut config = self.inner.write();
        let mut candidate = config.clone();
        for (key, value) in entries {
            let parsed: ConfigKey = key.parse()?;
            let value = ConfigValue::try_from((key.as_str(), value))?;
            candidate.set(parsed, value)?;
        }
        *config = candidate;
        tracing::info!("Loaded {} configuration entries", entries.len());
        Ok(())
    }

    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        self.load_json(&text)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.inner.read())?)
    }

    pub fn default_distance_method(&self) -> String {
        self.inner.read().default_distance_method.clone()
    }

    pub fn default_normalize(&self) -> bool {
        self.inner.read().default_normalize
    }

    pub fn default_precision(&self) -> usize {
        self.inner.read().default_precision
    }

    pub fn cache_size(&self) -> usize {
        self.inner.read().cache_size
    }

    pub fn kmeans_clusters(&self) -> usize {
        self.inner.read().kmeans_clusters
    }

    pub fn on_error(&self) -> OnError {
        self.inner.read().on_error
    }
}
