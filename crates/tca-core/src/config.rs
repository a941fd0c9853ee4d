use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_FILENAME: &str = "tca.db";
pub const DEFAULT_BIND: &str = "127.0.0.1:8733";
pub const DEFAULT_SCHEDULER_TICK_MS: u64 = 1_000;

/// Static, immutable process configuration (`tca.toml` + `TCA_*` env overrides).
///
/// Loaded once at startup and never reread; anything that can legitimately
/// change without a restart belongs in the settings table instead (see
/// [`SettingValue`] and the dynamic config resolver in `tca-storage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcaConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bind: String,
    pub mode: UnlockMode,
    /// Path to a mounted secret file supplying the KEK in auto-unlock mode.
    /// Ignored (and may be absent) in interactive mode.
    pub secret_file: Option<String>,
    #[serde(default)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Bounded size of the read connection pool.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            backup_dir: default_backup_dir(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockMode {
    /// Key material stays locked until an operator supplies a passphrase.
    Interactive,
    /// The KEK is derived from a mounted secret file at startup.
    AutoUnlock,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tca/{}", home, DEFAULT_DB_FILENAME)
}

fn default_backup_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tca/backups", home)
}

fn default_read_pool_size() -> u32 {
    4
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tca/tca.toml", home)
}

impl TcaConfig {
    /// Load static config from a TOML file with `TCA_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TcaConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TCA_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// A dynamic settings value. Mirrors a small JSON-like tagged union rather
/// than raw `serde_json::Value` so that non-finite floats are unrepresentable
/// once constructed — the only place a NaN/Inf can enter is [`SettingValue::float`],
/// which rejects it up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<SettingValue>),
    Map(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn float(v: f64) -> crate::error::Result<Self> {
        if !v.is_finite() {
            return Err(crate::error::CoreError::NonFiniteFloat);
        }
        Ok(SettingValue::Float(v))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Null => "null",
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::Str(_) => "string",
            SettingValue::List(_) => "list",
            SettingValue::Map(_) => "map",
        }
    }

    pub fn as_bool(&self, key: &str) -> crate::error::Result<bool> {
        match self {
            SettingValue::Bool(b) => Ok(*b),
            other => Err(crate::error::CoreError::SettingType {
                key: key.to_string(),
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_int(&self, key: &str) -> crate::error::Result<i64> {
        match self {
            SettingValue::Int(i) => Ok(*i),
            other => Err(crate::error::CoreError::SettingType {
                key: key.to_string(),
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_float(&self, key: &str) -> crate::error::Result<f64> {
        match self {
            SettingValue::Float(f) => Ok(*f),
            SettingValue::Int(i) => Ok(*i as f64),
            other => Err(crate::error::CoreError::SettingType {
                key: key.to_string(),
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self, key: &str) -> crate::error::Result<&str> {
        match self {
            SettingValue::Str(s) => Ok(s.as_str()),
            other => Err(crate::error::CoreError::SettingType {
                key: key.to_string(),
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// Serializes to JSON text for storage in the `settings.value_json` column.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("SettingValue is always representable as JSON")
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rejects_non_finite() {
        assert!(SettingValue::float(f64::NAN).is_err());
        assert!(SettingValue::float(f64::INFINITY).is_err());
        assert!(SettingValue::float(f64::NEG_INFINITY).is_err());
        assert!(SettingValue::float(1.5).is_ok());
    }

    #[test]
    fn as_int_reports_key_and_found_type_on_mismatch() {
        let v = SettingValue::Str("not a number".into());
        let err = v.as_int("scheduler.tick_ms").unwrap_err();
        match err {
            crate::error::CoreError::SettingType {
                key,
                expected,
                found,
            } => {
                assert_eq!(key, "scheduler.tick_ms");
                assert_eq!(expected, "int");
                assert_eq!(found, "string");
            }
            _ => panic!("wrong error variant"),
        }
    }

    #[test]
    fn json_round_trip() {
        let v = SettingValue::Map(BTreeMap::from([
            ("a".to_string(), SettingValue::Int(1)),
            ("b".to_string(), SettingValue::Bool(true)),
        ]));
        let s = v.to_json_string();
        let back = SettingValue::from_json_str(&s).unwrap();
        assert_eq!(v, back);
    }
}
