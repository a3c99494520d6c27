//! Runtime configuration read from the process environment.

use std::path::PathBuf;

use thiserror::Error;

use super::thegamesdb::DEFAULT_BASE_URL;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_RETENTION_DAYS: i64 = 90;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL; when unset the local JSON store is used instead
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub thegamesdb_api_key: Option<String>,
    pub thegamesdb_base_url: String,
    pub host: String,
    pub port: u16,
    pub trending_retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let trending_retention_days = match get("TRENDING_RETENTION_DAYS") {
            Some(value) => match value.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "TRENDING_RETENTION_DAYS",
                        value,
                    });
                }
            },
            None => DEFAULT_RETENTION_DAYS,
        };

        let data_dir = get("SWITCH_SHELF_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            database_url: get("DATABASE_URL"),
            data_dir,
            thegamesdb_api_key: get("THEGAMESDB_API_KEY"),
            thegamesdb_base_url: get("THEGAMESDB_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            trending_retention_days,
        })
    }

    /// Host and port as a pair so IPv6 hosts such as `::1` need no brackets
    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("switch-shelf"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
