use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use shared::ConnectionConfig;
use toml::Value as TomlValue;
use tracing::{debug, warn};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/obs-listener.db";

/// Where startup settings come from. Names are flat: `address`, `port`,
/// `password`, `auto_connect`, `settle_delay_ms`, `database_url`.
pub trait ConfigSource {
    fn read(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapConfigSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapConfigSource {
    fn read(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// A flat TOML table. Strings, integers, floats and booleans are read as
/// their textual form; nested tables and arrays are ignored.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigSource {
    values: HashMap<String, String>,
}

impl FromStr for TomlConfigSource {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml::from_str(raw).context("failed to parse TOML config")?;
        let mut values = HashMap::with_capacity(table.len());
        for (name, value) in table {
            let text = match value {
                TomlValue::String(text) => text,
                TomlValue::Integer(number) => number.to_string(),
                TomlValue::Float(number) => number.to_string(),
                TomlValue::Boolean(flag) => flag.to_string(),
                other => {
                    warn!(
                        key = %name,
                        kind = other.type_str(),
                        "config: ignoring non-scalar value"
                    );
                    continue;
                }
            };
            values.insert(name, text);
        }
        Ok(Self { values })
    }
}

impl TomlConfigSource {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        raw.parse::<Self>().with_context(|| format!("invalid config file '{}'", path.display()))
    }
}

impl ConfigSource for TomlConfigSource {
    fn read(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub auto_connect: bool,
    pub settle_delay: Duration,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            auto_connect: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
            database_url: DEFAULT_DATABASE_URL.into(),
        }
    }
}

impl Settings {
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut settings = Settings::default();

        if let Some(v) = source.read("address") {
            settings.connection.address = v;
        }
        if let Some(v) = source.read("port") {
            settings.connection.port = v;
        }
        if let Some(v) = source.read("password") {
            settings.connection.password = v;
        }
        if let Some(v) = source.read("auto_connect") {
            settings.auto_connect = parse_flag(&v);
        }
        if let Some(v) = source.read("settle_delay_ms") {
            match v.trim().parse::<u64>() {
                Ok(ms) => settings.settle_delay = Duration::from_millis(ms),
                Err(_) => warn!(value = %v, "config: invalid settle_delay_ms, using default"),
            }
        }
        if let Some(v) = source.read("database_url") {
            settings.database_url = normalize_database_url(&v);
        }

        debug!(
            url = %settings.connection.ws_url(),
            auto_connect = settings.auto_connect,
            settle_delay_ms = settings.settle_delay.as_millis() as u64,
            "config: settings loaded"
        );
        settings
    }
}

/// Anything except `false`, `0`, `no` or `off` (any case) enables the flag.
pub fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.into();
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
