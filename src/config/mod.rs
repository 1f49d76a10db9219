//! Configuration layer: typed settings with layered precedence (file → env).

use std::{path::Path, str::FromStr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "startupcoders";
const ENV_PREFIX: &str = "STARTUPCODERS";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_FRESH_WINDOW_MS: u64 = 5 * 60 * 1000;
const DEFAULT_TOTAL_WINDOW_MS: u64 = 10 * 60 * 1000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSection,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Validated `[cache]` section.
#[derive(Debug, Clone)]
pub struct CacheSection {
    pub windows: CacheConfig,
    pub sweep_interval: Duration,
    /// Forced refetch cadence for startup listings; `None` disables it.
    pub list_revalidate: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence: `config/default`, then
/// `startupcoders`, then `explicit_file` when given, then `STARTUPCODERS__*`
/// environment variables.
pub fn load(explicit_file: Option<&Path>) -> Result<Settings, LoadError> {
    load_from(explicit_file, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn load_from(explicit_file: Option<&Path>, env: Environment) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = explicit_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(env);

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSection, LoadError> {
    let fresh_ms = cache.fresh_window_ms.unwrap_or(DEFAULT_FRESH_WINDOW_MS);
    let total_ms = cache.total_window_ms.unwrap_or(DEFAULT_TOTAL_WINDOW_MS);
    let windows = CacheConfig::from_millis(fresh_ms, total_ms)
        .map_err(|err| LoadError::invalid("cache.total_window_ms", err.to_string()))?;

    let sweep_secs = cache
        .sweep_interval_secs
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    if sweep_secs == 0 {
        return Err(LoadError::invalid(
            "cache.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    let list_revalidate = match cache.list_revalidate_secs {
        Some(0) => {
            return Err(LoadError::invalid(
                "cache.list_revalidate_secs",
                "must be greater than zero when set",
            ));
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    Ok(CacheSection {
        windows,
        sweep_interval: Duration::from_secs(sweep_secs),
        list_revalidate,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    fresh_window_ms: Option<u64>,
    total_window_ms: Option<u64>,
    sweep_interval_secs: Option<u64>,
    list_revalidate_secs: Option<u64>,
}
