//! Configuration resolution for lstn-se
//!
//! Provides tiered configuration resolution with ENV -> TOML -> default
//! priority. API credentials are per-request input, never configuration.

use lstn_common::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_PORT: u16 = 5741;
const DEFAULT_MB_INTERVAL_MS: u64 = 1000;
const CACHE_FILE_NAME: &str = "track_durations.json";

/// Optional TOML configuration file, pointed at by `LSTN_CONFIG`
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub cache_path: Option<PathBuf>,
    pub musicbrainz_interval_ms: Option<u64>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Duration-cache JSON document location
    pub cache_path: PathBuf,
    /// Minimum spacing between MusicBrainz requests
    pub musicbrainz_interval_ms: u64,
}

impl ServiceConfig {
    /// Resolve configuration with ENV -> TOML -> default priority
    ///
    /// Each field logs the source it resolved from.
    pub fn resolve() -> Result<Self> {
        let toml_config = load_toml_config()?;

        let port = resolve_field(
            "port",
            parsed_env("LSTN_PORT")?,
            toml_config.port,
            DEFAULT_PORT,
        );

        let musicbrainz_interval_ms = resolve_field(
            "musicbrainz_interval_ms",
            parsed_env("LSTN_MB_INTERVAL_MS")?,
            toml_config.musicbrainz_interval_ms,
            DEFAULT_MB_INTERVAL_MS,
        );

        let (cache_path, cache_source) = match std::env::var_os("LSTN_CACHE_PATH") {
            Some(path) => (PathBuf::from(path), "environment"),
            None => match toml_config.cache_path {
                Some(path) => (path, "TOML config"),
                None => (default_cache_path(), "default"),
            },
        };
        info!("cache_path = {} (from {})", cache_path.display(), cache_source);

        Ok(Self {
            port,
            cache_path,
            musicbrainz_interval_ms,
        })
    }
}

fn load_toml_config() -> Result<TomlConfig> {
    let Some(path) = std::env::var_os("LSTN_CONFIG") else {
        return Ok(TomlConfig::default());
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

fn parsed_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn resolve_field<T: std::fmt::Display>(
    name: &str,
    env_value: Option<T>,
    toml_value: Option<T>,
    default: T,
) -> T {
    if let Some(value) = env_value {
        info!("{} = {} (from environment)", name, value);
        return value;
    }
    if let Some(value) = toml_value {
        info!("{} = {} (from TOML config)", name, value);
        return value;
    }
    info!("{} = {} (default)", name, default);
    default
}

fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lstn")
        .join(CACHE_FILE_NAME)
}
