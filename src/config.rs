use std::env;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_FEED_URL: &str = "https://forecast.weather.gov/MapClick.php";
const DEFAULT_DB_PATH: &str = "data/weather.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CONFIG_FILE: &str = "weather.toml";

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub lat: f64,
    pub lon: f64,
    pub feed_url: String,
    pub db_path: String,
    pub timeout_secs: u64,
    pub retry_once: bool,
}

/// One layer of partial configuration. Layers merge with `or`:
/// CLI flags over environment variables over `weather.toml` over defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Overrides {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub feed_url: Option<String>,
    pub db_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retry_once: Option<bool>,
}

impl Overrides {
    fn or(self, fallback: Overrides) -> Overrides {
        Overrides {
            lat: self.lat.or(fallback.lat),
            lon: self.lon.or(fallback.lon),
            feed_url: self.feed_url.or(fallback.feed_url),
            db_path: self.db_path.or(fallback.db_path),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
            retry_once: self.retry_once.or(fallback.retry_once),
        }
    }
}

impl Config {
    /// Merge CLI overrides with the environment and the optional config
    /// file, then resolve against defaults.
    pub fn load(cli: Overrides) -> Result<Config> {
        let file = match Path::new(CONFIG_FILE).exists() {
            true => {
                let raw = std::fs::read_to_string(CONFIG_FILE)
                    .with_context(|| format!("failed to read {CONFIG_FILE}"))?;
                Config::parse_file(&raw)?
            }
            false => Overrides::default(),
        };
        Config::resolve(cli.or(from_env()?).or(file))
    }

    pub fn parse_file(raw: &str) -> Result<Overrides> {
        toml::from_str(raw).with_context(|| format!("invalid {CONFIG_FILE}"))
    }

    pub fn resolve(o: Overrides) -> Result<Config> {
        let lat = o
            .lat
            .context("latitude not configured (--lat, WEATHER_LAT, or weather.toml)")?;
        let lon = o
            .lon
            .context("longitude not configured (--lon, WEATHER_LON, or weather.toml)")?;
        Ok(Config {
            lat,
            lon,
            feed_url: o.feed_url.unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            db_path: o.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            timeout_secs: o.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            retry_once: o.retry_once.unwrap_or(false),
        })
    }
}

fn from_env() -> Result<Overrides> {
    Ok(Overrides {
        lat: env_parse("WEATHER_LAT")?,
        lon: env_parse("WEATHER_LON")?,
        feed_url: env::var("WEATHER_FEED_URL").ok(),
        db_path: env::var("WEATHER_DB").ok(),
        timeout_secs: env_parse("WEATHER_TIMEOUT_SECS")?,
        retry_once: env_parse("WEATHER_RETRY_ONCE")?,
    })
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => {
            let parsed = raw
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

// ── Tests ──
