//! Runtime configuration.
//!
//! Everything that differs between deployments (station, coordinates,
//! thresholds, cache windows, wind unit, timezone) is read from `RIVERFLAG_*`
//! environment variables. Unset variables fall back to defaults; set but
//! malformed variables are an error.

use std::str::FromStr;
use std::time::Duration;

use crate::classify::Thresholds;
use crate::error::ConfigError;
use crate::model::WindUnit;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Environment Agency flood-monitoring API.
pub const DEFAULT_RIVER_API_BASE: &str = "https://environment.data.gov.uk/flood-monitoring/id";

/// Open-Meteo forecast API.
pub const DEFAULT_WEATHER_API_BASE: &str = "https://api.open-meteo.com/v1";

/// Thames at Kingston, 15-minute flow.
pub const DEFAULT_MEASURE_ID: &str = "3400TH-flow--i-15_min-m3_s";
pub const DEFAULT_LATITUDE: f64 = 51.4123;
pub const DEFAULT_LONGITUDE: f64 = -0.3073;
pub const DEFAULT_TIMEZONE: &str = "Europe/London";

pub const DEFAULT_LIVE_TTL_SECS: u64 = 600;
pub const DEFAULT_HISTORY_TTL_SECS: u64 = 3600;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Illustrative cutoffs, used only when a deployment sets none of its own.
pub const DEFAULT_THRESHOLDS: Thresholds = Thresholds {
    flow_amber: 75.0,
    flow_red: 100.0,
    flow_black: 120.0,
    wind_amber: 15.0,
    wind_red: 25.0,
};

/// River gauge source settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverSourceConfig {
    pub base_url: String,
    pub measure_id: String,
}

/// Weather source settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSourceConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub wind_unit: WindUnit,
}

/// Full service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub river: RiverSourceConfig,
    pub weather: WeatherSourceConfig,
    pub live_ttl: Duration,
    pub history_ttl: Duration,
    pub http_timeout: Duration,
    pub thresholds: Thresholds,

    /// True when no threshold variable was set and [`DEFAULT_THRESHOLDS`] apply.
    pub thresholds_defaulted: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            river: RiverSourceConfig {
                base_url: DEFAULT_RIVER_API_BASE.to_string(),
                measure_id: DEFAULT_MEASURE_ID.to_string(),
            },
            weather: WeatherSourceConfig {
                base_url: DEFAULT_WEATHER_API_BASE.to_string(),
                latitude: DEFAULT_LATITUDE,
                longitude: DEFAULT_LONGITUDE,
                timezone: DEFAULT_TIMEZONE.to_string(),
                wind_unit: WindUnit::default(),
            },
            live_ttl: Duration::from_secs(DEFAULT_LIVE_TTL_SECS),
            history_ttl: Duration::from_secs(DEFAULT_HISTORY_TTL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            thresholds: DEFAULT_THRESHOLDS,
            thresholds_defaulted: true,
        }
    }
}

const THRESHOLD_VARS: [&str; 5] = [
    "RIVERFLAG_FLOW_AMBER",
    "RIVERFLAG_FLOW_RED",
    "RIVERFLAG_FLOW_BLACK",
    "RIVERFLAG_WIND_AMBER",
    "RIVERFLAG_WIND_RED",
];

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let latitude = parse_var(&lookup, "RIVERFLAG_LATITUDE", defaults.weather.latitude)?;
        let longitude = parse_var(&lookup, "RIVERFLAG_LONGITUDE", defaults.weather.longitude)?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid("RIVERFLAG_LATITUDE", latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid("RIVERFLAG_LONGITUDE", longitude));
        }

        let wind_unit = match lookup("RIVERFLAG_WIND_UNIT") {
            Some(raw) => raw.parse::<WindUnit>()?,
            None => defaults.weather.wind_unit,
        };

        let thresholds = Thresholds {
            flow_amber: parse_var(&lookup, THRESHOLD_VARS[0], DEFAULT_THRESHOLDS.flow_amber)?,
            flow_red: parse_var(&lookup, THRESHOLD_VARS[1], DEFAULT_THRESHOLDS.flow_red)?,
            flow_black: parse_var(&lookup, THRESHOLD_VARS[2], DEFAULT_THRESHOLDS.flow_black)?,
            wind_amber: parse_var(&lookup, THRESHOLD_VARS[3], DEFAULT_THRESHOLDS.wind_amber)?,
            wind_red: parse_var(&lookup, THRESHOLD_VARS[4], DEFAULT_THRESHOLDS.wind_red)?,
        };
        thresholds.validate()?;
        let thresholds_defaulted = THRESHOLD_VARS.iter().all(|key| lookup(key).is_none());

        Ok(Self {
            port: parse_var(&lookup, "RIVERFLAG_PORT", defaults.port)?,
            river: RiverSourceConfig {
                base_url: lookup("RIVERFLAG_RIVER_API_BASE").unwrap_or(defaults.river.base_url),
                measure_id: lookup("RIVERFLAG_MEASURE_ID").unwrap_or(defaults.river.measure_id),
            },
            weather: WeatherSourceConfig {
                base_url: lookup("RIVERFLAG_WEATHER_API_BASE")
                    .unwrap_or(defaults.weather.base_url),
                latitude,
                longitude,
                timezone: lookup("RIVERFLAG_TIMEZONE").unwrap_or(defaults.weather.timezone),
                wind_unit,
            },
            live_ttl: Duration::from_secs(parse_var(
                &lookup,
                "RIVERFLAG_LIVE_TTL_SECS",
                DEFAULT_LIVE_TTL_SECS,
            )?),
            history_ttl: Duration::from_secs(parse_var(
                &lookup,
                "RIVERFLAG_HISTORY_TTL_SECS",
                DEFAULT_HISTORY_TTL_SECS,
            )?),
            http_timeout: Duration::from_secs(parse_var(
                &lookup,
                "RIVERFLAG_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            thresholds,
            thresholds_defaulted,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: f64) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}
