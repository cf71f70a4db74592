//! Data models for Riverflag.
//!
//! Every type here is an immutable value object. The aggregator is the only
//! producer of [`ObservationSnapshot`] and the classifier the only producer of
//! [`SafetyAssessment`]; the presentation layer reads their fields and never
//! re-derives a verdict on its own.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Unit system for every wind figure, fixed once in configuration.
///
/// The weather provider is always asked for this unit and wind thresholds
/// are interpreted in it, so no conversion ever happens in between.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindUnit {
    /// Metres per second.
    #[default]
    Ms,
    /// Kilometres per hour.
    Kmh,
    /// Miles per hour.
    Mph,
    /// Knots.
    Kn,
}

impl WindUnit {
    /// Value of the provider's `windspeed_unit` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            WindUnit::Ms => "ms",
            WindUnit::Kmh => "kmh",
            WindUnit::Mph => "mph",
            WindUnit::Kn => "kn",
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            WindUnit::Ms => "m/s",
            WindUnit::Kmh => "km/h",
            WindUnit::Mph => "mph",
            WindUnit::Kn => "kn",
        }
    }
}

impl FromStr for WindUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "m/s" => Ok(WindUnit::Ms),
            "kmh" | "km/h" => Ok(WindUnit::Kmh),
            "mph" => Ok(WindUnit::Mph),
            "kn" | "knots" => Ok(WindUnit::Kn),
            _ => Err(ConfigError::UnknownWindUnit(s.to_string())),
        }
    }
}

impl fmt::Display for WindUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Latest reading from the river gauge.
///
/// A `value` of `None` means the station answered but is offline; it is
/// never a zero flow. Whenever `value` is present, `measured_at` is too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverReading {
    /// Station reference reported by the provider.
    pub station_id: String,

    /// Flow in m³/s.
    pub value: Option<f64>,

    /// When the provider took the reading.
    pub measured_at: Option<DateTime<Utc>>,
}

impl RiverReading {
    /// A reading for a station that reported no current value.
    pub fn offline(station_id: &str) -> Self {
        Self {
            station_id: station_id.to_string(),
            value: None,
            measured_at: None,
        }
    }
}

/// One point of the historical flow series used for charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReading {
    pub measured_at: DateTime<Utc>,
    pub value: f64,
}

/// Historical flow series requested by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverHistory {
    pub station_id: String,
    pub since: NaiveDate,
    pub readings: Vec<HistoricalReading>,
}

/// Current conditions and today's hourly series from the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Air temperature in °C.
    pub temperature_c: f64,

    /// Sustained wind speed, in `wind_unit`.
    pub wind_speed: f64,

    /// Direction the wind blows from, in degrees.
    pub wind_direction_deg: f64,

    /// Unit of `wind_speed` and `hourly_gusts`.
    pub wind_unit: WindUnit,

    /// Gust per local hour of day. Empty when the provider omitted the series.
    pub hourly_gusts: Vec<Option<f64>>,

    /// UV index per local hour of day. Empty when the provider omitted the series.
    pub hourly_uv: Vec<Option<f64>>,

    /// Local sunrise time, if reported.
    pub sunrise: Option<NaiveTime>,

    /// Local sunset time, if reported.
    pub sunset: Option<NaiveTime>,

    /// Time of the current observation.
    pub observed_at: DateTime<Utc>,

    /// Offset of the provider's local clock from UTC.
    pub utc_offset_seconds: i32,
}

/// Everything the classifier needs, merged from both providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSnapshot {
    pub river: Option<RiverReading>,
    pub weather: Option<WeatherSnapshot>,

    /// Local hour of day, always in `0..=23`.
    pub hour_index: usize,

    /// Gust for `hour_index`, resolved against the hourly series.
    pub gust: Option<f64>,

    /// UV index for `hour_index`, resolved against the hourly series.
    pub uv_index: Option<f64>,
}

impl ObservationSnapshot {
    /// Current flow, if the station reported one.
    pub fn flow(&self) -> Option<f64> {
        self.river
            .as_ref()
            .and_then(|r| r.value)
            .filter(|v| v.is_finite())
    }

    /// The wind figure compared against wind thresholds: the larger of the
    /// sustained speed and the current-hour gust.
    pub fn wind_metric(&self) -> Option<f64> {
        let weather = self.weather.as_ref()?;
        [Some(weather.wind_speed), self.gust]
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}

/// The flag flown at the club.
///
/// Variants are declared in ascending order of danger; `Offline` sits apart
/// because it says nothing about the water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagLevel {
    Green,
    Amber,
    Red,
    Black,
    Offline,
}

impl FlagLevel {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FlagLevel::Green => "Green",
            FlagLevel::Amber => "Amber",
            FlagLevel::Red => "Red",
            FlagLevel::Black => "Black",
            FlagLevel::Offline => "Offline",
        }
    }
}

/// Which metric decided the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeringMetric {
    Flow,
    Wind,
    None,
}

/// Verdict produced by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub level: FlagLevel,

    /// Human-readable explanation of the verdict.
    pub reason: String,

    pub triggering_metric: TriggeringMetric,
}

/// Figures shown alongside the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub flow: Option<f64>,
    pub flow_measured_at: Option<DateTime<Utc>>,
    pub temperature_c: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub gust: Option<f64>,
    pub uv_index: Option<f64>,
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
    pub wind_unit: Option<WindUnit>,
}

impl DisplayMetrics {
    pub fn from_snapshot(snapshot: &ObservationSnapshot) -> Self {
        let weather = snapshot.weather.as_ref();
        Self {
            flow: snapshot.flow(),
            flow_measured_at: snapshot.river.as_ref().and_then(|r| r.measured_at),
            temperature_c: weather.map(|w| w.temperature_c),
            wind_speed: weather.map(|w| w.wind_speed),
            wind_direction_deg: weather.map(|w| w.wind_direction_deg),
            gust: snapshot.gust,
            uv_index: snapshot.uv_index,
            sunrise: weather.and_then(|w| w.sunrise),
            sunset: weather.and_then(|w| w.sunset),
            wind_unit: weather.map(|w| w.wind_unit),
        }
    }
}
