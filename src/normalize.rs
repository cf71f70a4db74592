//! Normalization of provider payloads into internal value types.
//!
//! Both providers return loosely shaped JSON. Nothing here assumes a key
//! exists: every lookup is optional, and a structurally unusable payload
//! yields `None` instead of an error.

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::model::{HistoricalReading, RiverReading, WeatherSnapshot, WindUnit};

/// Normalize a `GET /measures/{id}` response.
///
/// `items` may be a single object or a one-element array. A `latestReading`
/// given as a link rather than an embedded object means the station has no
/// current value and yields an offline reading. `fallback_station` is used
/// when the payload carries no `stationReference`.
pub fn normalize_river(payload: &Value, fallback_station: &str) -> Option<RiverReading> {
    let item = first_item(payload.get("items")?)?;
    let station_id = item
        .get("stationReference")
        .and_then(Value::as_str)
        .unwrap_or(fallback_station);

    match item.get("latestReading")? {
        Value::Object(reading) => {
            let value = reading.get("value")?.as_f64()?;
            let measured_at = parse_timestamp(reading.get("dateTime")?.as_str()?)?;
            Some(RiverReading {
                station_id: station_id.to_string(),
                value: Some(value),
                measured_at: Some(measured_at),
            })
        }
        Value::String(_) => Some(RiverReading::offline(station_id)),
        _ => None,
    }
}

/// Normalize a `GET /measures/{id}/readings` response, skipping malformed
/// items. Readings come back in chronological order.
pub fn normalize_river_history(payload: &Value) -> Vec<HistoricalReading> {
    let items: Vec<&Value> = match payload.get("items") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(item) if item.is_object() => vec![item],
        _ => Vec::new(),
    };

    let mut readings: Vec<HistoricalReading> = items
        .into_iter()
        .filter_map(|item| {
            let value = item.get("value")?.as_f64()?;
            let measured_at = parse_timestamp(item.get("dateTime")?.as_str()?)?;
            Some(HistoricalReading { measured_at, value })
        })
        .collect();

    readings.sort_by_key(|r| r.measured_at);
    readings
}

/// Normalize a `GET /forecast` response.
///
/// The `current_weather` block is mandatory. Hourly series and the daily
/// sunrise/sunset are optional and are left empty or unset when missing.
/// Provider timestamps are local wall-clock times; `utc_offset_seconds`
/// (default 0) maps them to UTC.
pub fn normalize_weather(payload: &Value, wind_unit: WindUnit) -> Option<WeatherSnapshot> {
    let current = payload.get("current_weather")?;
    let temperature_c = current.get("temperature")?.as_f64()?;
    let wind_speed = current.get("windspeed")?.as_f64()?;
    let wind_direction_deg = current.get("winddirection")?.as_f64()?;

    let utc_offset_seconds = payload
        .get("utc_offset_seconds")
        .and_then(Value::as_i64)
        .and_then(|s| i32::try_from(s).ok())
        .unwrap_or(0);
    let observed_at = parse_provider_time(current.get("time")?, utc_offset_seconds)?;

    let hourly = payload.get("hourly");

    Some(WeatherSnapshot {
        temperature_c,
        wind_speed,
        wind_direction_deg,
        wind_unit,
        hourly_gusts: hourly_series(hourly, "wind_gusts_10m"),
        hourly_uv: hourly_series(hourly, "uv_index"),
        sunrise: daily_time_of_day(payload, "sunrise"),
        sunset: daily_time_of_day(payload, "sunset"),
        observed_at,
        utc_offset_seconds,
    })
}

fn first_item(items: &Value) -> Option<&Value> {
    match items {
        Value::Array(list) => list.first(),
        Value::Object(_) => Some(items),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_provider_time(raw: &Value, utc_offset_seconds: i32) -> Option<DateTime<Utc>> {
    // `timeformat=unixtime` responses carry epoch seconds
    if let Some(epoch) = raw.as_i64() {
        return DateTime::from_timestamp(epoch, 0);
    }

    let raw = raw.as_str()?;
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    let offset = FixedOffset::east_opt(utc_offset_seconds)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn hourly_series(hourly: Option<&Value>, key: &str) -> Vec<Option<f64>> {
    hourly
        .and_then(|h| h.get(key))
        .and_then(Value::as_array)
        .map(|values| values.iter().map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn daily_time_of_day(payload: &Value, key: &str) -> Option<NaiveTime> {
    let raw = payload
        .get("daily")?
        .get(key)?
        .as_array()?
        .first()?
        .as_str()?;
    let time = raw.split_once('T').map_or(raw, |(_, time)| time);
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .ok()
}
