//! Merging of river and weather readings into one observation snapshot.
//!
//! Pure composition: no network access and no caching. A missing source is
//! an ordinary state here, not an error.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::model::{ObservationSnapshot, RiverReading, WeatherSnapshot};

/// Build the snapshot the classifier consumes.
///
/// The hour index is the hour of `now` on the weather provider's local clock
/// (UTC when no weather is available). Current-hour gust and UV are resolved
/// against the hourly series with [`hourly_value`].
pub fn assemble(
    river: Option<RiverReading>,
    weather: Option<WeatherSnapshot>,
    now: DateTime<Utc>,
) -> ObservationSnapshot {
    let hour_index = local_hour(now, weather.as_ref());

    let gust = weather
        .as_ref()
        .and_then(|w| hourly_value(&w.hourly_gusts, hour_index));
    let uv_index = weather
        .as_ref()
        .and_then(|w| hourly_value(&w.hourly_uv, hour_index));

    ObservationSnapshot {
        river,
        weather,
        hour_index,
        gust,
        uv_index,
    }
}

/// Look up `hour_index` in an hourly series.
///
/// A series shorter than `hour_index + 1` yields its last entry instead;
/// an empty series yields `None`.
pub fn hourly_value(series: &[Option<f64>], hour_index: usize) -> Option<f64> {
    let last = series.len().checked_sub(1)?;
    series.get(hour_index.min(last)).copied().flatten()
}

fn local_hour(now: DateTime<Utc>, weather: Option<&WeatherSnapshot>) -> usize {
    let offset = weather.map_or(0, |w| w.utc_offset_seconds);
    let hour = FixedOffset::east_opt(offset)
        .map(|tz| now.with_timezone(&tz).hour())
        .unwrap_or_else(|| now.hour());

    (hour as usize).min(23)
}
