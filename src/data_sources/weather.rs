//! Open-Meteo forecast client.
//!
//! Requests current conditions, today's hourly gusts and UV index, and
//! sunrise/sunset in one call. The wind unit is taken from configuration
//! and sent with every request, so every wind figure in the system shares
//! it.
//!
//! # API Reference
//!
//! See: <https://open-meteo.com/en/docs>

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::config::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LIVE_TTL_SECS, WeatherSourceConfig};
use crate::http::HttpFetcher;
use crate::model::WeatherSnapshot;
use crate::normalize::normalize_weather;

/// Current weather for the configured coordinates.
#[derive(Clone)]
pub struct WeatherFetchService {
    fetcher: Arc<dyn HttpFetcher>,
    cache: TtlCache<Value>,
    config: WeatherSourceConfig,
    ttl: Duration,
    timeout: Duration,
}

impl WeatherFetchService {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        cache: TtlCache<Value>,
        config: WeatherSourceConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            config,
            ttl: Duration::from_secs(DEFAULT_LIVE_TTL_SECS),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn forecast_url(&self) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&current_weather=true\
             &hourly=wind_gusts_10m,uv_index&daily=sunrise,sunset\
             &windspeed_unit={}&timezone={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.latitude,
            self.config.longitude,
            self.config.wind_unit.query_value(),
            urlencoding::encode(&self.config.timezone)
        )
    }

    /// Current conditions, or `None` when the provider could not be read.
    #[instrument(skip(self), fields(latitude = self.config.latitude, longitude = self.config.longitude))]
    pub async fn current(&self) -> Option<WeatherSnapshot> {
        let url = self.forecast_url();
        let key = CacheKey::new(
            "weather",
            [
                self.config.latitude.to_string(),
                self.config.longitude.to_string(),
                self.config.wind_unit.query_value().to_string(),
                self.config.timezone.clone(),
            ],
        );

        let payload = match self
            .cache
            .get_or_fetch(&key, self.ttl, || self.fetcher.fetch(&url, self.timeout))
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Weather fetch failed");
                return None;
            }
        };

        let snapshot = normalize_weather(&payload, self.config.wind_unit);
        match &snapshot {
            Some(w) => debug!(
                wind_speed = w.wind_speed,
                temperature_c = w.temperature_c,
                "Weather normalized"
            ),
            None => warn!("Weather payload has no usable current conditions"),
        }
        snapshot
    }
}
