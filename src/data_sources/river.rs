//! Environment Agency flood-monitoring client.
//!
//! Reads the latest flow for one measure and, for charting only, the
//! historical series since a given date.
//!
//! # API Reference
//!
//! See: <https://environment.data.gov.uk/flood-monitoring/doc/reference>

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::config::{
    DEFAULT_HISTORY_TTL_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LIVE_TTL_SECS, RiverSourceConfig,
};
use crate::http::HttpFetcher;
use crate::model::{RiverHistory, RiverReading};
use crate::normalize::{normalize_river, normalize_river_history};

/// Upper bound on readings returned for a history request.
const HISTORY_LIMIT: u32 = 3000;

/// Latest and historical flow readings for the configured measure.
#[derive(Clone)]
pub struct RiverFetchService {
    fetcher: Arc<dyn HttpFetcher>,
    cache: TtlCache<Value>,
    config: RiverSourceConfig,
    live_ttl: Duration,
    history_ttl: Duration,
    timeout: Duration,
}

impl RiverFetchService {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        cache: TtlCache<Value>,
        config: RiverSourceConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            config,
            live_ttl: Duration::from_secs(DEFAULT_LIVE_TTL_SECS),
            history_ttl: Duration::from_secs(DEFAULT_HISTORY_TTL_SECS),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_ttls(mut self, live_ttl: Duration, history_ttl: Duration) -> Self {
        self.live_ttl = live_ttl;
        self.history_ttl = history_ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn measure_id(&self) -> &str {
        &self.config.measure_id
    }

    fn measure_url(&self) -> String {
        format!(
            "{}/measures/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.measure_id)
        )
    }

    /// Latest reading, or `None` when the gauge could not be read.
    #[instrument(skip(self), fields(measure_id = %self.config.measure_id))]
    pub async fn current(&self) -> Option<RiverReading> {
        let url = self.measure_url();
        let key = CacheKey::new("river", [self.config.measure_id.as_str()]);

        let payload = match self
            .cache
            .get_or_fetch(&key, self.live_ttl, || self.fetcher.fetch(&url, self.timeout))
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "River gauge fetch failed");
                return None;
            }
        };

        let reading = normalize_river(&payload, &self.config.measure_id);
        match &reading {
            Some(r) => debug!(station = %r.station_id, value = ?r.value, "River reading normalized"),
            None => warn!("River gauge payload has no usable reading"),
        }
        reading
    }

    /// Readings since `since`, oldest first, cached for the history window.
    #[instrument(skip(self), fields(measure_id = %self.config.measure_id))]
    pub async fn history(&self, since: NaiveDate) -> Option<RiverHistory> {
        let since_param = since.format("%Y-%m-%d").to_string();
        let url = format!(
            "{}/readings?since={}&_sorted&_limit={}",
            self.measure_url(),
            since_param,
            HISTORY_LIMIT
        );
        let key = CacheKey::new(
            "river-history",
            [self.config.measure_id.clone(), since_param],
        );

        match self
            .cache
            .get_or_fetch(&key, self.history_ttl, || self.fetcher.fetch(&url, self.timeout))
            .await
        {
            Ok(payload) => Some(RiverHistory {
                station_id: self.config.measure_id.clone(),
                since,
                readings: normalize_river_history(&payload),
            }),
            Err(e) => {
                warn!(error = %e, "River history fetch failed");
                None
            }
        }
    }
}
