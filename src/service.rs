//! The evaluation entry point.
//!
//! [`SafetyService`] holds its collaborators explicitly (fetch services with
//! their shared cache, and the thresholds) and exposes one operation,
//! [`SafetyService::evaluate`], that fetches both sources concurrently,
//! assembles a snapshot and classifies it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::aggregation::assemble;
use crate::cache::TtlCache;
use crate::classify::{Thresholds, classify};
use crate::config::Config;
use crate::data_sources::{RiverFetchService, WeatherFetchService};
use crate::http::HttpFetcher;
use crate::model::{DisplayMetrics, ObservationSnapshot, RiverHistory, SafetyAssessment};

/// Result of one evaluation, handed to the presentation layer as-is.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub evaluated_at: DateTime<Utc>,
    pub snapshot: ObservationSnapshot,
    pub assessment: SafetyAssessment,
    pub metrics: DisplayMetrics,
}

#[derive(Clone)]
pub struct SafetyService {
    river: RiverFetchService,
    weather: WeatherFetchService,
    thresholds: Thresholds,
}

impl SafetyService {
    pub fn new(
        river: RiverFetchService,
        weather: WeatherFetchService,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            river,
            weather,
            thresholds,
        }
    }

    /// Wire both fetch services to `fetcher` and one shared cache.
    pub fn from_config(config: &Config, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let cache = TtlCache::new();

        let river = RiverFetchService::new(Arc::clone(&fetcher), cache.clone(), config.river.clone())
            .with_ttls(config.live_ttl, config.history_ttl)
            .with_timeout(config.http_timeout);
        let weather = WeatherFetchService::new(fetcher, cache, config.weather.clone())
            .with_ttl(config.live_ttl)
            .with_timeout(config.http_timeout);

        Self::new(river, weather, config.thresholds)
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate current conditions.
    pub async fn evaluate(&self) -> Evaluation {
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate conditions as of `now`.
    #[instrument(skip(self))]
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Evaluation {
        let (river, weather) = tokio::join!(self.river.current(), self.weather.current());

        let snapshot = assemble(river, weather, now);
        let assessment = classify(&snapshot, &self.thresholds);
        let metrics = DisplayMetrics::from_snapshot(&snapshot);

        info!(
            level = ?assessment.level,
            trigger = ?assessment.triggering_metric,
            flow = ?snapshot.flow(),
            wind = ?snapshot.wind_metric(),
            hour_index = snapshot.hour_index,
            "Conditions evaluated"
        );

        Evaluation {
            evaluated_at: now,
            snapshot,
            assessment,
            metrics,
        }
    }

    /// Flow readings for the last `days` days, for charting.
    pub async fn river_history(&self, days: u32, now: DateTime<Utc>) -> Option<RiverHistory> {
        let since = (now - chrono::Duration::days(i64::from(days))).date_naive();
        self.river.history(since).await
    }
}
