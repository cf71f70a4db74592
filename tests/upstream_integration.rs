//! Integration tests against a local stand-in for the upstream providers.
//!
//! These exercise the real `reqwest` adapter: status and decode failures,
//! timeouts, refused connections, and a full evaluation over HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use riverflag::config::Config;
use riverflag::error::FetchError;
use riverflag::http::{HttpFetcher, ReqwestFetcher};
use riverflag::model::{FlagLevel, TriggeringMetric};
use riverflag::service::SafetyService;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn measure(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Json(json!({"items": [{
        "stationReference": "3400TH",
        "latestReading": {"value": 104.2, "dateTime": "2024-06-01T11:45:00Z"}
    }]}))
}

async fn forecast() -> Json<Value> {
    Json(json!({
        "utc_offset_seconds": 0,
        "current_weather": {
            "temperature": 14.0,
            "windspeed": 6.0,
            "winddirection": 300.0,
            "time": "2024-06-01T12:00"
        },
        "hourly": {"wind_gusts_10m": vec![9.0; 24]}
    }))
}

async fn spawn_upstream(hits: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route("/id/measures/:id", get(measure))
        .route("/v1/forecast", get(forecast))
        .route("/ok", get(|| async { Json(json!({"hello": "world"})) }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/garbage", get(|| async { "<html>not json</html>" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        )
        .with_state(hits);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_fetch_json() {
    let base = spawn_upstream(Arc::default()).await;

    let result = ReqwestFetcher::new().fetch(&format!("{base}/ok"), TIMEOUT).await;

    assert_eq!(result, Ok(json!({"hello": "world"})));
}

#[tokio::test]
async fn test_fetch_http_status() {
    let base = spawn_upstream(Arc::default()).await;

    let result = ReqwestFetcher::new()
        .fetch(&format!("{base}/missing"), TIMEOUT)
        .await;

    assert_eq!(result, Err(FetchError::HttpStatus(404)));
}

#[tokio::test]
async fn test_fetch_decode_error() {
    let base = spawn_upstream(Arc::default()).await;

    let result = ReqwestFetcher::new()
        .fetch(&format!("{base}/garbage"), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_fetch_timeout() {
    let base = spawn_upstream(Arc::default()).await;

    let result = ReqwestFetcher::new()
        .fetch(&format!("{base}/slow"), Duration::from_millis(200))
        .await;

    assert_eq!(result, Err(FetchError::Timeout));
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = ReqwestFetcher::new()
        .fetch(&format!("http://{addr}/measures/x"), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::NetworkFailure(_))));
}

#[tokio::test]
async fn test_evaluate_over_http() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(Arc::clone(&hits)).await;

    let config = Config {
        river: riverflag::config::RiverSourceConfig {
            base_url: format!("{base}/id"),
            measure_id: "3400TH-flow--i-15_min-m3_s".to_string(),
        },
        weather: riverflag::config::WeatherSourceConfig {
            base_url: format!("{base}/v1"),
            ..Config::default().weather
        },
        ..Config::default()
    };
    let service = SafetyService::from_config(&config, Arc::new(ReqwestFetcher::new()));

    let evaluation = service.evaluate().await;

    assert_eq!(evaluation.assessment.level, FlagLevel::Red);
    assert_eq!(evaluation.assessment.triggering_metric, TriggeringMetric::Flow);
    assert_eq!(evaluation.metrics.gust, Some(9.0));
    assert_eq!(evaluation.metrics.uv_index, None);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluations_share_one_upstream_call() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(Arc::clone(&hits)).await;

    let mut config = Config::default();
    config.river.base_url = format!("{base}/id");
    config.weather.base_url = format!("{base}/v1");
    let service = SafetyService::from_config(&config, Arc::new(ReqwestFetcher::new()));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.spawn(async move { service.evaluate().await });
    }
    while let Some(evaluation) = tasks.join_next().await {
        assert_eq!(evaluation.unwrap().assessment.level, FlagLevel::Red);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
