//! Error types for Riverflag.
//!
//! Transport failures are modelled as values so that the fetch services can
//! collapse them into "reading absent" without anything escaping upward.

use thiserror::Error;

/// Failure of a single outbound request made by the HTTP adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete within the caller-supplied timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS, TLS or any other transport-level failure.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),

    /// The body could not be decoded as JSON.
    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

/// Invalid or malformed configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("threshold '{field}' must be a finite number")]
    NonFiniteThreshold { field: &'static str },

    #[error("threshold '{lower}' ({lower_value}) must not exceed '{upper}' ({upper_value})")]
    ThresholdOrder {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },

    #[error("unknown wind unit '{0}', expected one of ms, kmh, mph, kn")]
    UnknownWindUnit(String),
}
