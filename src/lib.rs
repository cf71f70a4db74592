//! Riverflag - is it safe to go on the water right now?
//!
//! # Overview
//!
//! Riverflag pulls live telemetry from a river-gauge service and a weather
//! service, reconciles their partial and unreliable responses, and derives a
//! flag level (green, amber, red, black, or offline) plus a few display
//! metrics.
//!
//! Data flows one way: both fetch services run concurrently, the aggregator
//! merges their results into an [`model::ObservationSnapshot`], and the
//! classifier turns that into a [`model::SafetyAssessment`]. Provider
//! failures never surface as errors; they show up as missing readings and,
//! when both sources are gone, as the offline flag.
//!
//! # Modules
//!
//! - [`http`]: Bounded-timeout HTTP adapter
//! - [`normalize`]: Provider payloads to internal value types
//! - [`cache`]: Single-flight TTL cache
//! - [`data_sources`]: River and weather fetch services
//! - [`aggregation`]: Snapshot assembly
//! - [`classify`]: Threshold rules
//! - [`service`]: The `evaluate` entry point
//! - [`model`]: Value objects
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod http;
pub mod model;
pub mod normalize;
pub mod service;
