//! Fetch services for the two upstream providers.
//!
//! Each service composes the HTTP adapter, the normalizer and the shared TTL
//! cache. Transport and normalization failures are logged and collapse into
//! an absent value, so nothing but `Option`s leaves this module.
//!
//! # Data Sources
//!
//! - [`river`]: Environment Agency flood-monitoring gauge readings
//! - [`weather`]: Open-Meteo current conditions and hourly forecast

pub mod river;
pub mod weather;

pub use river::RiverFetchService;
pub use weather::WeatherFetchService;
