//! Forecast pipeline for SkyBar
//!
//! Resolves coordinates (device location or configured defaults), fetches a
//! forecast through an ordered list of proxy endpoints with a last-known-good
//! cache behind them, and turns the payload into display-ready snapshots.
//! [`RefreshController`] sequences the stages and publishes the result.

pub mod cache;
pub mod emoji;
mod lenient;
pub mod location;
pub mod provider;
pub mod refresh;
pub mod transform;
pub mod types;

pub use cache::{LastKnownGoodCache, CACHE_KEY};
pub use location::{CoordinateResolver, GeolocationProvider, Position, SystemGeolocation};
pub use provider::{
    FetchOrchestrator, FetchOutcome, ForecastSource, HttpProxySource, PayloadOrigin,
    SourceResponse,
};
pub use refresh::{DashboardView, RefreshController, RefreshState};
pub use transform::{system_zone, ForecastTransformer};
pub use types::*;
