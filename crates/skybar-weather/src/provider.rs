//! Forecast retrieval through the proxy endpoints, with last-known-good fallback.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::cache::LastKnownGoodCache;
use crate::types::{Coordinates, FetchSettings, RawPayload, Warning, WeatherError};

/// Status and body of one proxy response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResponse {
    pub status: u16,
    pub body: String,
}

impl SourceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport to a forecast proxy endpoint.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Issue one request for `coords` to `endpoint`.
    async fn get(
        &self,
        endpoint: &str,
        coords: Coordinates,
        settings: &FetchSettings,
    ) -> Result<SourceResponse, WeatherError>;
}

/// HTTP GET against the proxy: `<endpoint>?url=<lat>,<lon>[&units=..][&lang=..]`
#[derive(Debug, Clone)]
pub struct HttpProxySource {
    client: Arc<Client>,
}

impl HttpProxySource {
    pub fn new(timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Build the request URL for `endpoint`, replacing any existing query.
    pub fn request_url(
        endpoint: &str,
        coords: Coordinates,
        settings: &FetchSettings,
    ) -> Result<Url, WeatherError> {
        let mut url = Url::parse(endpoint).map_err(|e| WeatherError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("url", &coords.query_value());
            query.append_pair("units", settings.units.query_value());
            if let Some(lang) = &settings.language {
                query.append_pair("lang", lang);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl ForecastSource for HttpProxySource {
    async fn get(
        &self,
        endpoint: &str,
        coords: Coordinates,
        settings: &FetchSettings,
    ) -> Result<SourceResponse, WeatherError> {
        let url = Self::request_url(endpoint, coords, settings)?;
        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                WeatherError::Timeout {
                    endpoint: endpoint.to_string(),
                }
            } else {
                WeatherError::Network(e)
            }
        };

        let response = self.client.get(url).send().await.map_err(to_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_error)?;

        Ok(SourceResponse { status, body })
    }
}

/// Where a fetched payload came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOrigin {
    Live { endpoint: String },
    Cache,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub payload: RawPayload,
    pub origin: PayloadOrigin,
}

impl FetchOutcome {
    pub fn is_stale(&self) -> bool {
        self.origin == PayloadOrigin::Cache
    }

    pub fn warning(&self) -> Option<Warning> {
        self.is_stale().then_some(Warning::StaleDataServed)
    }
}

/// Parse a proxy body. Anything without `timezone`, `currently` and
/// `hourly.data` is a [`WeatherError::MalformedPayload`].
pub fn parse_payload(endpoint: &str, body: &str) -> Result<RawPayload, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::MalformedPayload {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Tries each proxy endpoint in order until one returns a usable payload.
#[derive(Clone)]
pub struct FetchOrchestrator {
    source: Arc<dyn ForecastSource>,
    endpoints: Vec<String>,
    attempt_timeout: Duration,
    cache: LastKnownGoodCache,
}

impl FetchOrchestrator {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        endpoints: Vec<String>,
        attempt_timeout: Duration,
        cache: LastKnownGoodCache,
    ) -> Self {
        Self {
            source,
            endpoints,
            attempt_timeout,
            cache,
        }
    }

    /// Fetch a forecast for `coords`.
    ///
    /// Stops at the first usable payload and writes it to the cache. When every
    /// endpoint fails the cached payload is returned with [`PayloadOrigin::Cache`];
    /// with no cache the result is [`WeatherError::ProxyUnavailable`].
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(
        &self,
        coords: Coordinates,
        settings: &FetchSettings,
    ) -> Result<FetchOutcome, WeatherError> {
        for endpoint in &self.endpoints {
            match self.attempt(endpoint, coords, settings).await {
                Ok(payload) => {
                    tracing::info!("Forecast loaded from {}", endpoint);
                    if let Err(e) = self.cache.save(&payload) {
                        tracing::warn!("Failed to save forecast cache: {}", e);
                    }
                    return Ok(FetchOutcome {
                        payload,
                        origin: PayloadOrigin::Live {
                            endpoint: endpoint.clone(),
                        },
                    });
                }
                Err(e) => {
                    tracing::warn!("Proxy attempt failed: {}", e);
                }
            }
        }

        tracing::warn!(
            "All {} proxy endpoints failed, checking cache",
            self.endpoints.len()
        );

        match self.cache.load() {
            Ok(Some(payload)) => {
                tracing::warn!("Serving cached forecast");
                Ok(FetchOutcome {
                    payload,
                    origin: PayloadOrigin::Cache,
                })
            }
            Ok(None) => Err(WeatherError::ProxyUnavailable),
            Err(e) => {
                tracing::warn!("Failed to read forecast cache: {}", e);
                Err(WeatherError::ProxyUnavailable)
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        coords: Coordinates,
        settings: &FetchSettings,
    ) -> Result<RawPayload, WeatherError> {
        let response = tokio::time::timeout(
            self.attempt_timeout,
            self.source.get(endpoint, coords, settings),
        )
        .await
        .map_err(|_| WeatherError::Timeout {
            endpoint: endpoint.to_string(),
        })??;

        if !response.is_success() {
            return Err(WeatherError::Status {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }

        parse_payload(endpoint, &response.body)
    }
}
