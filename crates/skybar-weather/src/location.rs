//! Coordinate resolution: device position first (when allowed), configured
//! defaults otherwise.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Coordinates, LocationError, WeatherError};

#[cfg(target_os = "linux")]
mod geoclue;
#[cfg(target_os = "linux")]
use geoclue::current_position as platform_position;

#[cfg(windows)]
mod winrt;
#[cfg(windows)]
use winrt::current_position as platform_position;

#[cfg(not(any(target_os = "linux", windows)))]
async fn platform_position(_desktop_id: &str) -> Result<Position, LocationError> {
    Err(LocationError::ServiceUnavailable)
}

/// A position fix reported by a geolocation provider, at full precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Source of the device's current position.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Fails if permission is denied, the device has no location capability,
    /// or no fix arrives.
    async fn current_position(&self) -> Result<Position, LocationError>;
}

/// The platform location service: GeoClue2 on Linux, WinRT `Geolocator` on
/// Windows, unavailable elsewhere.
#[derive(Debug, Clone)]
pub struct SystemGeolocation {
    desktop_id: String,
}

impl SystemGeolocation {
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
        }
    }
}

#[async_trait]
impl GeolocationProvider for SystemGeolocation {
    async fn current_position(&self) -> Result<Position, LocationError> {
        platform_position(&self.desktop_id).await
    }
}

/// Picks the coordinates that drive the forecast.
#[derive(Clone)]
pub struct CoordinateResolver {
    provider: Option<Arc<dyn GeolocationProvider>>,
    timeout: Duration,
}

impl CoordinateResolver {
    pub fn new(provider: Option<Arc<dyn GeolocationProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Ask the provider once and round the fix to 3 decimals.
    ///
    /// Used directly by the settings form's "use current location" action.
    pub async fn locate(&self) -> Result<Coordinates, LocationError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(LocationError::ServiceUnavailable)?;

        let position = tokio::time::timeout(self.timeout, provider.current_position())
            .await
            .map_err(|_| LocationError::Timeout)??;

        if !position.latitude.is_finite() || !position.longitude.is_finite() {
            return Err(LocationError::Other("Provider returned a non-finite fix".into()));
        }

        Ok(Coordinates::new(position.latitude, position.longitude))
    }

    /// Resolve the coordinates to forecast for.
    ///
    /// With `use_geolocation` off the provider is never consulted. Any provider
    /// failure falls back to `fallback`; if that is absent too the result is
    /// [`WeatherError::NoLocationConfigured`].
    pub async fn resolve(
        &self,
        use_geolocation: bool,
        fallback: Option<Coordinates>,
    ) -> Result<Coordinates, WeatherError> {
        if use_geolocation {
            match self.locate().await {
                Ok(coords) => {
                    tracing::debug!("Device location: {}, {}", coords.latitude, coords.longitude);
                    return Ok(coords);
                }
                Err(e) => {
                    tracing::info!("Device location unavailable ({}), using defaults", e);
                }
            }
        } else {
            tracing::debug!("Geolocation is turned off, using defaults");
        }

        fallback
            .map(|c| Coordinates::new(c.latitude, c.longitude))
            .ok_or(WeatherError::NoLocationConfigured)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        result: Result<Position, ()>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakeProvider {
        fn at(latitude: f64, longitude: f64) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(Position {
                    latitude,
                    longitude,
                    accuracy_meters: Some(20.0),
                }),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn denied() -> Arc<Self> {
            Arc::new(Self {
                result: Err(()),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }
    }

    #[async_trait]
    impl GeolocationProvider for FakeProvider {
        async fn current_position(&self) -> Result<Position, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.map_err(|_| LocationError::PermissionDenied)
        }
    }

    fn resolver(provider: Arc<FakeProvider>) -> CoordinateResolver {
        CoordinateResolver::new(Some(provider), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn geolocation_off_never_calls_provider() {
        let provider = FakeProvider::at(1.0, 2.0);
        let fallback = Some(Coordinates::new(47.604, -122.33));

        let coords = resolver(provider.clone()).resolve(false, fallback).await.unwrap();

        assert_eq!(coords, Coordinates::new(47.604, -122.33));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn device_fix_is_rounded() {
        let provider = FakeProvider::at(47.604_449, -122.330_12);
        let coords = resolver(provider).resolve(true, None).await.unwrap();
        assert_eq!(coords.latitude, 47.604);
        assert_eq!(coords.longitude, -122.33);
    }

    #[tokio::test]
    async fn jitter_resolves_to_same_coordinates() {
        let a = resolver(FakeProvider::at(47.604_01, -122.330_2))
            .resolve(true, None)
            .await
            .unwrap();
        let b = resolver(FakeProvider::at(47.604_31, -122.330_4))
            .resolve(true, None)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn denial_falls_back_to_defaults() {
        let provider = FakeProvider::denied();
        let fallback = Some(Coordinates::new(10.0, 20.0));
        let coords = resolver(provider.clone()).resolve(true, fallback).await.unwrap();
        assert_eq!(coords, Coordinates::new(10.0, 20.0));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_provider_falls_back_to_defaults() {
        let resolver = CoordinateResolver::new(None, Duration::from_secs(1));
        let coords = resolver
            .resolve(true, Some(Coordinates::new(1.0, 1.0)))
            .await
            .unwrap();
        assert_eq!(coords, Coordinates::new(1.0, 1.0));
    }

    #[tokio::test]
    async fn no_fallback_is_no_location_configured() {
        let err = resolver(FakeProvider::denied())
            .resolve(true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::NoLocationConfigured));

        let err = resolver(FakeProvider::at(1.0, 1.0))
            .resolve(false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::NoLocationConfigured));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_to_fallback() {
        let provider = Arc::new(FakeProvider {
            result: Ok(Position {
                latitude: 1.0,
                longitude: 1.0,
                accuracy_meters: None,
            }),
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_secs(60)),
        });
        let resolver = CoordinateResolver::new(Some(provider), Duration::from_secs(5));

        assert!(matches!(resolver.locate().await, Err(LocationError::Timeout)));

        let coords = resolver
            .resolve(true, Some(Coordinates::new(3.0, 4.0)))
            .await
            .unwrap();
        assert_eq!(coords, Coordinates::new(3.0, 4.0));
    }
}
