//! Windows location through the WinRT `Geolocator`.

use windows::Devices::Geolocation::{GeolocationAccessStatus, Geolocator};

use super::Position;
use crate::types::LocationError;

fn other(e: windows::core::Error) -> LocationError {
    LocationError::Other(e.message().to_string())
}

fn blocking_position() -> Result<Position, LocationError> {
    let access = Geolocator::RequestAccessAsync()
        .and_then(|op| op.get())
        .map_err(other)?;
    if access != GeolocationAccessStatus::Allowed {
        return Err(LocationError::PermissionDenied);
    }

    let locator = Geolocator::new().map_err(other)?;
    let geoposition = locator
        .GetGeopositionAsync()
        .and_then(|op| op.get())
        .map_err(other)?;
    let coordinate = geoposition.Coordinate().map_err(other)?;
    let point = coordinate
        .Point()
        .and_then(|p| p.Position())
        .map_err(other)?;

    Ok(Position {
        latitude: point.Latitude,
        longitude: point.Longitude,
        accuracy_meters: coordinate.Accuracy().ok(),
    })
}

/// The WinRT async operations are waited on a blocking thread.
pub async fn current_position(_desktop_id: &str) -> Result<Position, LocationError> {
    tokio::task::spawn_blocking(blocking_position)
        .await
        .map_err(|e| LocationError::Other(e.to_string()))?
}
