//! GeoClue2 over the D-Bus system bus.

use std::time::Duration;

use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;
use zbus::{proxy, Connection};

use super::Position;
use crate::types::LocationError;

/// City-level accuracy is plenty for a forecast
const ACCURACY_LEVEL_CITY: u32 = 4;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager"
)]
trait Manager {
    fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2"
)]
trait Client {
    fn start(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2"
)]
trait Location {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn accuracy(&self) -> zbus::Result<f64>;
}

fn map_zbus_error(e: zbus::Error) -> LocationError {
    match &e {
        zbus::Error::FDO(inner) if matches!(**inner, zbus::fdo::Error::AccessDenied(_)) => {
            LocationError::PermissionDenied
        }
        zbus::Error::MethodError(name, _, _) if name.as_str().ends_with("AccessDenied") => {
            LocationError::PermissionDenied
        }
        _ => LocationError::Other(e.to_string()),
    }
}

/// Start a GeoClue client and wait for its first fix. The caller bounds the wait.
pub async fn current_position(desktop_id: &str) -> Result<Position, LocationError> {
    let conn = Connection::system().await.map_err(|e| {
        tracing::debug!("System bus unavailable: {}", e);
        LocationError::ServiceUnavailable
    })?;

    let manager = ManagerProxy::new(&conn).await.map_err(map_zbus_error)?;
    let client_path = manager.get_client().await.map_err(|e| {
        tracing::debug!("GeoClue GetClient failed: {}", e);
        match map_zbus_error(e) {
            LocationError::Other(_) => LocationError::ServiceUnavailable,
            other => other,
        }
    })?;

    let client = ClientProxy::builder(&conn)
        .path(client_path)
        .map_err(map_zbus_error)?
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .map_err(map_zbus_error)?;

    client
        .set_desktop_id(desktop_id)
        .await
        .map_err(map_zbus_error)?;
    client
        .set_requested_accuracy_level(ACCURACY_LEVEL_CITY)
        .await
        .map_err(map_zbus_error)?;
    client.start().await.map_err(map_zbus_error)?;

    // Location stays "/" until the first fix arrives
    let location_path = loop {
        let path = client.location().await.map_err(map_zbus_error)?;
        if path.as_str() != "/" {
            break path;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    let location = LocationProxy::builder(&conn)
        .path(location_path)
        .map_err(map_zbus_error)?
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .map_err(map_zbus_error)?;

    let position = Position {
        latitude: location.latitude().await.map_err(map_zbus_error)?,
        longitude: location.longitude().await.map_err(map_zbus_error)?,
        accuracy_meters: location.accuracy().await.ok(),
    };

    if let Err(e) = client.stop().await {
        tracing::debug!("Failed to stop GeoClue client: {}", e);
    }

    Ok(position)
}
