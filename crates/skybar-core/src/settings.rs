//! User preferences persisted as a single JSON blob.
//!
//! The blob is merged over hard-coded defaults on load, so older blobs missing
//! newer fields still load. Changes only happen through [`SettingsStore::save`]
//! and [`SettingsStore::reset`], both of which reload afterwards.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::StorageError;
use crate::store::KeyValueStore;

/// Store key holding the serialized [`Settings`].
pub const SETTINGS_KEY: &str = "settings";

/// Unit system requested from the forecast provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Let the provider pick based on the location
    #[default]
    Auto,
    Metric,
    Imperial,
    /// Metric with km/h wind speeds
    Canada,
    /// Metric with miles for distances
    Uk,
}

impl Units {
    /// Value of the `units` query parameter understood by the proxy.
    pub fn query_value(self) -> &'static str {
        match self {
            Units::Auto => "auto",
            Units::Metric => "si",
            Units::Imperial => "us",
            Units::Canada => "ca",
            Units::Uk => "uk2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub units: Units,
    pub twelve_hour_time: bool,
    /// Show times in the forecast location's timezone rather than the local one
    pub use_location_time: bool,
    pub hours_ahead: u32,
    pub days_ahead: u32,
    /// ISO language code; empty means let the provider detect it
    pub language: String,
    pub use_geolocation: bool,
    pub use_twitter_emoji: bool,
    pub theme: String,
    #[serde(alias = "latitude")]
    pub default_latitude: Option<f64>,
    #[serde(alias = "longitude")]
    pub default_longitude: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            units: Units::Auto,
            twelve_hour_time: true,
            use_location_time: true,
            hours_ahead: 12,
            days_ahead: 5,
            language: String::new(),
            use_geolocation: true,
            use_twitter_emoji: false,
            theme: "compact-light".to_string(),
            default_latitude: None,
            default_longitude: None,
        }
    }
}

impl Settings {
    /// True if switching from `self` to `other` changes rendered output even
    /// when the location stays the same.
    pub fn display_differs(&self, other: &Settings) -> bool {
        self.units != other.units
            || self.twelve_hour_time != other.twelve_hour_time
            || self.use_location_time != other.use_location_time
            || self.hours_ahead != other.hours_ahead
            || self.days_ahead != other.days_ahead
            || self.language != other.language
            || self.use_twitter_emoji != other.use_twitter_emoji
    }

    /// The language to request, `None` for provider auto-detection.
    pub fn language_code(&self) -> Option<&str> {
        let lang = self.language.trim();
        (!lang.is_empty()).then_some(lang)
    }

    /// Parse a persisted blob, filling missing fields from the defaults.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let mut settings: Settings =
            serde_json::from_str(json).map_err(|e| StorageError::Malformed {
                key: SETTINGS_KEY.to_string(),
                message: e.to_string(),
            })?;
        // Older blobs store a blank theme; treat it as unset
        if settings.theme.trim().is_empty() {
            settings.theme = Settings::default().theme;
        }
        Ok(settings)
    }
}

/// Loaded settings plus the store they persist to.
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    /// Create a store holding the defaults. Call [`SettingsStore::reload`] to read
    /// the persisted blob.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(Settings::default())),
        }
    }

    /// Snapshot of the active settings.
    pub fn current(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Re-read the persisted blob and make it active.
    ///
    /// Returns whether a display-affecting setting changed. On a malformed blob the
    /// active settings are left untouched and the error is returned.
    pub fn reload(&self) -> Result<bool, StorageError> {
        let loaded = match self.store.get(SETTINGS_KEY)? {
            Some(json) => Settings::from_json(&json)?,
            None => Settings::default(),
        };

        let mut current = self.current.write();
        let changed = current.display_differs(&loaded);
        *current = Arc::new(loaded);
        drop(current);

        tracing::debug!("Settings reloaded (display changed: {})", changed);
        Ok(changed)
    }

    /// Replace the persisted blob with `settings`, then reload.
    pub fn save(&self, settings: &Settings) -> Result<bool, StorageError> {
        let json = serde_json::to_string(settings).map_err(|e| StorageError::Malformed {
            key: SETTINGS_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(SETTINGS_KEY, &json)?;
        tracing::info!("Settings saved");
        self.reload()
    }

    /// Drop the persisted blob, reverting to defaults.
    pub fn reset(&self) -> Result<bool, StorageError> {
        self.store.remove(SETTINGS_KEY)?;
        tracing::info!("Settings reset to defaults");
        self.reload()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::store::MemoryStore;

    fn store_with(json: Option<&str>) -> SettingsStore {
        let kv = Arc::new(MemoryStore::new());
        if let Some(json) = json {
            kv.set(SETTINGS_KEY, json).unwrap();
        }
        SettingsStore::new(kv)
    }

    #[test]
    fn absent_key_gives_defaults() {
        let store = store_with(None);
        assert!(!store.reload().unwrap());
        assert_eq!(*store.current(), Settings::default());
    }

    #[test]
    fn partial_blob_merges_over_defaults() {
        let store = store_with(Some(
            r#"{"twelveHourTime":false,"latitude":47.6,"longitude":-122.3,"theme":""}"#,
        ));
        assert!(store.reload().unwrap());

        let s = store.current();
        assert!(!s.twelve_hour_time);
        assert_eq!(s.default_latitude, Some(47.6));
        assert_eq!(s.default_longitude, Some(-122.3));
        assert_eq!(s.theme, "compact-light");
        assert_eq!(s.hours_ahead, 12);
        assert!(s.use_geolocation);
    }

    #[test]
    fn malformed_blob_keeps_previous_settings() {
        let store = store_with(Some("{not json"));
        let err = store.reload().unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
        assert_eq!(*store.current(), Settings::default());
    }

    #[test]
    fn save_reports_display_changes_only() {
        let store = store_with(None);
        store.reload().unwrap();

        let mut s = Settings::default();
        s.use_geolocation = false;
        s.default_latitude = Some(10.0);
        s.theme = "dark".into();
        assert!(!store.save(&s).unwrap(), "location/theme are not display settings");

        s.units = Units::Metric;
        assert!(store.save(&s).unwrap());
        assert_eq!(store.current().units, Units::Metric);
    }

    #[test]
    fn reset_restores_defaults() {
        let store = store_with(Some(r#"{"twelveHourTime":false}"#));
        store.reload().unwrap();
        assert!(store.reset().unwrap());
        assert!(store.current().twelve_hour_time);
    }

    #[test]
    fn language_code_blank_is_auto() {
        let mut s = Settings::default();
        assert_eq!(s.language_code(), None);
        s.language = " de ".into();
        assert_eq!(s.language_code(), Some("de"));
    }

    #[test]
    fn units_query_values() {
        assert_eq!(Units::Auto.query_value(), "auto");
        assert_eq!(Units::Metric.query_value(), "si");
        assert_eq!(Units::Imperial.query_value(), "us");
        assert_eq!(Units::Uk.query_value(), "uk2");
    }
}
