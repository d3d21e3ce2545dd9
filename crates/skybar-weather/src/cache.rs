//! Single-slot durable cache of the most recent usable forecast payload.

use skybar_core::{KeyValueStore, StorageError};
use std::sync::Arc;

use crate::types::RawPayload;

/// Store key holding the last usable payload
pub const CACHE_KEY: &str = "lastForecastData";

#[derive(Clone)]
pub struct LastKnownGoodCache {
    store: Arc<dyn KeyValueStore>,
}

impl LastKnownGoodCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the slot with `payload`.
    pub fn save(&self, payload: &RawPayload) -> Result<(), StorageError> {
        let json = serde_json::to_string(payload).map_err(|e| StorageError::Malformed {
            key: CACHE_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(CACHE_KEY, &json)
    }

    /// Read the slot. A corrupt entry is logged and treated as empty.
    pub fn load(&self) -> Result<Option<RawPayload>, StorageError> {
        let Some(json) = self.store.get(CACHE_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt forecast cache: {}", e);
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(CACHE_KEY)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{RawCurrently, RawSeries};
    use skybar_core::{FileStore, MemoryStore};

    fn payload(tz: &str) -> RawPayload {
        RawPayload {
            timezone: tz.to_string(),
            currently: RawCurrently {
                time: Some(1_700_000_000),
                temperature: Some(51.2),
                summary: Some("Drizzle".into()),
                icon: Some("rain".into()),
            },
            hourly: RawSeries { data: vec![] },
            daily: None,
            alerts: None,
        }
    }

    #[test]
    fn empty_cache_loads_none() {
        let cache = LastKnownGoodCache::new(Arc::new(MemoryStore::new()));
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn save_overwrites_single_slot() {
        let cache = LastKnownGoodCache::new(Arc::new(MemoryStore::new()));
        cache.save(&payload("America/Chicago")).unwrap();
        cache.save(&payload("America/Los_Angeles")).unwrap();
        assert_eq!(cache.load().unwrap(), Some(payload("America/Los_Angeles")));
    }

    #[test]
    fn corrupt_entry_is_treated_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(CACHE_KEY, "{\"timezone\":").unwrap();
        let cache = LastKnownGoodCache::new(store);
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        LastKnownGoodCache::new(Arc::new(FileStore::new(dir.path())))
            .save(&payload("Europe/Berlin"))
            .unwrap();

        let reopened = LastKnownGoodCache::new(Arc::new(FileStore::new(dir.path())));
        assert_eq!(reopened.load().unwrap(), Some(payload("Europe/Berlin")));

        reopened.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
    }
}
