//! Shared plumbing for SkyBar: configuration, user settings, durable storage
//! and the error hierarchy.

pub mod config;
pub mod error;
pub mod settings;
pub mod store;

pub use config::{
    Config, LocationConfig, ProxyConfig, ValidationResult, DEFAULT_LOCATION_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{AppError, ConfigError, StorageError};
pub use settings::{Settings, SettingsStore, Units, SETTINGS_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use anyhow::Result;

/// Initialize logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("SkyBar core initialized");
    Ok(())
}
