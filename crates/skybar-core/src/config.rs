use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Per-attempt proxy timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Wait for a position fix when none is configured
pub const DEFAULT_LOCATION_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the settings blob and the forecast cache
    pub data_dir: PathBuf,

    /// Forecast proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Device location settings
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Candidate proxy endpoints, tried in order
    pub endpoints: Vec<String>,

    /// Timeout for a single proxy request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "http://localhost:8080/proxy.php".to_string(),
                "http://localhost:8080/proxy.ashx".to_string(),
            ],
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// How long to wait for a position fix, in seconds
    pub timeout_secs: u64,

    /// Identifier reported to the platform location service
    #[serde(default = "default_desktop_id")]
    pub desktop_id: String,
}

fn default_desktop_id() -> String {
    "skybar".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_LOCATION_TIMEOUT_SECS,
            desktop_id: default_desktop_id(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skybar");

        Self {
            data_dir,
            proxy: ProxyConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Unreadable files are [`ConfigError::ParseError`], critical validation
    /// errors are [`ConfigError::Invalid`].
    pub fn load_validated() -> std::result::Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load().map_err(|e| ConfigError::ParseError(format!("{:#}", e)))?;
        config.into_validated()
    }

    /// Validate, failing on errors and logging warnings
    pub fn into_validated(self) -> std::result::Result<(Self, ValidationResult), ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.proxy.endpoints.is_empty() {
            result.add_error("proxy.endpoints", "At least one proxy endpoint is required");
        } else if self.proxy.endpoints.len() < 2 {
            result.add_warning(
                "proxy.endpoints",
                "Only one proxy endpoint configured - no fallback is available",
            );
        }

        for (i, endpoint) in self.proxy.endpoints.iter().enumerate() {
            self.validate_url(endpoint, &format!("proxy.endpoints[{}]", i), &mut result);
        }

        if self.proxy.request_timeout_secs == 0 {
            result.add_error(
                "proxy.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.proxy.request_timeout_secs > 120 {
            result.add_warning(
                "proxy.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if self.location.timeout_secs == 0 {
            result.add_error(
                "location.timeout_secs",
                "Location timeout must be greater than 0",
            );
        }

        if self.data_dir.exists() && !self.data_dir.is_dir() {
            result.add_error(
                "data_dir",
                format!("Path is not a directory: {}", self.data_dir.display()),
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.query().is_some() {
                    result.add_warning(
                        field_name,
                        "Query string will be replaced by forecast parameters",
                    );
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skybar");

        Ok(config_dir.join("config.toml"))
    }
}
