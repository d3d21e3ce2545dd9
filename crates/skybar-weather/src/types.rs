use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use skybar_core::{Settings, Units};

use crate::lenient;

pub(crate) const DEGREE: char = '\u{B0}';

/// Round a coordinate to 3 decimal places (~110 m), which keeps GPS jitter from
/// looking like a location change.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Geographic location, always held at 3-decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
        }
    }

    /// Build coordinates from nullable parts. Both must be present and finite,
    /// otherwise the location counts as absent.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }

    /// e.g. `47.604° N`
    pub fn latitude_display(&self) -> String {
        let hemisphere = if self.latitude >= 0.0 { "N" } else { "S" };
        format!("{}{} {}", self.latitude.abs(), DEGREE, hemisphere)
    }

    /// e.g. `122.33° W`
    pub fn longitude_display(&self) -> String {
        let hemisphere = if self.longitude >= 0.0 { "E" } else { "W" };
        format!("{}{} {}", self.longitude.abs(), DEGREE, hemisphere)
    }

    /// Map link for showing where the forecast is for (there is no geocoder)
    pub fn map_link(&self) -> String {
        format!(
            "https://www.google.com/maps/preview/@{},{},11z",
            self.latitude, self.longitude
        )
    }

    /// Value of the proxy's `url` query parameter
    pub fn query_value(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Weather icon categories mapped from provider condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Clear,
    Rain,
    Snow,
    Wind,
    Fog,
    Cloudy,
    PartlyCloudy,
    /// Unrecognized or missing code
    #[default]
    Unknown,
}

impl WeatherIcon {
    /// Map a provider icon code (`clear-day`, `rain`, ...) to an icon.
    /// Total: anything unrecognized is [`WeatherIcon::Unknown`].
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "clear-day" | "clear-night" => Self::Clear,
            "rain" => Self::Rain,
            "snow" | "sleet" => Self::Snow,
            "wind" => Self::Wind,
            "fog" => Self::Fog,
            "cloudy" => Self::Cloudy,
            "partly-cloudy-day" | "partly-cloudy-night" => Self::PartlyCloudy,
            _ => Self::Unknown,
        }
    }

    /// Unicode code point of the symbol, `None` for the empty symbol
    pub fn code_point(&self) -> Option<u32> {
        match self {
            Self::Clear => Some(0x2600),
            Self::Rain => Some(0x1F327),
            Self::Snow => Some(0x1F328),
            Self::Wind => Some(0x1F4A8),
            Self::Fog => Some(0x1F32B),
            Self::Cloudy => Some(0x2601),
            Self::PartlyCloudy => Some(0x26C5),
            Self::Unknown => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Wind => "Wind",
            Self::Fog => "Fog",
            Self::Cloudy => "Cloudy",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Unknown => "",
        }
    }
}

/// Raw forecast payload as returned by the proxy.
///
/// Only `timezone`, `currently` and `hourly.data` are required. Every other
/// field reads as absent when it is missing or has the wrong type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub timezone: String,
    pub currently: RawCurrently,
    pub hourly: RawSeries<RawHourly>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub daily: Option<RawSeries<RawDaily>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub alerts: Option<Vec<RawAlert>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned + Default"))]
pub struct RawSeries<T> {
    #[serde(deserialize_with = "lenient::series")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCurrently {
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHourly {
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub precip_probability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDaily {
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub temperature_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub temperature_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub precip_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAlert {
    #[serde(default, deserialize_with = "lenient::option")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub severity: Option<String>,
    /// Unix seconds
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub expires: Option<i64>,
}

/// Settings that shape the rendered forecast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub twelve_hour_time: bool,
    pub use_location_time: bool,
    pub hours_ahead: usize,
    pub days_ahead: usize,
    pub use_twitter_emoji: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for DisplaySettings {
    fn from(s: &Settings) -> Self {
        Self {
            twelve_hour_time: s.twelve_hour_time,
            use_location_time: s.use_location_time,
            hours_ahead: s.hours_ahead as usize,
            days_ahead: s.days_ahead as usize,
            use_twitter_emoji: s.use_twitter_emoji,
        }
    }
}

/// Parameters forwarded to the proxy alongside the coordinates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchSettings {
    pub units: Units,
    pub language: Option<String>,
}

impl From<&Settings> for FetchSettings {
    fn from(s: &Settings) -> Self {
        Self {
            units: s.units,
            language: s.language_code().map(str::to_string),
        }
    }
}

/// A weather symbol ready for display
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Glyph {
    /// Plain Unicode text; empty for unknown conditions
    pub text: String,
    /// Twemoji image to show instead of `text`, when enabled
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Observation time, e.g. `2:13 PM PST`
    pub time: String,
    pub temperature: String,
    pub description: String,
    pub icon: Glyph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub title: String,
    pub uri: String,
    pub severity: String,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: String,
    pub temperature: String,
    pub icon: Glyph,
    pub summary: String,
    pub precip_probability: String,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    /// Short weekday name in the display timezone
    pub day: String,
    pub high: String,
    pub low: String,
    pub icon: Glyph,
    pub summary: String,
    pub precip_probability: String,
    pub humidity: Option<String>,
}

/// Complete display-ready forecast, replaced wholesale on every refresh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub current: CurrentConditions,
    pub alerts: Vec<AlertEntry>,
    pub hourly: Vec<ForecastEntry>,
    pub daily: Vec<DailyEntry>,
    /// Name of the timezone the times are rendered in
    pub timezone: String,
    /// True when built from the last-known-good cache
    pub stale: bool,
}

/// Non-fatal conditions surfaced next to the data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Every proxy failed; the snapshot comes from the last-known-good cache
    StaleDataServed,
}

impl Warning {
    pub fn message(&self) -> &'static str {
        match self {
            Warning::StaleDataServed => "Could not load data from the proxy. Showing saved forecast.",
        }
    }
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Forecast pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("No default latitude/longitude is defined in the settings.")]
    NoLocationConfigured,
    #[error("Could not load data from the proxy")]
    ProxyUnavailable,
    #[error("Malformed payload from {endpoint}: {message}")]
    MalformedPayload { endpoint: String, message: String },
    #[error("Request to {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl WeatherError {
    /// Message for the error banner
    pub fn user_message(&self) -> String {
        match self {
            Self::NoLocationConfigured | Self::ProxyUnavailable => self.to_string(),
            Self::MalformedPayload { .. }
            | Self::Status { .. }
            | Self::Timeout { .. }
            | Self::InvalidEndpoint { .. }
            | Self::Network(_) => WeatherError::ProxyUnavailable.to_string(),
        }
    }
}
