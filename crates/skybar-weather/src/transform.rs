//! Raw provider payload to display-ready [`ForecastSnapshot`].
//!
//! The transform is total: missing or malformed optional fields become empty
//! strings or zeros instead of failing the whole snapshot.

use chrono::{DateTime, Local};
use chrono_tz::Tz;

use crate::emoji::glyph_for_code;
use crate::types::{
    AlertEntry, CurrentConditions, DailyEntry, DisplaySettings, ForecastEntry, ForecastSnapshot,
    RawAlert, RawDaily, RawHourly, RawPayload, WeatherIcon, DEGREE,
};

const TWELVE_HOUR: &str = "%-I:%M %p";
const TWENTY_FOUR_HOUR: &str = "%-H:%M";
const WEEKDAY: &str = "%a";

/// Round half up, matching how the forecast has always been displayed
/// (`-2.5` shows as `-2`).
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn temperature(value: Option<f64>) -> String {
    format!("{}{}", round_half_up(value.unwrap_or(0.0)), DEGREE)
}

fn percent(fraction: Option<f64>) -> String {
    format!("{}%", round_half_up(fraction.unwrap_or(0.0) * 100.0))
}

/// The operating system's IANA zone, if it can be determined
pub fn system_zone() -> Option<Tz> {
    let name = iana_time_zone::get_timezone()
        .map_err(|e| tracing::debug!("System timezone unavailable: {}", e))
        .ok()?;
    name.parse::<Tz>()
        .map_err(|_| tracing::debug!("Unrecognized system timezone {:?}", name))
        .ok()
}

/// The zone times are rendered in for one transform
#[derive(Debug, Clone, Copy)]
enum DisplayZone {
    Named(Tz),
    Local,
}

impl DisplayZone {
    fn format(&self, timestamp: Option<i64>, fmt: &str) -> String {
        let Some(utc) = timestamp.and_then(|t| DateTime::from_timestamp(t, 0)) else {
            return String::new();
        };
        match self {
            DisplayZone::Named(tz) => utc.with_timezone(tz).format(fmt).to_string(),
            DisplayZone::Local => utc.with_timezone(&Local).format(fmt).to_string(),
        }
    }

    fn name(&self) -> String {
        match self {
            DisplayZone::Named(tz) => tz.name().to_string(),
            DisplayZone::Local => "Local".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastTransformer {
    /// Named local zone; `None` falls back to chrono's offset-only `Local`
    local_zone: Option<Tz>,
}

impl Default for ForecastTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastTransformer {
    /// Use the system zone as the local zone.
    pub fn new() -> Self {
        Self {
            local_zone: system_zone(),
        }
    }

    /// Use `tz` wherever the system's local zone would be used.
    pub fn with_local_zone(tz: Tz) -> Self {
        Self {
            local_zone: Some(tz),
        }
    }

    fn local(&self) -> DisplayZone {
        match self.local_zone {
            Some(tz) => DisplayZone::Named(tz),
            None => DisplayZone::Local,
        }
    }

    fn display_zone(&self, payload: &RawPayload, settings: &DisplaySettings) -> DisplayZone {
        if !settings.use_location_time {
            return self.local();
        }
        match payload.timezone.parse::<Tz>() {
            Ok(tz) => DisplayZone::Named(tz),
            Err(_) => {
                tracing::warn!(
                    "Unknown forecast timezone {:?}, using local time",
                    payload.timezone
                );
                self.local()
            }
        }
    }

    pub fn transform(&self, payload: &RawPayload, settings: &DisplaySettings) -> ForecastSnapshot {
        let zone = self.display_zone(payload, settings);
        let time_format = if settings.twelve_hour_time {
            TWELVE_HOUR
        } else {
            TWENTY_FOUR_HOUR
        };
        let emoji = settings.use_twitter_emoji;

        let current = CurrentConditions {
            time: zone.format(payload.currently.time, &format!("{} %Z", time_format)),
            temperature: temperature(payload.currently.temperature),
            description: summary(
                payload.currently.summary.as_deref(),
                payload.currently.icon.as_deref(),
            ),
            icon: glyph_for_code(payload.currently.icon.as_deref(), emoji),
        };

        let alerts = payload
            .alerts
            .iter()
            .flatten()
            .map(|a| alert_entry(a, zone, time_format))
            .collect();

        // Index 0 is the current hour, already shown as current conditions
        let hourly = payload
            .hourly
            .data
            .iter()
            .skip(1)
            .take(settings.hours_ahead)
            .map(|h| hourly_entry(h, zone, time_format, emoji))
            .collect();

        let daily = payload
            .daily
            .iter()
            .flat_map(|d| d.data.iter())
            .take(settings.days_ahead)
            .map(|d| daily_entry(d, zone, emoji))
            .collect();

        ForecastSnapshot {
            current,
            alerts,
            hourly,
            daily,
            timezone: zone.name(),
            stale: false,
        }
    }
}

/// Provider summary, or the icon's name when the summary is missing
fn summary(text: Option<&str>, icon: Option<&str>) -> String {
    match text {
        Some(text) => text.to_string(),
        None => WeatherIcon::from_provider_code(icon.unwrap_or_default())
            .description()
            .to_string(),
    }
}

fn alert_entry(alert: &RawAlert, zone: DisplayZone, time_format: &str) -> AlertEntry {
    let mut title = alert.title.clone().unwrap_or_default();
    if let Some(expires) = alert.expires.filter(|t| *t > 0) {
        title.push_str(&format!(" (until {})", zone.format(Some(expires), time_format)));
    }

    AlertEntry {
        title,
        uri: alert.uri.clone().unwrap_or_default(),
        severity: alert.severity.clone().unwrap_or_default(),
    }
}

fn hourly_entry(
    hour: &RawHourly,
    zone: DisplayZone,
    time_format: &str,
    emoji: bool,
) -> ForecastEntry {
    ForecastEntry {
        time: zone.format(hour.time, time_format),
        temperature: temperature(hour.temperature),
        icon: glyph_for_code(hour.icon.as_deref(), emoji),
        summary: summary(hour.summary.as_deref(), hour.icon.as_deref()),
        precip_probability: percent(hour.precip_probability),
    }
}

fn daily_entry(day: &RawDaily, zone: DisplayZone, emoji: bool) -> DailyEntry {
    DailyEntry {
        day: zone.format(day.time, WEEKDAY),
        high: temperature(day.temperature_max),
        low: temperature(day.temperature_min),
        icon: glyph_for_code(day.icon.as_deref(), emoji),
        summary: summary(day.summary.as_deref(), day.icon.as_deref()),
        precip_probability: percent(day.precip_probability),
        humidity: day.humidity.map(|h| percent(Some(h))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{RawCurrently, RawSeries};

    const NOV_14_2023: i64 = 1_700_000_000;

    fn hourly(n: usize) -> Vec<RawHourly> {
        (0..n)
            .map(|i| RawHourly {
                time: Some(NOV_14_2023 + 3600 * i as i64),
                temperature: Some(50.0 + i as f64),
                summary: Some(format!("hour {}", i)),
                icon: Some("cloudy".into()),
                precip_probability: Some(0.1),
            })
            .collect()
    }

    fn payload(timezone: &str) -> RawPayload {
        RawPayload {
            timezone: timezone.to_string(),
            currently: RawCurrently {
                time: Some(NOV_14_2023),
                temperature: Some(51.5),
                summary: Some("Light Rain".into()),
                icon: Some("rain".into()),
            },
            hourly: RawSeries { data: hourly(10) },
            daily: None,
            alerts: None,
        }
    }

    fn settings() -> DisplaySettings {
        DisplaySettings {
            twelve_hour_time: true,
            use_location_time: true,
            hours_ahead: 12,
            days_ahead: 5,
            use_twitter_emoji: false,
        }
    }

    #[test]
    fn current_time_in_location_zone_with_abbreviation() {
        let snapshot = ForecastTransformer::with_local_zone(Tz::UTC)
            .transform(&payload("America/Los_Angeles"), &settings());

        assert_eq!(snapshot.current.time, "2:13 PM PST");
        assert_eq!(snapshot.current.temperature, "52\u{B0}");
        assert_eq!(snapshot.current.description, "Light Rain");
        assert_eq!(snapshot.timezone, "America/Los_Angeles");
    }

    #[test]
    fn twenty_four_hour_format() {
        let mut s = settings();
        s.twelve_hour_time = false;
        let snapshot = ForecastTransformer::new().transform(&payload("UTC"), &s);
        assert_eq!(snapshot.current.time, "22:13 UTC");
        assert_eq!(snapshot.hourly[0].time, "23:13");
    }

    #[test]
    fn local_zone_used_when_location_time_disabled() {
        let mut s = settings();
        s.use_location_time = false;
        let snapshot = ForecastTransformer::with_local_zone(Tz::Europe__Berlin)
            .transform(&payload("America/Los_Angeles"), &s);
        assert_eq!(snapshot.current.time, "11:13 PM CET");
        assert_eq!(snapshot.timezone, "Europe/Berlin");
    }

    #[test]
    fn system_zone_renders_abbreviation() {
        let Some(tz) = system_zone() else {
            return;
        };
        let mut s = settings();
        s.use_location_time = false;
        let snapshot = ForecastTransformer::new().transform(&payload("America/Los_Angeles"), &s);

        let abbreviation = DateTime::from_timestamp(NOV_14_2023, 0)
            .unwrap()
            .with_timezone(&tz)
            .format("%Z")
            .to_string();
        assert_eq!(snapshot.timezone, tz.name());
        assert!(snapshot.current.time.ends_with(&format!(" {}", abbreviation)));
    }

    #[test]
    fn unknown_payload_zone_falls_back_to_local() {
        let snapshot = ForecastTransformer::with_local_zone(Tz::UTC)
            .transform(&payload("Mars/Olympus_Mons"), &settings());
        assert_eq!(snapshot.current.time, "10:13 PM UTC");
    }

    #[test]
    fn hourly_window_starts_after_current_hour() {
        let mut s = settings();
        s.hours_ahead = 3;
        let snapshot = ForecastTransformer::new().transform(&payload("UTC"), &s);

        assert_eq!(snapshot.hourly.len(), 3);
        assert_eq!(snapshot.hourly[0].summary, "hour 1");
        assert_eq!(snapshot.hourly[2].summary, "hour 3");
        assert_eq!(snapshot.hourly[0].temperature, "51\u{B0}");
        assert_eq!(snapshot.hourly[0].precip_probability, "10%");
    }

    #[test]
    fn hourly_window_clamped_to_series() {
        let snapshot = ForecastTransformer::new().transform(&payload("UTC"), &settings());
        assert_eq!(snapshot.hourly.len(), 9);
    }

    #[test]
    fn zero_hours_ahead_is_empty() {
        let mut s = settings();
        s.hours_ahead = 0;
        s.days_ahead = 0;
        let snapshot = ForecastTransformer::new().transform(&payload("UTC"), &s);
        assert!(snapshot.hourly.is_empty());
        assert!(snapshot.daily.is_empty());
    }

    #[test]
    fn unknown_icon_maps_to_empty_symbol() {
        let mut p = payload("UTC");
        p.hourly.data[1].icon = Some("unknown-code".into());
        let snapshot = ForecastTransformer::new().transform(&p, &settings());
        assert_eq!(snapshot.hourly[0].icon.text, "");
        assert_eq!(snapshot.hourly[1].icon.text, "\u{2601}\u{FE0F}");
    }

    #[test]
    fn missing_fields_degrade_to_zero_and_empty() {
        let mut p = payload("UTC");
        p.currently = RawCurrently::default();
        p.hourly.data = vec![RawHourly::default(), RawHourly::default()];
        let snapshot = ForecastTransformer::new().transform(&p, &settings());

        assert_eq!(snapshot.current.time, "");
        assert_eq!(snapshot.current.temperature, "0\u{B0}");
        assert_eq!(snapshot.current.description, "");
        p.hourly.data[1].icon = Some("fog".into());
        let snapshot = ForecastTransformer::new().transform(&p, &settings());
        assert_eq!(snapshot.hourly[0].summary, "Fog");
        let entry = &snapshot.hourly[0];
        assert_eq!(entry.time, "");
        assert_eq!(entry.temperature, "0\u{B0}");
        assert_eq!(entry.precip_probability, "0%");
    }

    #[test]
    fn temperatures_round_half_up() {
        assert_eq!(temperature(Some(-2.5)), "-2\u{B0}");
        assert_eq!(temperature(Some(-2.6)), "-3\u{B0}");
        assert_eq!(temperature(Some(71.5)), "72\u{B0}");
        assert_eq!(temperature(Some(-0.4)), "0\u{B0}");
        assert_eq!(percent(Some(0.125)), "13%");
    }

    #[test]
    fn alerts_keep_order_and_get_expiry_suffix() {
        let mut p = payload("America/Los_Angeles");
        p.alerts = Some(vec![
            RawAlert {
                title: Some("Wind Advisory".into()),
                uri: Some("https://alerts.example/1".into()),
                severity: Some("advisory".into()),
                expires: Some(NOV_14_2023 + 3600),
            },
            RawAlert {
                title: Some("Flood Watch".into()),
                uri: None,
                severity: Some("watch".into()),
                expires: None,
            },
        ]);

        let snapshot = ForecastTransformer::new().transform(&p, &settings());
        assert_eq!(snapshot.alerts.len(), 2);
        assert_eq!(snapshot.alerts[0].title, "Wind Advisory (until 3:13 PM)");
        assert_eq!(snapshot.alerts[0].severity, "advisory");
        assert_eq!(snapshot.alerts[1].title, "Flood Watch");
        assert_eq!(snapshot.alerts[1].uri, "");
    }

    #[test]
    fn daily_window_starts_at_today() {
        let mut p = payload("UTC");
        p.daily = Some(RawSeries {
            data: (0..8)
                .map(|i| RawDaily {
                    time: Some(NOV_14_2023 + 86_400 * i),
                    temperature_max: Some(60.4),
                    temperature_min: Some(44.5),
                    summary: Some(format!("day {}", i)),
                    icon: Some("clear-day".into()),
                    precip_probability: Some(0.3),
                    humidity: if i == 0 { Some(0.81) } else { None },
                })
                .collect(),
        });

        let mut s = settings();
        s.days_ahead = 3;
        s.use_twitter_emoji = true;
        let snapshot = ForecastTransformer::new().transform(&p, &s);

        assert_eq!(snapshot.daily.len(), 3);
        let today = &snapshot.daily[0];
        assert_eq!(today.day, "Tue");
        assert_eq!(today.summary, "day 0");
        assert_eq!(today.high, "60\u{B0}");
        assert_eq!(today.low, "45\u{B0}");
        assert_eq!(today.precip_probability, "30%");
        assert_eq!(today.humidity.as_deref(), Some("81%"));
        assert!(today.icon.image_url.is_some());
        assert_eq!(snapshot.daily[1].humidity, None);
        assert_eq!(snapshot.daily[1].day, "Wed");
    }
}
