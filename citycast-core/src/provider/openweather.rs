use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{config::ProviderConfig, error::FetchError, model::WeatherSnapshot};

use super::WeatherProvider;

/// Client for OpenWeather's current-conditions endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn current_url(&self) -> String {
        format!("{}/weather", self.base_url)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self, api_key))]
    async fn current_conditions(
        &self,
        city: &str,
        api_key: &str,
    ) -> Result<WeatherSnapshot, FetchError> {
        let res = self
            .http
            .get(self.current_url())
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(%status, bytes = body.len(), "OpenWeather responded");

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        parse_current(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

fn provider_error(status: StatusCode, body: &str) -> FetchError {
    let message = serde_json::from_str::<OwErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| FetchError::fallback_message(status));

    FetchError::Provider { status, message }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: Option<i64>,
    sys: Option<OwSys>,
    main: OwMain,
    wind: OwWind,
    weather: Vec<OwWeather>,
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> Result<WeatherSnapshot, FetchError> {
        let Some(weather) = self.weather.into_iter().next() else {
            warn!("OpenWeather response has an empty weather array");
            return Err(FetchError::MalformedResponse);
        };

        let humidity = self.main.humidity;
        if !(0.0..=100.0).contains(&humidity) {
            warn!(humidity, "OpenWeather humidity out of range");
            return Err(FetchError::MalformedResponse);
        }

        let observed_at = self
            .dt
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(WeatherSnapshot {
            location_name: self.name,
            country: self.sys.and_then(|s| s.country),
            temperature_c: self.main.temp,
            feels_like_c: self.main.feels_like,
            humidity_pct: humidity.round() as u8,
            wind_speed_mps: self.wind.speed,
            pressure_hpa: self.main.pressure,
            category: weather.main,
            description: weather.description,
            icon: weather.icon,
            observed_at,
        })
    }
}

/// Validate a 2xx body. Never yields a partially filled snapshot.
fn parse_current(body: &str) -> Result<WeatherSnapshot, FetchError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, body = %truncate_body(body), "Failed to parse OpenWeather current JSON");
        FetchError::MalformedResponse
    })?;

    parsed.into_snapshot()
}

fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KANPUR: &str = r#"{
        "name": "Kanpur",
        "dt": 1700000000,
        "sys": { "country": "IN" },
        "main": { "temp": 28.4, "feels_like": 30.1, "humidity": 65, "pressure": 1008 },
        "wind": { "speed": 3.2 },
        "weather": [ { "main": "Clouds", "description": "scattered clouds", "icon": "03d" } ]
    }"#;

    #[test]
    fn parses_full_response() {
        let snapshot = parse_current(KANPUR).expect("valid body");

        assert_eq!(snapshot.location_name, "Kanpur");
        assert_eq!(snapshot.country.as_deref(), Some("IN"));
        assert_eq!(snapshot.temperature_c, 28.4);
        assert_eq!(snapshot.feels_like_c, 30.1);
        assert_eq!(snapshot.humidity_pct, 65);
        assert_eq!(snapshot.pressure_hpa, 1008.0);
        assert_eq!(snapshot.wind_speed_mps, 3.2);
        assert_eq!(snapshot.category, "Clouds");
        assert_eq!(snapshot.description, "scattered clouds");
        assert_eq!(snapshot.icon, "03d");
        assert_eq!(snapshot.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn country_is_optional() {
        let body = r#"{
            "name": "Atlantis",
            "main": { "temp": 1.0, "feels_like": 0.5, "humidity": 90, "pressure": 1000 },
            "wind": { "speed": 0.0 },
            "weather": [ { "main": "Rain", "description": "light rain", "icon": "10n" } ]
        }"#;

        let snapshot = parse_current(body).expect("valid body");
        assert_eq!(snapshot.country, None);
    }

    #[test]
    fn empty_weather_array_is_malformed() {
        let body = KANPUR.replace(
            r#"[ { "main": "Clouds", "description": "scattered clouds", "icon": "03d" } ]"#,
            "[]",
        );
        assert_eq!(parse_current(&body), Err(FetchError::MalformedResponse));
    }

    #[test]
    fn missing_or_mistyped_fields_are_malformed() {
        let missing_wind = r#"{
            "name": "Kanpur",
            "main": { "temp": 28.4, "feels_like": 30.1, "humidity": 65, "pressure": 1008 },
            "weather": [ { "main": "Clouds", "description": "scattered clouds", "icon": "03d" } ]
        }"#;
        assert_eq!(parse_current(missing_wind), Err(FetchError::MalformedResponse));

        let string_temp = KANPUR.replace("28.4", "\"hot\"");
        assert_eq!(parse_current(&string_temp), Err(FetchError::MalformedResponse));

        assert_eq!(parse_current("<html>oops</html>"), Err(FetchError::MalformedResponse));
    }

    #[test]
    fn fractional_humidity_is_rounded() {
        let body = KANPUR.replace(r#""humidity": 65"#, r#""humidity": 64.6"#);
        assert_eq!(parse_current(&body).expect("valid body").humidity_pct, 65);

        let body = KANPUR.replace(r#""humidity": 65"#, r#""humidity": 65.0"#);
        assert_eq!(parse_current(&body).expect("valid body").humidity_pct, 65);
    }

    #[test]
    fn humidity_outside_percent_range_is_malformed() {
        let body = KANPUR.replace(r#""humidity": 65"#, r#""humidity": 140"#);
        assert_eq!(parse_current(&body), Err(FetchError::MalformedResponse));

        let body = KANPUR.replace(r#""humidity": 65"#, r#""humidity": -1"#);
        assert_eq!(parse_current(&body), Err(FetchError::MalformedResponse));
    }

    #[test]
    fn provider_error_uses_message_when_present() {
        let err = provider_error(StatusCode::NOT_FOUND, r#"{"cod":"404","message":"city not found"}"#);
        assert_eq!(
            err,
            FetchError::Provider {
                status: StatusCode::NOT_FOUND,
                message: "city not found".into(),
            }
        );
    }

    #[test]
    fn provider_error_falls_back_on_unparsable_body() {
        let err = provider_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        assert_eq!(err.to_string(), "request failed with status 500");

        let err = provider_error(StatusCode::UNAUTHORIZED, r#"{"cod":401}"#);
        assert_eq!(err.to_string(), "request failed with status 401");
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let cfg = ProviderConfig {
            base_url: "http://localhost:1234/data/2.5/".into(),
            ..ProviderConfig::default()
        };
        let provider = OpenWeatherProvider::new(&cfg).expect("client");
        assert_eq!(provider.current_url(), "http://localhost:1234/data/2.5/weather");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(truncate_body(&long).chars().count(), 200);
        assert_eq!(truncate_body("short"), "short");
    }
}
