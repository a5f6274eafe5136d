//! Weather fetch-and-normalize pipeline.
//!
//! A gateway call renders a URL template, performs one GET through a
//! [`Transport`], and turns the OpenWeather-shaped body into a [`Weather`].
//! Every failure on the way, be it network, status, JSON or an unknown
//! condition code, is logged and reported as [`GatewayError::ServiceUnavailable`].

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Coordinates, Weather, WeatherType};

pub mod transport;

pub use transport::{HttpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Weather service is unavailable")]
    ServiceUnavailable,
}

pub struct WeatherGateway {
    api_key: String,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for WeatherGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherGateway")
            .field("api_key", &"<redacted>")
            .field("transport", &self.transport)
            .finish()
    }
}

impl WeatherGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_transport(api_key, HttpTransport::new())
    }

    pub fn with_transport(api_key: impl Into<String>, transport: impl Transport + 'static) -> Self {
        Self {
            api_key: api_key.into(),
            transport: Box::new(transport),
        }
    }

    /// Current weather for `city`.
    ///
    /// `endpoint_template` may use `{city}` and `{api_key}` (or the legacy
    /// `{OPEN_WEATHER_TOKEN}`).
    pub async fn get_weather(
        &self,
        endpoint_template: &str,
        city: &str,
    ) -> Result<Weather, GatewayError> {
        let encoded = urlencoding::encode(city);
        let url = self.render(endpoint_template).replace("{city}", &encoded);
        self.fetch(&url, city).await
    }

    /// Current weather at `coordinates`.
    ///
    /// `endpoint_template` may use `{lat}`/`{lon}`, or two positional `{}`
    /// slots filled with latitude then longitude.
    pub async fn get_weather_by_coordinates(
        &self,
        endpoint_template: &str,
        coordinates: Coordinates,
    ) -> Result<Weather, GatewayError> {
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let url = self
            .render(endpoint_template)
            .replace("{lat}", &lat)
            .replace("{lon}", &lon)
            .replacen("{}", &lat, 1)
            .replacen("{}", &lon, 1);
        self.fetch(&url, &coordinates.to_string()).await
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{api_key}", &self.api_key)
            .replace("{OPEN_WEATHER_TOKEN}", &self.api_key)
    }

    async fn fetch(&self, url: &str, requested: &str) -> Result<Weather, GatewayError> {
        debug!(location = requested, "requesting current weather");

        let result = self
            .transport
            .get(url)
            .await
            .and_then(|body| parse_response(&body, requested));

        result.map_err(|e| {
            warn!(location = requested, error = %format!("{e:#}"), "weather service unavailable");
            GatewayError::ServiceUnavailable
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    #[serde(default)]
    name: Option<String>,
    main: OwMain,
    weather: Vec<OwCondition>,
    sys: OwSys,
}

fn parse_response(body: &str, requested: &str) -> Result<Weather> {
    let parsed: OwResponse =
        serde_json::from_str(body).context("Failed to parse weather provider JSON")?;

    if parsed.main.humidity > 100 {
        bail!("Humidity out of range: {}", parsed.main.humidity);
    }

    let code = parsed
        .weather
        .first()
        .map(|w| w.id)
        .ok_or_else(|| anyhow!("Weather provider response contained no conditions"))?;

    let weather_type = WeatherType::from_code(code)
        .ok_or_else(|| anyhow!("Unrecognized weather condition code {code}"))?;

    let city = parsed
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| requested.to_string());

    Ok(Weather {
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        weather_type,
        humidity: parsed.main.humidity,
        sunrise: unix_to_local(parsed.sys.sunrise)?,
        sunset: unix_to_local(parsed.sys.sunset)?,
        city,
    })
}

fn unix_to_local(ts: i64) -> Result<DateTime<Local>> {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or_else(|| anyhow!("Timestamp out of range: {ts}"))
}
