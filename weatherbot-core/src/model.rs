use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Telegram-style numeric identity. Doubles as the `users` primary key.
pub type UserId = i64;

pub type ChatId = i64;

/// A registered user as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub chat_id: ChatId,
    /// Absent until the user finishes profile entry.
    pub city: Option<String>,
    pub registration_time: DateTime<Utc>,
}

static CITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z\s-]+$").expect("city pattern is valid"));

/// Home city name that has passed validation.
///
/// A valid name starts with an uppercase Latin letter followed by at least one
/// Latin letter, whitespace or hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct City(String);

impl City {
    pub fn parse(name: impl Into<String>) -> Result<Self, InvalidCity> {
        let name = name.into();
        if CITY_PATTERN.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(InvalidCity(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for City {
    type Error = InvalidCity;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        City::parse(value)
    }
}

impl From<City> for String {
    fn from(city: City) -> Self {
        city.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Invalid city name '{0}': it must start with an uppercase letter and contain only \
     English letters, spaces and hyphens"
)]
pub struct InvalidCity(pub String);

/// Geographic point for coordinate-based weather queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherType {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Clear,
    Fog,
    Clouds,
}

/// Provider condition-code prefixes. "800" must stay ahead of "80".
const CODE_PREFIXES: &[(&str, WeatherType)] = &[
    ("2", WeatherType::Thunderstorm),
    ("3", WeatherType::Drizzle),
    ("5", WeatherType::Rain),
    ("6", WeatherType::Snow),
    ("7", WeatherType::Fog),
    ("800", WeatherType::Clear),
    ("80", WeatherType::Clouds),
];

impl WeatherType {
    /// Classify an OpenWeather condition code by its leading digits.
    pub fn from_code(code: u32) -> Option<Self> {
        let code = code.to_string();
        CODE_PREFIXES
            .iter()
            .find(|(prefix, _)| code.starts_with(prefix))
            .map(|(_, weather_type)| *weather_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherType::Thunderstorm => "thunderstorm",
            WeatherType::Drizzle => "drizzle",
            WeatherType::Rain => "rain",
            WeatherType::Snow => "snow",
            WeatherType::Clear => "clear",
            WeatherType::Fog => "fog",
            WeatherType::Clouds => "clouds",
        }
    }
}

impl fmt::Display for WeatherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current conditions for one location, normalized from a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature: f64,
    pub feels_like: f64,
    pub weather_type: WeatherType,
    pub humidity: u8,
    pub sunrise: DateTime<Local>,
    pub sunset: DateTime<Local>,
    pub city: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_is_not_swallowed_by_clouds_prefix() {
        assert_eq!(WeatherType::from_code(800), Some(WeatherType::Clear));
        assert_eq!(WeatherType::from_code(801), Some(WeatherType::Clouds));
        assert_eq!(WeatherType::from_code(804), Some(WeatherType::Clouds));
    }

    #[test]
    fn five_hundreds_are_rain_not_drizzle() {
        for code in [500, 502, 511, 531] {
            assert_eq!(WeatherType::from_code(code), Some(WeatherType::Rain), "code {code}");
        }
        assert_eq!(WeatherType::from_code(301), Some(WeatherType::Drizzle));
    }

    #[test]
    fn remaining_groups_classify() {
        assert_eq!(WeatherType::from_code(211), Some(WeatherType::Thunderstorm));
        assert_eq!(WeatherType::from_code(601), Some(WeatherType::Snow));
        assert_eq!(WeatherType::from_code(741), Some(WeatherType::Fog));
    }

    #[test]
    fn unknown_codes_do_not_classify() {
        assert_eq!(WeatherType::from_code(99), None);
        assert_eq!(WeatherType::from_code(900), None);
        assert_eq!(WeatherType::from_code(8), None);
    }

    #[test]
    fn city_accepts_capitalized_names() {
        assert!(City::parse("Berlin").is_ok());
        assert!(City::parse("Saint-Petersburg").is_ok());
        assert!(City::parse("New York").is_ok());
    }

    #[test]
    fn city_rejects_bad_names() {
        for name in ["berlin", "B", "Berlin1", "Москва", "", "Rio_de_Janeiro"] {
            let err = City::parse(name).unwrap_err();
            assert_eq!(err.0, name);
        }
    }

    #[test]
    fn coordinates_display() {
        assert_eq!(Coordinates::new(59.94, 30.31).to_string(), "59.94, 30.31");
    }
}
