use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use thiserror::Error;

use crate::model::ChatId;

pub const DEFAULT_DATABASE_PATH: &str = "users.db";

/// Environment variables that override values from the config file.
pub const ENV_API_KEY: &str = "OPEN_WEATHER_KEY";
pub const ENV_CITY_URL: &str = "OPEN_WEATHER_URL_CITY";
pub const ENV_COORDINATES_URL: &str = "OPEN_WEATHER_URL";
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";
pub const ENV_ADMIN_CHAT_ID: &str = "ADMIN_CHAT_ID";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value required at startup is absent from both the file and the environment.
    #[error(
        "Missing configuration value '{key}' (environment variable {env}).\n\
         Hint: run `weatherbot configure` or set {env}."
    )]
    Missing { key: &'static str, env: &'static str },

    #[error("Invalid value in {env}: {reason}")]
    Invalid { env: &'static str, reason: String },
}

/// OpenWeather credentials and endpoint templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WeatherConfig {
    pub api_key: Option<String>,

    /// Example: `https://api.openweathermap.org/data/2.5/weather?q={city}&appid={api_key}&units=metric`
    pub city_url: Option<String>,

    /// Example: `https://api.openweathermap.org/data/2.5/weather?lat={lat}&lon={lon}&appid={api_key}&units=metric`
    pub coordinates_url: Option<String>,
}

/// Fully resolved weather settings; produced by [`Config::weather_settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSettings {
    pub api_key: String,
    pub city_url: String,
    pub coordinates_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// database_path = "users.db"
///
/// [weather]
/// api_key = "..."
/// city_url = "https://api.openweathermap.org/data/2.5/weather?q={city}&appid={api_key}&units=metric"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub database_path: Option<PathBuf>,

    pub admin_chat_id: Option<ChatId>,

    #[serde(default)]
    pub weather: WeatherConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherbot", "weatherbot")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup; empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_API_KEY) {
            self.weather.api_key = Some(v);
        }
        if let Some(v) = get(ENV_CITY_URL) {
            self.weather.city_url = Some(v);
        }
        if let Some(v) = get(ENV_COORDINATES_URL) {
            self.weather.coordinates_url = Some(v);
        }
        if let Some(v) = get(ENV_DATABASE_PATH) {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_ADMIN_CHAT_ID) {
            let id = v.trim().parse::<ChatId>().map_err(|e| ConfigError::Invalid {
                env: ENV_ADMIN_CHAT_ID,
                reason: format!("'{v}' is not a chat id: {e}"),
            })?;
            self.admin_chat_id = Some(id);
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }

    /// Resolve the weather settings the gateway needs to start.
    pub fn weather_settings(&self) -> Result<WeatherSettings, ConfigError> {
        let api_key = self.weather.api_key.clone().ok_or(ConfigError::Missing {
            key: "weather.api_key",
            env: ENV_API_KEY,
        })?;
        let city_url = self.weather.city_url.clone().ok_or(ConfigError::Missing {
            key: "weather.city_url",
            env: ENV_CITY_URL,
        })?;

        Ok(WeatherSettings {
            api_key,
            city_url,
            coordinates_url: self.weather.coordinates_url.clone(),
        })
    }

    pub fn is_weather_configured(&self) -> bool {
        self.weather_settings().is_ok()
    }
}

impl WeatherSettings {
    pub fn coordinates_url(&self) -> Result<&str, ConfigError> {
        self.coordinates_url.as_deref().ok_or(ConfigError::Missing {
            key: "weather.coordinates_url",
            env: ENV_COORDINATES_URL,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_config_is_missing_api_key() {
        let err = Config::default().weather_settings().unwrap_err();

        assert_eq!(err, ConfigError::Missing { key: "weather.api_key", env: ENV_API_KEY });
        assert!(err.to_string().contains("Hint: run `weatherbot configure`"));
    }

    #[test]
    fn missing_city_url_is_reported() {
        let mut cfg = Config::default();
        cfg.weather.api_key = Some("KEY".into());

        let err = cfg.weather_settings().unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: "weather.city_url", env: ENV_CITY_URL });
        assert!(!cfg.is_weather_configured());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::from_toml(
            r#"
            database_path = "file.db"

            [weather]
            api_key = "FILE_KEY"
            city_url = "https://file.test/?q={city}"
            "#,
        )
        .expect("valid toml");

        let env = vars(&[
            (ENV_API_KEY, "ENV_KEY"),
            (ENV_DATABASE_PATH, "env.db"),
            (ENV_ADMIN_CHAT_ID, "439019486"),
            (ENV_COORDINATES_URL, ""),
        ]);
        cfg.apply_env_from(|key| env.get(key).cloned()).unwrap();

        let settings = cfg.weather_settings().expect("configured");
        assert_eq!(settings.api_key, "ENV_KEY");
        assert_eq!(settings.city_url, "https://file.test/?q={city}");
        assert_eq!(settings.coordinates_url, None);
        assert_eq!(cfg.database_path(), PathBuf::from("env.db"));
        assert_eq!(cfg.admin_chat_id, Some(439019486));
    }

    #[test]
    fn coordinates_url_is_optional_until_used() {
        let mut cfg = Config::default();
        let env = vars(&[(ENV_API_KEY, "K"), (ENV_CITY_URL, "u")]);
        cfg.apply_env_from(|key| env.get(key).cloned()).unwrap();

        let settings = cfg.weather_settings().unwrap();
        let err = settings.coordinates_url().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { env: ENV_COORDINATES_URL, .. }));
    }

    #[test]
    fn bad_admin_chat_id_is_rejected() {
        let env = vars(&[(ENV_ADMIN_CHAT_ID, "admin")]);
        let err = Config::default()
            .apply_env_from(|key| env.get(key).cloned())
            .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { env: ENV_ADMIN_CHAT_ID, .. }));
    }

    #[test]
    fn default_database_path() {
        assert_eq!(Config::default().database_path(), PathBuf::from(DEFAULT_DATABASE_PATH));
    }

    #[test]
    fn toml_roundtrip_keeps_weather_section() {
        let mut cfg = Config::default();
        cfg.weather.api_key = Some("KEY".into());
        cfg.weather.city_url = Some("https://x.test/?q={city}".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), cfg);
    }
}
