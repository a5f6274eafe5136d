use anyhow::{Context, Result};
use tracing::info;
use weatherbot_core::{Config, ProfileStore, WeatherGateway, WeatherSettings};

/// Everything a command needs, built once at startup.
#[derive(Debug)]
pub struct App {
    pub store: ProfileStore,
    pub gateway: WeatherGateway,
    pub weather: WeatherSettings,
}

impl App {
    /// Resolve configuration, open the profile database and build the gateway.
    ///
    /// Fails before touching the database if weather settings are missing.
    pub async fn assemble(config: &Config) -> Result<Self> {
        let weather = config.weather_settings()?;

        let path = config.database_path();
        let mut store = ProfileStore::open(&path);
        store
            .connect()
            .await
            .with_context(|| format!("Failed to open profile database: {}", path.display()))?;

        let gateway = WeatherGateway::new(weather.api_key.as_str());
        info!(
            database = %path.display(),
            coordinates = weather.coordinates_url.is_some(),
            "weatherbot assembled"
        );

        Ok(Self { store, gateway, weather })
    }

    pub async fn shutdown(mut self) {
        self.store.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weatherbot_core::ConfigError;

    #[tokio::test]
    async fn assemble_requires_weather_settings() {
        let err = App::assemble(&Config::default()).await.unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().expect("config error");

        assert!(matches!(config_err, ConfigError::Missing { key: "weather.api_key", .. }));
    }
}
