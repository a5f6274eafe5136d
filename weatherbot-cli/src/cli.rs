use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use weatherbot_core::{
    ChatId, City, Config, Coordinates, ProfileError, ProfileField, UserId, Weather,
};

use crate::app::App;

const DEFAULT_CITY_URL: &str =
    "https://api.openweathermap.org/data/2.5/weather?q={city}&appid={api_key}&units=metric";
const DEFAULT_COORDINATES_URL: &str =
    "https://api.openweathermap.org/data/2.5/weather?lat={lat}&lon={lon}&appid={api_key}&units=metric";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherbot", version, about = "Weather bot profile and forecast tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the OpenWeather credentials and endpoints.
    Configure,

    /// Register a user.
    Register {
        user_id: UserId,

        username: String,

        /// Chat to reply to; defaults to the user id (private chat).
        #[arg(long)]
        chat_id: Option<ChatId>,
    },

    /// Set or change a user's home city.
    SetCity { user_id: UserId, city: String },

    /// Show a stored profile.
    Profile { user_id: UserId },

    /// Current weather in a user's home city.
    Weather { user_id: UserId },

    /// Current weather for any city.
    Show { city: String },

    /// Current weather at a latitude/longitude.
    WeatherAt {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,

        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load()?;
        config.apply_env()?;

        if let Command::Configure = self.command {
            return configure(config);
        }

        let app = App::assemble(&config).await?;
        let result = run_command(&app, self.command).await;
        app.shutdown().await;
        result
    }
}

async fn run_command(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Configure => unreachable!("handled before assembly"),
        Command::Register { user_id, username, chat_id } => {
            let chat_id = chat_id.unwrap_or(user_id);
            match app.store.create_user(user_id, &username, chat_id).await {
                Ok(()) => println!("Registered user {user_id}. Set a city with `weatherbot set-city`."),
                Err(ProfileError::DuplicateUser(_)) => {
                    println!("User {user_id} is already registered.")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::SetCity { user_id, city } => {
            let city = City::parse(city)?;
            let rows = app.store.update_field(user_id, ProfileField::City, city.clone()).await?;
            if rows == 0 {
                bail!("User {user_id} is not registered. Run `weatherbot register` first.");
            }
            println!("Home city for {user_id} set to {city}.");
        }
        Command::Profile { user_id } => {
            let Some(profile) = app.store.get_user(user_id).await? else {
                bail!("User {user_id} is not registered.");
            };
            println!("User id:    {}", profile.user_id);
            println!("Username:   {}", profile.username);
            println!("Chat id:    {}", profile.chat_id);
            println!("City:       {}", profile.city.as_deref().unwrap_or("(not set)"));
            println!("Registered: {}", profile.registration_time.format("%d/%m/%Y, %H:%M"));
        }
        Command::Weather { user_id } => {
            let city = app
                .store
                .get_field(ProfileField::City, user_id)
                .await?
                .and_then(|v| v.as_text().map(str::to_owned));
            let Some(city) = city else {
                bail!("No home city for user {user_id}. Use `weatherbot set-city` to add one.");
            };
            let weather = app
                .gateway
                .get_weather(&app.weather.city_url, &city)
                .await
                .with_context(|| format!("Could not get the weather for {city}"))?;
            println!("{}", describe(&weather));
        }
        Command::Show { city } => {
            let weather = app
                .gateway
                .get_weather(&app.weather.city_url, &city)
                .await
                .with_context(|| format!("Could not get the weather for {city}"))?;
            println!("{}", describe(&weather));
        }
        Command::WeatherAt { latitude, longitude } => {
            let point = Coordinates::new(latitude, longitude);
            let weather = app
                .gateway
                .get_weather_by_coordinates(app.weather.coordinates_url()?, point)
                .await
                .with_context(|| format!("Could not get the weather at {point}"))?;
            println!("{}", describe(&weather));
        }
    }

    Ok(())
}

fn configure(mut config: Config) -> Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let city_url = Text::new("City endpoint template:")
        .with_default(config.weather.city_url.as_deref().unwrap_or(DEFAULT_CITY_URL))
        .prompt()
        .context("Failed to read city endpoint")?;

    let coordinates_url = Text::new("Coordinates endpoint template:")
        .with_default(
            config
                .weather
                .coordinates_url
                .as_deref()
                .unwrap_or(DEFAULT_COORDINATES_URL),
        )
        .prompt()
        .context("Failed to read coordinates endpoint")?;

    let database_path = Text::new("Profile database path:")
        .with_default(&config.database_path().to_string_lossy())
        .prompt()
        .context("Failed to read database path")?;

    config.weather.api_key = Some(api_key);
    config.weather.city_url = Some(city_url);
    config.weather.coordinates_url = Some(coordinates_url);
    config.database_path = Some(database_path.into());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    if let Some(admin) = config.admin_chat_id {
        println!("Admin chat id: {admin}");
    }
    Ok(())
}

fn describe(weather: &Weather) -> String {
    format!(
        "{city}: {temp}°C, {kind}\n\
         Humidity: {humidity}%\n\
         Feels like {feels}°C\n\
         Sunrise at {sunrise}\n\
         Sunset at {sunset}",
        city = weather.city,
        temp = weather.temperature.round(),
        kind = weather.weather_type,
        humidity = weather.humidity,
        feels = weather.feels_like.round(),
        sunrise = weather.sunrise.format("%H:%M"),
        sunset = weather.sunset.format("%H:%M"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use weatherbot_core::WeatherType;

    #[test]
    fn parses_register_with_default_chat() {
        let cli = Cli::try_parse_from(["weatherbot", "register", "42", "alice"]).unwrap();
        match cli.command {
            Command::Register { user_id, username, chat_id } => {
                assert_eq!(user_id, 42);
                assert_eq!(username, "alice");
                assert_eq!(chat_id, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["weatherbot", "weather-at", "-33.87", "151.21"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::WeatherAt { latitude, longitude } if latitude == -33.87 && longitude == 151.21
        ));
    }

    #[test]
    fn rejects_non_numeric_user_id() {
        assert!(Cli::try_parse_from(["weatherbot", "profile", "alice"]).is_err());
    }

    #[test]
    fn describe_rounds_and_formats_times() {
        let weather = Weather {
            temperature: 7.2,
            feels_like: 6.6,
            weather_type: WeatherType::Clouds,
            humidity: 64,
            sunrise: Local.with_ymd_and_hms(2022, 10, 21, 7, 52, 1).unwrap(),
            sunset: Local.with_ymd_and_hms(2022, 10, 21, 17, 34, 53).unwrap(),
            city: "Saint-Petersburg".into(),
        };

        let text = describe(&weather);
        assert!(text.starts_with("Saint-Petersburg: 7°C, clouds"));
        assert!(text.contains("Humidity: 64%"));
        assert!(text.contains("Feels like 7°C"));
        assert!(text.contains("Sunrise at 07:52"));
        assert!(text.contains("Sunset at 17:34"));
    }
}
