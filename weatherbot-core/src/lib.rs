//! Core library for the weather bot.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The SQLite-backed user profile store
//! - The weather gateway that fetches and normalizes provider responses
//! - Shared domain models (profiles, weather)
//!
//! It is used by `weatherbot-cli`, but can also be wired into a chat front-end.

pub mod config;
pub mod gateway;
pub mod model;
pub mod store;

pub use config::{Config, ConfigError, WeatherConfig, WeatherSettings};
pub use gateway::{GatewayError, HttpTransport, Transport, WeatherGateway};
pub use model::{ChatId, City, Coordinates, InvalidCity, UserId, UserProfile, Weather, WeatherType};
pub use store::{FieldValue, ProfileError, ProfileField, ProfileStore};
