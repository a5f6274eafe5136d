//! SQLite-backed user profile store.
//!
//! One logical connection, opened by [`ProfileStore::connect`]. Every statement
//! auto-commits; column access goes through [`ProfileField`] so no caller text
//! is ever spliced into SQL.

use std::{fmt, path::Path};

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ChatId, City, UserId, UserProfile};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    username TEXT,
    chat_id INTEGER,
    city TEXT,
    registration_time DEFAULT CURRENT_TIMESTAMP
)
"#;

const SELECT_USER: &str =
    "SELECT user_id, username, chat_id, city, registration_time FROM users WHERE user_id = ?";

const INSERT_USER: &str = "INSERT INTO users (user_id, username, chat_id) VALUES (?, ?, ?)";

#[derive(Debug, Error)]
pub enum ProfileError {
    /// An operation ran before [`ProfileStore::connect`].
    #[error("Profile store is not connected")]
    NotConnected,

    #[error("User {0} is already registered")]
    DuplicateUser(UserId),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: ProfileField, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ProfileResult<T> = Result<T, ProfileError>;

/// Columns of the `users` table that can be read or written one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    UserId,
    Username,
    ChatId,
    City,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Text,
}

impl ProfileField {
    pub fn column(&self) -> &'static str {
        match self {
            ProfileField::UserId => "user_id",
            ProfileField::Username => "username",
            ProfileField::ChatId => "chat_id",
            ProfileField::City => "city",
        }
    }

    pub const fn all() -> &'static [ProfileField] {
        &[
            ProfileField::UserId,
            ProfileField::Username,
            ProfileField::ChatId,
            ProfileField::City,
        ]
    }

    fn kind(&self) -> FieldKind {
        match self {
            ProfileField::UserId | ProfileField::ChatId => FieldKind::Integer,
            ProfileField::Username | ProfileField::City => FieldKind::Text,
        }
    }

    fn select_sql(&self) -> &'static str {
        match self {
            ProfileField::UserId => {
                "SELECT user_id FROM users WHERE user_id = ? AND user_id IS NOT NULL"
            }
            ProfileField::Username => {
                "SELECT username FROM users WHERE user_id = ? AND username IS NOT NULL"
            }
            ProfileField::ChatId => {
                "SELECT chat_id FROM users WHERE user_id = ? AND chat_id IS NOT NULL"
            }
            ProfileField::City => "SELECT city FROM users WHERE user_id = ? AND city IS NOT NULL",
        }
    }

    fn update_sql(&self) -> &'static str {
        match self {
            ProfileField::UserId => "UPDATE users SET user_id = ? WHERE user_id = ?",
            ProfileField::Username => "UPDATE users SET username = ? WHERE user_id = ?",
            ProfileField::ChatId => "UPDATE users SET chat_id = ? WHERE user_id = ?",
            ProfileField::City => "UPDATE users SET city = ? WHERE user_id = ?",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single column value read from or written to a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<City> for FieldValue {
    fn from(city: City) -> Self {
        FieldValue::Text(city.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    chat_id: i64,
    city: Option<String>,
    registration_time: NaiveDateTime,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            chat_id: row.chat_id,
            city: row.city,
            // CURRENT_TIMESTAMP is written in UTC.
            registration_time: row.registration_time.and_utc(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    options: SqliteConnectOptions,
    pool: Option<SqlitePool>,
}

impl ProfileStore {
    pub fn new(options: SqliteConnectOptions) -> Self {
        Self { options, pool: None }
    }

    /// Store backed by a database file, created on first connect if missing.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(
            SqliteConnectOptions::new()
                .filename(path.as_ref())
                .create_if_missing(true),
        )
    }

    /// Private in-memory database; contents live as long as the connection.
    pub fn in_memory() -> Self {
        Self::new(
            SqliteConnectOptions::new()
                .filename(":memory:")
                .create_if_missing(true),
        )
    }

    /// Open the connection and create the `users` table if absent.
    ///
    /// Calling this on an already connected store is a no-op.
    pub async fn connect(&mut self) -> ProfileResult<()> {
        if self.pool.is_some() {
            return Ok(());
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(self.options.clone())
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        info!(filename = %self.options.get_filename().display(), "profile store connected");
        self.pool = Some(pool);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }

    fn pool(&self) -> ProfileResult<&SqlitePool> {
        self.pool.as_ref().ok_or(ProfileError::NotConnected)
    }

    pub async fn get_user(&self, user_id: UserId) -> ProfileResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(SELECT_USER)
            .bind(user_id)
            .fetch_optional(self.pool()?)
            .await?;

        Ok(row.map(UserProfile::from))
    }

    /// Register a new user with no city.
    pub async fn create_user(
        &self,
        user_id: UserId,
        username: &str,
        chat_id: ChatId,
    ) -> ProfileResult<()> {
        sqlx::query(INSERT_USER)
            .bind(user_id)
            .bind(username)
            .bind(chat_id)
            .execute(self.pool()?)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return ProfileError::DuplicateUser(user_id);
                    }
                }
                ProfileError::Database(e)
            })?;

        debug!(user_id, "user created");
        Ok(())
    }

    /// Read one column; `None` when the user is missing or the column is NULL.
    pub async fn get_field(
        &self,
        field: ProfileField,
        user_id: UserId,
    ) -> ProfileResult<Option<FieldValue>> {
        let pool = self.pool()?;
        let query = field.select_sql();

        let value = match field.kind() {
            FieldKind::Integer => sqlx::query_scalar::<_, i64>(query)
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .map(FieldValue::Integer),
            FieldKind::Text => sqlx::query_scalar::<_, String>(query)
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .map(FieldValue::Text),
        };

        Ok(value)
    }

    /// Overwrite one column and return the number of rows touched.
    ///
    /// Zero means no such user; that is not an error.
    pub async fn update_field(
        &self,
        user_id: UserId,
        field: ProfileField,
        value: impl Into<FieldValue>,
    ) -> ProfileResult<u64> {
        let value = value.into();
        validate(field, &value)?;

        let query = sqlx::query(field.update_sql());
        let query = match &value {
            FieldValue::Integer(n) => query.bind(*n),
            FieldValue::Text(s) => query.bind(s.as_str()),
        };

        let result = query.bind(user_id).execute(self.pool()?).await?;
        let rows = result.rows_affected();

        debug!(user_id, field = %field, rows, "profile field updated");
        Ok(rows)
    }
}

fn validate(field: ProfileField, value: &FieldValue) -> ProfileResult<()> {
    if field.kind() != value.kind() {
        return Err(ProfileError::InvalidValue {
            field,
            reason: format!("expected {:?} value, got {value:?}", field.kind()),
        });
    }

    if let (ProfileField::City, FieldValue::Text(name)) = (field, value) {
        City::parse(name.as_str()).map_err(|e| ProfileError::InvalidValue {
            field,
            reason: e.to_string(),
        })?;
    }

    Ok(())
}
