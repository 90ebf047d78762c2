//! Database connection configuration and pool setup

use std::str::FromStr;
use std::time::Duration;

use mrkcoord_common::MrkCoordError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use thiserror::Error;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error(
        "Database configuration error: {0}. Check DATABASE_URL or the PG_DBSERVER/PG_DBNAME settings."
    )]
    Config(String),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<DbError> for MrkCoordError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Config(message) => MrkCoordError::Config(message),
            other => MrkCoordError::Database(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub connect_options: PgConnectOptions,
    /// Server and database name, for logging and the external loader
    pub server: String,
    pub database: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    ///
    /// `DATABASE_URL` wins; otherwise the discrete `PG_DBSERVER`, `PG_DBPORT`,
    /// `PG_DBNAME`, `MGD_DBUSER` and `MGD_DBPASSWORDFILE` variables are used.
    pub fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let connect_options = match var("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url)
                .map_err(|e| DbError::config(format!("invalid DATABASE_URL: {e}")))?,
            None => {
                let server = var("PG_DBSERVER")
                    .ok_or_else(|| DbError::config("neither DATABASE_URL nor PG_DBSERVER set"))?;
                let database =
                    var("PG_DBNAME").ok_or_else(|| DbError::config("PG_DBNAME not set"))?;
                let port = match var("PG_DBPORT") {
                    Some(port) => port
                        .trim()
                        .parse::<u16>()
                        .map_err(|_| DbError::config(format!("invalid PG_DBPORT {port:?}")))?,
                    None => 5432,
                };

                let mut options = PgConnectOptions::new()
                    .host(&server)
                    .port(port)
                    .database(&database);
                if let Some(user) = var("MGD_DBUSER") {
                    options = options.username(&user);
                }
                if let Some(path) = var("MGD_DBPASSWORDFILE") {
                    let password = std::fs::read_to_string(&path).map_err(|e| {
                        DbError::config(format!("cannot read MGD_DBPASSWORDFILE {path}: {e}"))
                    })?;
                    options = options.password(password.trim());
                }
                options
            },
        };

        let server = connect_options.get_host().to_string();
        let database = connect_options
            .get_database()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            connect_options,
            server,
            database,
            max_connections: parse_or(var("DB_MAX_CONNECTIONS"), 5),
            min_connections: parse_or(var("DB_MIN_CONNECTIONS"), 1),
            connect_timeout_secs: parse_or(var("DB_CONNECT_TIMEOUT"), 30),
        })
    }
}

/// Unset, malformed and out-of-range values all fall back to `default`
fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(config.connect_options.clone())
        .await?;

    tracing::info!(
        server = %config.server,
        database = %config.database,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}
