use chrono::{DateTime, SecondsFormat, Utc};
use signal_core::{SignalError, SignalResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

#[derive(Clone)]
pub struct SignalDb {
    pool: SqlitePool,
}

impl SignalDb {
    /// Open (or create) the database and apply the schema.
    pub async fn new(database_url: &str) -> SignalResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| SignalError::Config(format!("invalid DATABASE_URL '{}': {}", database_url, e)))?
            .create_if_missing(true);

        // Every in-memory connection is its own database, so keep a single one
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    async fn init_schema(&self) -> SignalResult<()> {
        let schema = include_str!("../schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> SignalResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> SignalError {
    SignalError::Database(e.to_string())
}

/// Fixed-width UTC timestamp so that string order matches time order.
pub fn to_db_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_db_timestamp(s: &str) -> SignalResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SignalError::InvalidData(format!("bad timestamp '{}': {}", s, e)))
}
