use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::models::SiteKey;

/// Errors surfaced by the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record already exists: {key}")]
    DuplicateKey { key: SiteKey },

    #[error("Record not found: {key}")]
    NotFound { key: SiteKey },

    /// Transport, pool or transaction failure; the enclosing batch was rolled back
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classify a driver error raised while writing `key`
    pub(crate) fn from_write(err: sqlx::Error, key: &SiteKey) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateKey { key: key.clone() },
            other => StoreError::from(other),
        }
    }

    /// Only storage failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS site_records (
        site_id TEXT NOT NULL,
        year INTEGER NOT NULL,
        un_region TEXT NOT NULL,
        subregion_name TEXT NOT NULL,
        subregion_id TEXT NOT NULL,
        country_name TEXT NOT NULL,
        country_code TEXT NOT NULL,
        site_name TEXT NOT NULL,
        carcass_count INTEGER NOT NULL CHECK (carcass_count >= 0),
        illegal_carcass_count INTEGER NOT NULL CHECK (illegal_carcass_count >= 0),
        PRIMARY KEY (site_id, year)
    )",
    "CREATE INDEX IF NOT EXISTS idx_site_records_country_year ON site_records(country_code, year)",
];

/// Opens and prepares the SQLite pool backing the record store
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect using the configured URL, creating the file and table if missing.
    ///
    /// WAL mode lets readers proceed while a batch transaction is open; the
    /// acquire and busy timeouts turn a stuck store into `StoreError::Unavailable`
    /// instead of an indefinite wait.
    pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        if let Some(parent) = Self::database_file(&config.url).and_then(|path| path.parent().map(Path::to_path_buf)) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(&parent).map_err(|e| {
                    StoreError::Unavailable(format!("failed to create database directory {}: {}", parent.display(), e))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Self::bootstrap(&pool).await?;

        info!("Opened record database: {}", config.url);
        Ok(pool)
    }

    /// File path named by a `sqlite:` URL; `None` for in-memory databases
    fn database_file(url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }

    /// Create the table and indexes if they do not exist yet
    pub async fn bootstrap(pool: &SqlitePool) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
