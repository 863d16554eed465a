pub mod migrations;
pub mod schema;

pub use migrations::*;
pub use schema::*;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::error::AppError;

/// Opens a pool on `database_url`, creating the file and its directory when
/// missing.
#[instrument]
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    if let Some(path) = database_path(database_url) {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!(dir = %parent.display(), "Creating database directory");
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(database_url)?)
        .await?;

    Ok(pool)
}

/// Connection options shared by every pool. Foreign keys stay unenforced:
/// seed data may reference neighborhoods that were never loaded.
pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, AppError> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(false))
}

/// Opens and migrates. Used at startup and by every batch run.
pub async fn connect_and_migrate(database_url: &str) -> Result<SqlitePool, AppError> {
    let pool = connect(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Deletes the database file (if any) and builds a fresh one.
#[instrument]
pub async fn rebuild(database_url: &str) -> Result<SqlitePool, AppError> {
    match database_path(database_url) {
        Some(path) if path.exists() => {
            warn!(path = %path.display(), "Deleting existing database");
            std::fs::remove_file(&path)?;
        }
        Some(_) => {}
        None => {
            return Err(AppError::Validation(format!(
                "Cannot rebuild non-file database {}",
                database_url
            )))
        }
    }

    connect_and_migrate(database_url).await
}

/// Runs a SQL script (for example seed data) against the database.
#[instrument(skip(pool))]
pub async fn run_script(pool: &SqlitePool, path: &Path) -> Result<(), AppError> {
    let sql = std::fs::read_to_string(path)?;
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(&sql).execute(&mut *tx).await?;
    tx.commit().await?;
    info!("Executed SQL script");
    Ok(())
}

/// Extracts the on-disk path from a `sqlite:` URL. In-memory URLs have none.
pub fn database_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }

    Some(PathBuf::from(path))
}
