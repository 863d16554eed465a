use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::schema::{Migration, MIGRATIONS};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Applies an ordered list of migrations, each in its own transaction, and
/// records progress in `PRAGMA user_version`.
pub struct SchemaMigrator<'a> {
    pool: Pool<Sqlite>,
    migrations: &'a [Migration],
}

impl SchemaMigrator<'static> {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            migrations: MIGRATIONS,
        }
    }
}

impl<'a> SchemaMigrator<'a> {
    pub fn with_migrations(pool: Pool<Sqlite>, migrations: &'a [Migration]) -> Self {
        Self { pool, migrations }
    }

    #[instrument(skip(self))]
    pub async fn current_version(&self) -> Result<i64, AppError> {
        current_version(&self.pool).await
    }

    pub async fn pending(&self) -> Result<Vec<&'a Migration>, AppError> {
        let version = self.current_version().await?;
        Ok(self.migrations.iter().skip(version as usize).collect())
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<MigrationReport, AppError> {
        info!("Starting database migration");

        let from_version = self.current_version().await?;
        let target = self.migrations.len() as i64;

        if from_version > target {
            return Err(AppError::Internal(format!(
                "Database schema version {} is newer than the {} migrations this build knows",
                from_version, target
            )));
        }

        let mut applied = Vec::new();

        for (index, migration) in self
            .migrations
            .iter()
            .enumerate()
            .skip(from_version as usize)
        {
            let version = index as i64 + 1;
            info!(version, name = migration.name, "Applying migration");

            let mut tx = self.pool.begin().await?;

            // Call `Executor::execute` directly; `RawSql::execute` (which only
            // forwards here) makes this future fail the `Send` check.
            sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(migration.sql))
                .await
                .map_err(|e| {
                    AppError::Internal(format!(
                        "Migration {} ({}) failed: {}",
                        version, migration.name, e
                    ))
                })?;

            let pragma_sql = format!("PRAGMA user_version = {}", version);
            sqlx::query(&pragma_sql).execute(&mut *tx).await?;

            tx.commit().await?;
            applied.push(migration.name);
        }

        if applied.is_empty() {
            info!("No schema changes needed");
        } else {
            info!(
                "Migration completed. Schema version {} -> {}",
                from_version, target
            );
        }

        Ok(MigrationReport {
            from_version,
            to_version: target,
            applied,
        })
    }
}

pub async fn current_version(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let version = sqlx::query_scalar::<_, i64>("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<MigrationReport, AppError> {
    SchemaMigrator::new(pool.clone()).migrate().await
}
