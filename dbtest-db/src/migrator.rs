//! SQL file migrator.
//!
//! Applies pending migrations in version order and records each applied
//! version in [`MIGRATIONS_TABLE`].

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::source::{discover, MigrationFile};
use crate::{MigrationReport, MigrationRunner, MIGRATIONS_TABLE};

/// Advisory lock key taken by every migration transaction ("dbtest" in ASCII).
const MIGRATION_LOCK_KEY: i64 = 0x6462_7465_7374;

/// Runs `<version>_<description>.up.sql` files from a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFileMigrator;

impl SqlFileMigrator {
    /// Create a new migrator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MigrationRunner for SqlFileMigrator {
    async fn run(&self, pool: &PgPool, dir: &Path) -> Result<MigrationReport> {
        let files = discover(dir)?;

        ensure_tracking_table(pool).await?;

        let mut report = MigrationReport::default();
        for file in &files {
            if apply_one(pool, file).await? {
                report.applied.push(file.version);
            } else {
                report.skipped.push(file.version);
            }
        }

        info!(
            directory = %dir.display(),
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Migrations completed"
        );
        Ok(report)
    }
}

/// SQL creating the tracking table if it is missing.
pub(crate) fn tracking_table_ddl() -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    )
}

async fn ensure_tracking_table(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    (&mut *tx).execute(sqlx::raw_sql(&tracking_table_ddl())).await?;

    tx.commit().await?;
    Ok(())
}

/// Apply `file` unless its version is already recorded.
///
/// The version check, the script and the tracking row share one transaction
/// holding the migration advisory lock, so concurrent runners against one
/// database apply each version once. Returns true if the script ran.
async fn apply_one(pool: &PgPool, file: &MigrationFile) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let applied: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {MIGRATIONS_TABLE} WHERE version = $1)"
    ))
    .bind(file.version)
    .fetch_one(&mut *tx)
    .await?;

    if applied {
        tx.rollback().await?;
        return Ok(false);
    }

    let sql = file.read_sql()?;
    debug!(version = file.version, description = %file.description, "Applying migration");

    (&mut *tx).execute(sqlx::raw_sql(&sql))
        .await
        .map_err(|source| MigrateError::Execute {
            version: file.version,
            description: file.description.clone(),
            source,
        })?;

    sqlx::query(&format!(
        "INSERT INTO {MIGRATIONS_TABLE} (version, description) VALUES ($1, $2)"
    ))
    .bind(file.version)
    .bind(&file.description)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}
