//! Migration runner for dbtest.
//!
//! Applies ordered SQL migration files to a PostgreSQL database and tracks
//! applied versions in the reserved `schema_migrations` table.
//! Idempotent: safe to run multiple times.

mod error;
mod migrator;
mod source;

pub use error::{MigrateError, Result};
pub use migrator::SqlFileMigrator;
pub use source::{discover, MigrationFile};

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

/// Table that records applied migration versions. Never truncated by resets.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Versions applied by this run, in order
    pub applied: Vec<i64>,
    /// Versions found on disk that were already applied
    pub skipped: Vec<i64>,
}

impl MigrationReport {
    /// True when the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies every pending migration found in a directory to a database.
///
/// Implementations must be idempotent: running against a fully migrated
/// database is a no-op, and a partially migrated one receives only the
/// remaining versions, in order.
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Run pending migrations from `dir` against `pool`.
    async fn run(&self, pool: &PgPool, dir: &Path) -> Result<MigrationReport>;
}

/// A row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// List applied migrations, newest first.
///
/// Returns an empty list when the tracking table does not exist yet.
pub async fn applied_migrations(pool: &PgPool) -> Result<Vec<AppliedMigration>> {
    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(MIGRATIONS_TABLE)
        .fetch_one(pool)
        .await?;

    if !exists {
        warn!("Migration table {} not found (run `dbtest migrate` first)", MIGRATIONS_TABLE);
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, AppliedMigration>(&format!(
        "SELECT version, description, applied_at FROM {MIGRATIONS_TABLE} ORDER BY version DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Migration files in `dir` that have not been applied to `pool` yet.
pub async fn pending_migrations(pool: &PgPool, dir: &Path) -> Result<Vec<MigrationFile>> {
    let files = discover(dir)?;
    let applied: HashSet<i64> = applied_migrations(pool)
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();

    Ok(files
        .into_iter()
        .filter(|f| !applied.contains(&f.version))
        .collect())
}
