//! Database initialization: drop, recreate and migrate.
//!
//! Database names are interpolated into DDL unquoted. Names are expected to
//! come from test authors, never from untrusted input.

use std::path::Path;

use dbtest_db::{MigrationReport, MigrationRunner};
use sqlx::{Connection, PgPool};
use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::connection::{open, open_single};
use crate::error::{ProvisionError, ProvisionResult};
use crate::registry::Registry;

/// SQLSTATE `duplicate_database`.
const DUPLICATE_DATABASE: &str = "42P04";

/// Result of the best-effort `DROP DATABASE IF EXISTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The database was dropped, or did not exist
    Dropped,
    /// The drop failed (typically another session is connected) and was ignored
    Skipped(String),
}

impl DropOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, DropOutcome::Skipped(_))
    }
}

/// Result of `CREATE DATABASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new, empty database was created
    Created,
    /// The drop was skipped and the existing database is kept
    Reused,
}

/// A database that went through initialization.
#[derive(Debug)]
pub struct Initialized {
    pub pool: PgPool,
    pub dropped: DropOutcome,
    pub created: CreateOutcome,
    /// `None` when no migrations directory was given
    pub migrations: Option<MigrationReport>,
}

pub(crate) fn drop_statement(database: &str) -> String {
    format!("DROP DATABASE IF EXISTS {}", database)
}

pub(crate) fn create_statement(database: &str) -> String {
    format!("CREATE DATABASE {}", database)
}

/// Drop and recreate `database`, record it, then migrate it.
///
/// The registry entry is written as soon as creation succeeds, so a later
/// migration failure does not cause the next request to recreate the
/// database.
pub async fn initialize(
    config: &ProvisionConfig,
    registry: &Registry,
    database: &str,
    migrations_dir: Option<&Path>,
    runner: &dyn MigrationRunner,
) -> ProvisionResult<Initialized> {
    let (dropped, created) = recreate_database(config, database).await?;
    registry.record(database);

    let pool = open(&config.database_params(database)).await?;

    let migrations = match migrations_dir {
        Some(dir) => {
            info!(database = %database, directory = %dir.display(), "Running migrations");
            Some(runner.run(&pool, dir).await?)
        },
        None => None,
    };

    Ok(Initialized {
        pool,
        dropped,
        created,
        migrations,
    })
}

/// Issue the drop/create pair over a root connection.
///
/// A failed drop is logged and ignored. A create that then reports
/// `duplicate_database` reuses the existing database.
pub async fn recreate_database(
    config: &ProvisionConfig,
    database: &str,
) -> ProvisionResult<(DropOutcome, CreateOutcome)> {
    let mut root = open_single(&config.root_params()).await?;

    let dropped = match sqlx::query(&drop_statement(database)).execute(&mut root).await {
        Ok(_) => {
            info!(database = %database, "Dropped database");
            DropOutcome::Dropped
        },
        Err(e) => {
            warn!(database = %database, error = %e, "Could not drop database, continuing");
            DropOutcome::Skipped(e.to_string())
        },
    };

    let created = match sqlx::query(&create_statement(database)).execute(&mut root).await {
        Ok(_) => {
            info!(database = %database, "Created database");
            Ok(CreateOutcome::Created)
        },
        Err(e) if dropped.is_skipped() && is_duplicate_database(&e) => {
            warn!(database = %database, "Database still exists after skipped drop, reusing it");
            Ok(CreateOutcome::Reused)
        },
        Err(source) => Err(ProvisionError::Create {
            database: database.to_string(),
            source,
        }),
    };

    let closed = root.close().await;
    let created = created?;
    closed?;

    Ok((dropped, created))
}

fn is_duplicate_database(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().map(|c| c == DUPLICATE_DATABASE).unwrap_or(false)
        },
        _ => false,
    }
}
