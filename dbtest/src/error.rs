//! Provisioning error types.

use dbtest_db::MigrateError;
use thiserror::Error;

use crate::resolve::ResolveError;

/// Errors raised while provisioning a test database.
///
/// The skipped `DROP DATABASE` is not represented here: it is reported as
/// [`DropOutcome::Skipped`](crate::initializer::DropOutcome::Skipped).
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A connection could not be opened
    #[error("Failed to open connection to database {database}: {source}")]
    Connection {
        /// Database the connection targeted
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// The migrations directory was not found
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// The migration runner failed
    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    /// `CREATE DATABASE` failed
    #[error("Failed to create database {database}: {source}")]
    Create {
        /// Physical database name
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// A truncate statement failed during reset
    #[error("Failed to reset table {table}: {source}")]
    Reset {
        /// Qualified table name
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error (current directory lookup)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;
