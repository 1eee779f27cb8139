//! Migration runner errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while discovering or applying migrations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// The migrations directory or one of its files could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A `.sql` file whose name does not start with a numeric version
    #[error("Invalid migration file name: {0}")]
    InvalidFileName(String),

    /// Two files claim the same version
    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        /// Conflicting version
        version: i64,
        /// First file name
        first: String,
        /// Second file name
        second: String,
    },

    /// A migration script failed to execute
    #[error("Migration {version} ({description}) failed: {source}")]
    Execute {
        /// Version of the failing migration
        version: i64,
        /// Description taken from the file name
        description: String,
        /// Error reported by the database
        #[source]
        source: sqlx::Error,
    },

    /// Database error outside of a migration script (locking, tracking table)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
