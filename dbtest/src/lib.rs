//! Freshly migrated, data-empty PostgreSQL databases for tests.
//!
//! The first [`acquire`] of a logical name in a process drops and recreates
//! its physical database (`name` + suffix, `iam` -> `iam_test` by default)
//! and runs the migrations found at the given path. Every acquisition,
//! including the first, truncates all tables except `schema_migrations`
//! before returning.
//!
//! # Usage
//!
//! ```rust,no_run
//! # async fn example() {
//! let db = dbtest::acquire("./migrations", "iam").await;
//!
//! sqlx::query("INSERT INTO users (email) VALUES ($1)")
//!     .bind("a@example.com")
//!     .execute(db.pool())
//!     .await
//!     .unwrap();
//!
//! db.close().await;
//! # }
//! ```
//!
//! The migrations path does not have to be relative to the test's working
//! directory: it is searched for under each ancestor directory, so the path
//! from the project root works from any crate in a workspace.
//!
//! Each acquisition resets the database, so parallel tests must use
//! distinct logical names.
//!
//! # Environment Variables
//!
//! - `DBTEST_USERNAME`: user for the root connection (default: postgres)
//! - `DBTEST_PASSWORD`: password for the root connection (default: postgres)
//! - `DBTEST_ROOT_DATABASE`: database used to issue CREATE/DROP (default: postgres)
//! - `DBTEST_SUFFIX`: appended to logical names (default: _test)
//!
//! Test databases themselves are always opened as `postgres`/`postgres`.

pub mod config;
pub mod connection;
pub mod error;
pub mod initializer;
pub mod provisioner;
pub mod registry;
pub mod reset;
pub mod resolve;

pub use config::ProvisionConfig;
pub use connection::ConnectionParams;
pub use dbtest_db::{MigrationReport, MigrationRunner, SqlFileMigrator, MIGRATIONS_TABLE};
pub use error::{ProvisionError, ProvisionResult};
pub use provisioner::{Provisioner, TestDatabase};
pub use reset::ResetReport;
pub use resolve::{resolve_migrations_dir, ResolveError};

use std::path::Path;
use std::sync::OnceLock;

static GLOBAL: OnceLock<Provisioner> = OnceLock::new();

/// The process-wide provisioner, configured from the environment on first use.
///
/// # Panics
/// If the environment configuration is invalid.
pub fn global() -> &'static Provisioner {
    GLOBAL.get_or_init(|| match Provisioner::from_env() {
        Ok(provisioner) => provisioner,
        Err(e) => panic!("dbtest: invalid configuration: {}", e),
    })
}

/// Change the process-wide configuration, e.g. the suffix.
///
/// Call before the first [`acquire`] of the names it should affect.
pub fn configure(f: impl FnOnce(&mut ProvisionConfig)) {
    global().configure(f);
}

/// Acquire a clean, migrated database for a test.
///
/// # Panics
/// On any provisioning failure, failing the calling test with the error.
pub async fn acquire(migrations: impl AsRef<Path>, logical_name: &str) -> TestDatabase {
    match try_acquire(migrations, logical_name).await {
        Ok(db) => db,
        Err(e) => panic!("dbtest: failed to acquire database {:?}: {}", logical_name, e),
    }
}

/// Like [`acquire`], returning errors instead of panicking.
pub async fn try_acquire(
    migrations: impl AsRef<Path>,
    logical_name: &str,
) -> ProvisionResult<TestDatabase> {
    global().acquire(migrations, logical_name).await
}
