//! Provisioner: per-name state machine over the registry.
//!
//! The first request for a name drops, recreates and migrates it. Every
//! request, first or not, resets it before handing it out.

use std::path::Path;
use std::sync::{Arc, RwLock};

use dbtest_db::{MigrationReport, MigrationRunner, SqlFileMigrator};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::ProvisionConfig;
use crate::connection::open;
use crate::error::ProvisionResult;
use crate::initializer::{initialize, CreateOutcome, DropOutcome};
use crate::registry::Registry;
use crate::reset::{reset, ResetReport};
use crate::resolve::resolve_migrations_dir;

/// Test-run context: configuration, initialization registry and migration runner.
///
/// Registry checks and initialization are serialized per physical name, so
/// concurrent first requests for the same name initialize it once while
/// different names initialize in parallel. Using one name from parallel
/// tests is still unsupported: each acquisition resets the data the other
/// test is relying on.
pub struct Provisioner {
    config: RwLock<ProvisionConfig>,
    registry: Registry,
    runner: Arc<dyn MigrationRunner>,
}

impl Provisioner {
    /// Create a provisioner using the SQL file migrator.
    pub fn new(config: ProvisionConfig) -> Self {
        Self::with_runner(config, Arc::new(SqlFileMigrator::new()))
    }

    pub fn with_runner(config: ProvisionConfig, runner: Arc<dyn MigrationRunner>) -> Self {
        Self {
            config: RwLock::new(config),
            registry: Registry::new(),
            runner,
        }
    }

    /// Create a provisioner from `DBTEST_*` environment variables.
    pub fn from_env() -> ProvisionResult<Self> {
        Ok(Self::new(ProvisionConfig::from_env()?))
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ProvisionConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Change configuration. Affects every later request, including the
    /// physical name chosen for logical names not yet initialized.
    pub fn configure(&self, f: impl FnOnce(&mut ProvisionConfig)) {
        let mut config = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut config);
    }

    /// Whether `logical_name` (with the current suffix) was initialized.
    pub async fn is_initialized(&self, logical_name: &str) -> bool {
        let database = self.config().physical_name(logical_name);
        self.registry.contains(&database)
    }

    /// Acquire a clean database, resolving `migrations` from the current
    /// working directory.
    ///
    /// An empty `migrations` path skips migration entirely.
    pub async fn acquire(
        &self,
        migrations: impl AsRef<Path>,
        logical_name: &str,
    ) -> ProvisionResult<TestDatabase> {
        let start = std::env::current_dir()?;
        self.acquire_from(&start, migrations, logical_name).await
    }

    /// Acquire a clean database, resolving `migrations` upward from `start`.
    pub async fn acquire_from(
        &self,
        start: &Path,
        migrations: impl AsRef<Path>,
        logical_name: &str,
    ) -> ProvisionResult<TestDatabase> {
        let migrations = migrations.as_ref();
        let config = self.config();
        config.validate()?;

        let database = config.physical_name(logical_name);

        let guard = self.registry.lock_name(&database).await;
        let (pool, initialized) = if self.registry.contains(&database) {
            drop(guard);
            debug!(database = %database, "Database already initialized, reconnecting");
            (open(&config.database_params(&database)).await?, None)
        } else {
            let migrations_dir = if migrations.as_os_str().is_empty() {
                None
            } else {
                Some(resolve_migrations_dir(start, migrations)?)
            };

            let initialized = initialize(
                &config,
                &self.registry,
                &database,
                migrations_dir.as_deref(),
                self.runner.as_ref(),
            )
            .await?;
            drop(guard);

            info!(
                database = %database,
                dropped = ?initialized.dropped,
                created = ?initialized.created,
                "Database initialized"
            );
            let record = Initialization {
                dropped: initialized.dropped,
                created: initialized.created,
                migrations: initialized.migrations.unwrap_or_default(),
            };
            (initialized.pool, Some(record))
        };

        let reset_report = match reset(&pool).await {
            Ok(report) => report,
            Err(e) => {
                pool.close().await;
                return Err(e);
            },
        };

        Ok(TestDatabase {
            name: database,
            pool,
            initialized,
            reset: reset_report,
        })
    }
}

/// What happened when an acquisition initialized its database.
#[derive(Debug)]
struct Initialization {
    dropped: DropOutcome,
    created: CreateOutcome,
    migrations: MigrationReport,
}

/// A clean database owned by one test.
///
/// Dropping it releases the pool; [`TestDatabase::close`] does so eagerly and
/// waits for connections to shut down.
#[derive(Debug)]
pub struct TestDatabase {
    name: String,
    pool: PgPool,
    initialized: Option<Initialization>,
    reset: ResetReport,
}

impl TestDatabase {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Physical database name (logical name plus suffix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if this acquisition dropped, recreated and migrated the database.
    pub fn was_initialized(&self) -> bool {
        self.initialized.is_some()
    }

    /// Migrations applied during initialization, if this acquisition initialized.
    pub fn migrations(&self) -> Option<&MigrationReport> {
        self.initialized.as_ref().map(|i| &i.migrations)
    }

    /// Outcome of the best-effort drop, if this acquisition initialized.
    pub fn drop_outcome(&self) -> Option<&DropOutcome> {
        self.initialized.as_ref().map(|i| &i.dropped)
    }

    /// Whether the database was created or an existing one was kept, if this
    /// acquisition initialized.
    pub fn create_outcome(&self) -> Option<CreateOutcome> {
        self.initialized.as_ref().map(|i| i.created)
    }

    pub fn reset_report(&self) -> &ResetReport {
        &self.reset
    }

    /// Close all connections.
    pub async fn close(self) {
        self.pool.close().await;
        debug!(database = %self.name, "Released test database");
    }
}
