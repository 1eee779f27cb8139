//! dbtest subcommands.
//!
//! Provides `prepare`, `migrate`, `status` and `reset`.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use dbtest::connection::open;
use dbtest::{reset, resolve_migrations_dir, ProvisionConfig, Provisioner};
use dbtest_db::{applied_migrations, pending_migrations, MigrationRunner, SqlFileMigrator};
use tracing::info;

pub const USAGE: &str = "Usage: dbtest <prepare|migrate|status|reset> <name> [--migrations PATH] [--json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drop, recreate, migrate and reset
    Prepare {
        name: String,
        migrations: Option<PathBuf>,
    },
    /// Apply pending migrations to an existing database
    Migrate { name: String, migrations: PathBuf },
    /// List applied (and, with a path, pending) migrations
    Status {
        name: String,
        migrations: Option<PathBuf>,
        json: bool,
    },
    /// Truncate all tables except schema_migrations
    Reset { name: String },
}

/// Parse `dbtest <command> <name> [options]`.
///
/// `args[0]` is the program name.
pub fn parse(args: &[String]) -> Result<Command> {
    if args.len() < 3 {
        return Err(anyhow!(USAGE));
    }

    let name = args[2].clone();
    let mut migrations = None;
    let mut json = false;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--migrations" => {
                if i + 1 < args.len() {
                    migrations = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    return Err(anyhow!("--migrations requires a value"));
                }
            },
            "--json" => {
                json = true;
                i += 1;
            },
            _ => {
                return Err(anyhow!("Unknown option: {}", args[i]));
            },
        }
    }

    match args[1].as_str() {
        "prepare" => Ok(Command::Prepare { name, migrations }),
        "migrate" => {
            let migrations = migrations.ok_or_else(|| anyhow!("migrate requires --migrations"))?;
            Ok(Command::Migrate { name, migrations })
        },
        "status" => Ok(Command::Status {
            name,
            migrations,
            json,
        }),
        "reset" => Ok(Command::Reset { name }),
        other => Err(anyhow!(
            "Unknown command: {}. Use prepare, migrate, status, or reset",
            other
        )),
    }
}

/// Run a parsed command with configuration from the environment.
pub async fn run(command: Command) -> Result<()> {
    let config = ProvisionConfig::from_env()?;

    match command {
        Command::Prepare { name, migrations } => {
            let provisioner = Provisioner::new(config);
            let db = provisioner
                .acquire(migrations.unwrap_or_default(), &name)
                .await?;

            info!(
                database = %db.name(),
                applied = db.migrations().map(|m| m.applied.len()).unwrap_or(0),
                "Database prepared"
            );
            println!("{}", db.name());
            db.close().await;
        },
        Command::Migrate { name, migrations } => {
            let database = config.physical_name(&name);
            let dir = resolve_migrations_dir(&env::current_dir()?, &migrations)?;
            let pool = open(&config.database_params(&database)).await?;

            let report = SqlFileMigrator::new().run(&pool, &dir).await?;
            info!(
                database = %database,
                applied = ?report.applied,
                skipped = report.skipped.len(),
                "Migrations completed"
            );
            pool.close().await;
        },
        Command::Status {
            name,
            migrations,
            json,
        } => {
            let database = config.physical_name(&name);
            let pool = open(&config.database_params(&database)).await?;

            let applied = applied_migrations(&pool).await?;
            let pending = match migrations {
                Some(fragment) => {
                    let dir = resolve_migrations_dir(&env::current_dir()?, &fragment)?;
                    pending_migrations(&pool, &dir).await?
                },
                None => Vec::new(),
            };

            if json {
                let pending_versions: Vec<i64> = pending.iter().map(|m| m.version).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "database": database,
                        "applied": applied,
                        "pending": pending_versions,
                    }))?
                );
            } else {
                info!("Database {}: {} applied migration(s)", database, applied.len());
                for mig in &applied {
                    info!("  ✓ v{}: {} ({})", mig.version, mig.description, mig.applied_at);
                }
                for mig in &pending {
                    info!("  · v{}: {} (pending)", mig.version, mig.description);
                }
            }
            pool.close().await;
        },
        Command::Reset { name } => {
            let database = config.physical_name(&name);
            let pool = open(&config.database_params(&database)).await?;

            let report = reset::reset(&pool).await?;
            info!(database = %database, tables = report.truncated.len(), "Database reset");
            pool.close().await;
        },
    }

    Ok(())
}
