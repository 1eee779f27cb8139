//! Integration tests for the SQL file migrator against PostgreSQL.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test -p dbtest-db --features live-db`

#![cfg(feature = "live-db")]

use std::path::{Path, PathBuf};

use dbtest_db::{
    applied_migrations, pending_migrations, MigrateError, MigrationRunner, SqlFileMigrator,
};
use sqlx::PgPool;

fn fixtures(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
        .expect("Failed to check table")
}

#[sqlx::test(migrations = false)]
async fn test_applies_all_migrations_in_order(pool: PgPool) {
    let report = SqlFileMigrator::new()
        .run(&pool, &fixtures("migrations"))
        .await
        .expect("Migration failed");

    assert_eq!(report.applied, vec![1, 2]);
    assert!(report.skipped.is_empty());
    assert!(table_exists(&pool, "accounts").await);
    assert!(table_exists(&pool, "sessions").await);

    let applied = applied_migrations(&pool).await.unwrap();
    let versions: Vec<i64> = applied.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![2, 1], "Status lists newest first");
    assert_eq!(applied[1].description, "create accounts");
}

#[sqlx::test(migrations = false)]
async fn test_second_run_is_noop(pool: PgPool) {
    let migrator = SqlFileMigrator::new();
    migrator.run(&pool, &fixtures("migrations")).await.unwrap();

    let report = migrator.run(&pool, &fixtures("migrations")).await.unwrap();

    assert!(report.is_noop());
    assert_eq!(report.skipped, vec![1, 2]);
    assert_eq!(applied_migrations(&pool).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = false)]
async fn test_partially_migrated_database_gets_remaining_versions(pool: PgPool) {
    let partial = tempfile::TempDir::new().unwrap();
    std::fs::copy(
        fixtures("migrations").join("1_create_accounts.up.sql"),
        partial.path().join("1_create_accounts.up.sql"),
    )
    .unwrap();

    let migrator = SqlFileMigrator::new();
    let first = migrator.run(&pool, partial.path()).await.unwrap();
    assert_eq!(first.applied, vec![1]);

    let pending = pending_migrations(&pool, &fixtures("migrations")).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].version, 2);

    let second = migrator.run(&pool, &fixtures("migrations")).await.unwrap();
    assert_eq!(second.applied, vec![2]);
    assert_eq!(second.skipped, vec![1]);
}

#[sqlx::test(migrations = false)]
async fn test_failing_migration_is_reported_and_not_recorded(pool: PgPool) {
    let err = SqlFileMigrator::new()
        .run(&pool, &fixtures("broken"))
        .await
        .expect_err("Broken migration should fail");

    match err {
        MigrateError::Execute { version, .. } => assert_eq!(version, 2),
        other => panic!("Expected Execute error, got {:?}", other),
    }

    let versions: Vec<i64> = applied_migrations(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.version)
        .collect();
    assert_eq!(versions, vec![1], "Only the successful migration is recorded");
    assert!(table_exists(&pool, "widgets").await);
    assert!(!table_exists(&pool, "gadgets").await);
}

#[sqlx::test(migrations = false)]
async fn test_status_without_tracking_table(pool: PgPool) {
    let applied = applied_migrations(&pool).await.unwrap();
    assert!(applied.is_empty());
}
