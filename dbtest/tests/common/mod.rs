//! Shared helpers for live database tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dbtest::connection::open_single;
use dbtest::ProvisionConfig;
use sqlx::PgPool;
use uuid::Uuid;

/// Migrations fragment, relative to the crate root.
pub const MIGRATIONS: &str = "tests/fixtures/migrations";

/// A table plus a materialized view over it.
pub const WITH_VIEWS: &str = "tests/fixtures/with_views";

/// Logical name unique to one test.
pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::now_v7().simple())
}

/// A directory below the crate root, so resolution has to walk upward.
pub fn nested_start() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

pub async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
        .expect("Failed to check table")
}

pub async fn insert_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("Failed to insert user")
}

pub async fn insert_post(pool: &PgPool, user_id: i64, title: &str) {
    sqlx::query("INSERT INTO posts (user_id, title) VALUES ($1, $2)")
        .bind(user_id)
        .bind(title)
        .execute(pool)
        .await
        .expect("Failed to insert post");
}

pub async fn applied_versions(pool: &PgPool) -> Vec<i64> {
    sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .expect("Failed to read schema_migrations")
}

/// Drop a physical database once its pools are closed.
pub async fn drop_database(config: &ProvisionConfig, database: &str) {
    let mut root = open_single(&config.root_params())
        .await
        .expect("Failed to open root connection");

    sqlx::query(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", database))
        .execute(&mut root)
        .await
        .expect("Failed to drop test database");
}
