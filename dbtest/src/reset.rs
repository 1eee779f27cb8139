//! Reset engine.
//!
//! Empties every user table except the migration tracking table, keeping
//! schema and migration history. The table list is read fresh on each call.

use dbtest_db::MIGRATIONS_TABLE;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionResult};

/// An ordinary or partitioned table listed in `pg_stat_user_tables`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserTable {
    pub schemaname: String,
    pub relname: String,
}

impl UserTable {
    /// Quoted `schema.table` name.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schemaname), quote_ident(&self.relname))
    }
}

/// Tables emptied by a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Qualified names, in truncation order
    pub truncated: Vec<String>,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn truncate_statement(table: &UserTable) -> String {
    format!("TRUNCATE {} RESTART IDENTITY CASCADE", table.qualified())
}

pub(crate) fn tables_to_truncate(tables: Vec<UserTable>) -> Vec<UserTable> {
    tables
        .into_iter()
        .filter(|t| t.relname != MIGRATIONS_TABLE)
        .collect()
}

/// Truncate all user tables except `schema_migrations`.
///
/// Runs in one transaction: if any truncate fails, none take effect and the
/// error names the failing table.
pub async fn reset(pool: &PgPool) -> ProvisionResult<ResetReport> {
    let mut tx = pool.begin().await?;

    // Materialized views appear in pg_stat_user_tables but cannot be truncated.
    let tables = sqlx::query_as::<_, UserTable>(
        r#"
        SELECT s.schemaname::text AS schemaname, s.relname::text AS relname
        FROM pg_stat_user_tables s
        JOIN pg_class c ON c.oid = s.relid
        WHERE c.relkind IN ('r', 'p')
        ORDER BY 1, 2
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let tables = tables_to_truncate(tables);
    let mut truncated = Vec::with_capacity(tables.len());

    for table in &tables {
        let name = table.qualified();

        sqlx::query(&truncate_statement(table))
            .execute(&mut *tx)
            .await
            .map_err(|source| ProvisionError::Reset {
                table: name.clone(),
                source,
            })?;

        debug!(table = %name, "Truncated table");
        truncated.push(name);
    }

    tx.commit().await?;

    info!(tables = truncated.len(), "Database reset");
    Ok(ResetReport { truncated })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: &str, name: &str) -> UserTable {
        UserTable {
            schemaname: schema.to_string(),
            relname: name.to_string(),
        }
    }

    #[test]
    fn test_truncate_statement_cascades_and_restarts_identity() {
        assert_eq!(
            truncate_statement(&table("public", "users")),
            r#"TRUNCATE "public"."users" RESTART IDENTITY CASCADE"#
        );
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(table("billing", "Invoice\"Lines").qualified(), r#""billing"."Invoice""Lines""#);
    }

    #[test]
    fn test_migrations_table_is_never_truncated() {
        let kept = tables_to_truncate(vec![
            table("public", "accounts"),
            table("public", "schema_migrations"),
            table("audit", "events"),
        ]);

        let names: Vec<&str> = kept.iter().map(|t| t.relname.as_str()).collect();
        assert_eq!(names, vec!["accounts", "events"]);
    }
}
