//! Connection factory.
//!
//! Connections always target the local default endpoint with TLS disabled.

use std::fmt;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgConnection, PgPool};
use tracing::debug;

use crate::error::{ProvisionError, ProvisionResult};

pub const HOST: &str = "127.0.0.1";
pub const PORT: u16 = 5432;

const MAX_POOL_CONNECTIONS: u32 = 5;

/// User, password and database of a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl ConnectionParams {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            dbname: dbname.into(),
        }
    }

    /// sqlx connect options for these parameters.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(HOST)
            .port(PORT)
            .ssl_mode(PgSslMode::Disable)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
    }

    fn connection_error(&self, source: sqlx::Error) -> ProvisionError {
        ProvisionError::Connection {
            database: self.dbname.clone(),
            source,
        }
    }
}

// Password is redacted so params can be logged.
impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} port={} sslmode=disable user={} password=*** dbname={}",
            HOST, PORT, self.user, self.dbname
        )
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Open a connection pool. No retry.
pub async fn open(params: &ConnectionParams) -> ProvisionResult<PgPool> {
    debug!(params = %params, "Opening connection pool");

    PgPoolOptions::new()
        .max_connections(MAX_POOL_CONNECTIONS)
        .connect_with(params.connect_options())
        .await
        .map_err(|e| params.connection_error(e))
}

/// Open a single session. Used for the root connection.
pub async fn open_single(params: &ConnectionParams) -> ProvisionResult<PgConnection> {
    debug!(params = %params, "Opening connection");

    PgConnection::connect_with(&params.connect_options())
        .await
        .map_err(|e| params.connection_error(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_redacts_password() {
        let params = ConnectionParams::new("postgres", "hunter2", "iam_test");

        let shown = params.to_string();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("dbname=iam_test"));
        assert!(!format!("{:?}", params).contains("hunter2"));
    }

    #[test]
    fn test_connect_options_use_fixed_endpoint() {
        let options = ConnectionParams::new("app", "pw", "orders_test").connect_options();

        assert_eq!(options.get_host(), HOST);
        assert_eq!(options.get_port(), PORT);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("orders_test"));
    }
}
