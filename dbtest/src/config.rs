//! Provisioning configuration.
//!
//! Loads configuration from environment variables with fixed defaults.
//! The network endpoint is not configurable, see [`crate::connection`].

use std::env;

use crate::connection::ConnectionParams;
use crate::error::{ProvisionError, ProvisionResult};

pub const DEFAULT_USERNAME: &str = "postgres";
pub const DEFAULT_PASSWORD: &str = "postgres";
pub const DEFAULT_ROOT_DATABASE: &str = "postgres";
pub const DEFAULT_SUFFIX: &str = "_test";

/// Root credentials, root database and name suffix used for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// User for the root connection
    pub username: String,
    /// Password for the root connection
    pub password: String,
    /// Pre-existing database used only to issue CREATE/DROP DATABASE
    pub root_database: String,
    /// Appended to every logical name, e.g. `iam` + `_test` = `iam_test`.
    /// Empty means logical names are used as-is.
    pub suffix: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            root_database: DEFAULT_ROOT_DATABASE.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from environment variables.
    ///
    /// - `DBTEST_USERNAME`, root connection only (default: postgres)
    /// - `DBTEST_PASSWORD`, root connection only (default: postgres)
    /// - `DBTEST_ROOT_DATABASE` (default: postgres)
    /// - `DBTEST_SUFFIX` (default: _test, may be set to empty)
    pub fn from_env() -> ProvisionResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProvisionResult<Self> {
        let defaults = Self::default();

        let config = Self {
            username: lookup("DBTEST_USERNAME").unwrap_or(defaults.username),
            password: lookup("DBTEST_PASSWORD").unwrap_or(defaults.password),
            root_database: lookup("DBTEST_ROOT_DATABASE").unwrap_or(defaults.root_database),
            suffix: lookup("DBTEST_SUFFIX").unwrap_or(defaults.suffix),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a connection.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.username.trim().is_empty() {
            return Err(ProvisionError::Config("username must not be empty".to_string()));
        }
        if self.root_database.trim().is_empty() {
            return Err(ProvisionError::Config("root database must not be empty".to_string()));
        }
        Ok(())
    }

    /// Physical database name for a logical name.
    pub fn physical_name(&self, logical: &str) -> String {
        format!("{}{}", logical, self.suffix)
    }

    /// Parameters for the root (administrative) connection.
    pub fn root_params(&self) -> ConnectionParams {
        ConnectionParams::new(&self.username, &self.password, &self.root_database)
    }

    /// Parameters for a connection to `database`.
    ///
    /// Always the default `postgres`/`postgres` credentials: only the root
    /// connection uses the configured ones.
    pub fn database_params(&self, database: &str) -> ConnectionParams {
        ConnectionParams::new(DEFAULT_USERNAME, DEFAULT_PASSWORD, database)
    }
}

// =============================================================================
// Tests
// =============================================================================
