//! dbtest command line
//!
//! Provisions and inspects test databases outside of a test run.
//!
//! # Usage
//!
//! ```bash
//! # Drop, recreate, migrate and reset iam_test
//! cargo run -p dbtest-cli -- prepare iam --migrations ./migrations
//!
//! # Show migration status as JSON
//! DBTEST_SUFFIX=_ci cargo run -p dbtest-cli -- status iam --json
//! ```
//!
//! # Environment Variables
//!
//! - `DBTEST_USERNAME`: user for the root connection (default: postgres)
//! - `DBTEST_PASSWORD`: password for the root connection (default: postgres)
//! - `DBTEST_ROOT_DATABASE`: database used to issue CREATE/DROP (default: postgres)
//! - `DBTEST_SUFFIX`: appended to logical names (default: _test)
//! - `RUST_LOG`: log filter (default: dbtest=info)

mod commands;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("dbtest=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = commands::parse(&args)?;

    commands::run(command).await
}
