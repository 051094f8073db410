//! Database drivers.
//!
//! - [`mssql`]: SQL Server metadata source and executor over tiberius
//! - [`postgres`]: PostgreSQL executor over tokio-postgres
//! - [`tls`]: rustls setup for the PostgreSQL connection
//!
//! Each driver owns exactly one connection. Every statement is bounded by the
//! per-statement timeout given at connect time.

pub mod mssql;
pub mod postgres;
pub mod tls;

pub use mssql::MssqlSource;
pub use postgres::PostgresTarget;
pub use tls::SslMode;

use std::future::Future;
use std::time::Duration;

use crate::error::{MigrateError, Result};

/// Longest statement prefix kept in timeout errors.
const STATEMENT_PREVIEW_CHARS: usize = 200;

/// Run `fut`, failing with [`MigrateError::Timeout`] once `timeout` elapses.
pub(crate) async fn with_timeout<T, F>(timeout: Duration, statement: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(MigrateError::Timeout {
            statement: preview(statement),
            seconds: timeout.as_secs(),
        }),
    }
}

/// First characters of a statement, for error messages.
pub(crate) fn preview(statement: &str) -> String {
    let trimmed = statement.trim();
    match trimmed.char_indices().nth(STATEMENT_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
