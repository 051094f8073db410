//! Configuration validation.

use super::{Config, MigrationConfig};
use crate::drivers::tls::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let source = &config.source;
    let target = &config.target;

    require_endpoint("source", &source.host, &source.database, &source.user)?;
    require_endpoint("target", &target.host, &target.database, &target.user)?;
    SslMode::parse(&target.ssl_mode)?;

    if source.host.eq_ignore_ascii_case(&target.host)
        && source.port == target.port
        && source.database == target.database
    {
        return Err(MigrateError::Config(format!(
            "source and target both point at {}:{}/{}",
            target.host, target.port, target.database
        )));
    }

    validate_migration(&config.migration)
}

fn require_endpoint(section: &str, host: &str, database: &str, user: &str) -> Result<()> {
    for (field, value) in [("host", host), ("database", database), ("user", user)] {
        if value.trim().is_empty() {
            return Err(MigrateError::Config(format!("{}.{} is required", section, field)));
        }
    }
    Ok(())
}

fn validate_migration(migration: &MigrationConfig) -> Result<()> {
    if let Some(entry) = migration
        .skip_data_for_tables
        .iter()
        .find(|entry| parse_table_entry(entry).is_none())
    {
        return Err(MigrateError::Config(format!(
            "migration.skip_data_for_tables: expected 'schema.table', got '{}'",
            entry
        )));
    }

    if migration.statement_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.statement_timeout_secs must be positive".into(),
        ));
    }

    Ok(())
}

/// Split a `schema.table` entry; both parts must be present and the table unqualified.
fn parse_table_entry(entry: &str) -> Option<(&str, &str)> {
    let (schema, table) = entry.split_once('.')?;
    if schema.is_empty() || table.is_empty() || table.contains('.') {
        return None;
    }
    Some((schema, table))
}
