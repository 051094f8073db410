//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::NamingPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MSSQL).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never written back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never written back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// SSL mode: disable, require, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// How source identifiers become target identifiers (default: canonicalizing).
    #[serde(default)]
    pub naming_policy: NamingPolicy,

    /// Tables whose structure is migrated but whose rows are not, as `schema.table`.
    /// Matched case-insensitively against source names.
    #[serde(default)]
    pub skip_data_for_tables: Vec<String>,

    /// Migrate structure only; copy no rows at all.
    #[serde(default)]
    pub schema_only: bool,

    /// Emit `citext` for every character column.
    #[serde(default)]
    pub use_citext: bool,

    /// Skip a view, function or procedure that fails to rewrite or execute
    /// instead of aborting the run (default: true).
    #[serde(default = "default_true")]
    pub skip_failed_modules: bool,

    /// Per-statement timeout in seconds (default: 600).
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            naming_policy: NamingPolicy::default(),
            skip_data_for_tables: Vec::new(),
            schema_only: false,
            use_citext: false,
            skip_failed_modules: true,
            statement_timeout_secs: default_statement_timeout(),
        }
    }
}

impl MigrationConfig {
    /// Whether the rows of `schema.table` should be copied.
    pub fn copies_data_for(&self, schema: &str, table: &str) -> bool {
        if self.schema_only {
            return false;
        }
        !self.skip_data_for_tables.iter().any(|entry| {
            entry
                .split_once('.')
                .is_some_and(|(s, t)| s.eq_ignore_ascii_case(schema) && t.eq_ignore_ascii_case(table))
        })
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_pg_port() -> u16 {
    5432
}

fn default_true() -> bool {
    true
}

fn default_require() -> String {
    "require".to_string()
}

fn default_statement_timeout() -> u64 {
    600
}
