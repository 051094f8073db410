//! # pgsql-migrate
//!
//! Schema translation and data migration from Microsoft SQL Server to
//! PostgreSQL.
//!
//! A run recreates every non-empty source schema on the target:
//!
//! - **Renaming**: identifiers are translated under a naming policy, and every
//!   translation is recorded in a ledger that rejects ambiguous mappings
//! - **Type mapping**: column types resolve through size-bounded templates
//! - **Module rewriting**: view, function and procedure bodies are relexed and
//!   their identifiers replaced with the translated names
//! - **Batched transfer**: rows stream from a source cursor into parameterized
//!   inserts committed in batches of roughly 1% of the table
//!
//! ## Example
//!
//! ```rust,no_run
//! use pgsql_migrate::{Config, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pgsql_migrate::MigrateError> {
//!     let config = Config::load("config.yaml")?;
//!     let migrator = Migrator::connect(config).await?;
//!     let report = migrator.run().await?;
//!     println!("Migrated {} rows", report.rows_transferred());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod rewrite;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{DdlExecutor, MetadataSource, ObjectKind, SqlValue};
pub use drivers::{MssqlSource, PostgresTarget, SslMode};
pub use error::{MigrateError, Result};
pub use naming::{Ledger, NamingPolicy, RenamingRecord, Renamer};
pub use orchestrator::{MigrationReport, Migrator, SkippedModule, TableReport};
pub use transfer::{ProgressSample, TransferEngine, TransferJob, TransferStats};
pub use typemap::TypeMap;
