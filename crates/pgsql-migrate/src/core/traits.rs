//! Core traits for the collaborators the migration engine talks to.
//!
//! - [`MetadataSource`]: Reads catalog descriptors from the source database
//! - [`DdlExecutor`]: Executes statements against one engine
//!
//! Each migration run works over exactly one open connection per engine, so
//! both traits take `&mut self` and never hand out pooled connections.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::{
    ColumnDescriptor, ConstraintDescriptor, IdentityDescriptor, IndexDescriptor, ModuleDefinition,
    ModuleKind, SchemaDescriptor, StatisticsDescriptor,
};
use super::value::SqlValue;

/// Forward-only stream of rows produced by [`DdlExecutor::open_cursor`].
pub type RowStream<'a> = BoxStream<'a, Result<Vec<SqlValue>>>;

/// Read catalog metadata from a source database.
///
/// All methods are read-only. Results are returned in a stable order so the
/// renaming ledger is built deterministically.
#[async_trait]
pub trait MetadataSource: Send {
    /// List all user schemas.
    async fn list_schemas(&mut self) -> Result<Vec<SchemaDescriptor>>;

    /// Check whether a schema owns no tables.
    async fn is_schema_empty(&mut self, schema: &str) -> Result<bool>;

    /// List base table names of a schema.
    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>>;

    /// List columns of a table in ordinal order.
    async fn list_columns(&mut self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Load the primary key of a table, if any.
    async fn primary_key(&mut self, schema: &str, table: &str) -> Result<Option<ConstraintDescriptor>>;

    /// Load unique constraints of a table.
    async fn unique_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>>;

    /// Load foreign keys declared on a table.
    async fn foreign_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>>;

    /// Load default constraints bound to one column.
    async fn default_constraints(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Vec<ConstraintDescriptor>>;

    /// Load indexes of a single table.
    async fn indexes_per_table(&mut self, schema: &str, table: &str) -> Result<Vec<IndexDescriptor>>;

    /// Load all indexes of a schema, excluding those backing primary or unique keys.
    async fn indexes_per_schema(&mut self, schema: &str) -> Result<Vec<IndexDescriptor>>;

    /// Load statistics the engine created automatically.
    async fn auto_generated_statistics(&mut self, schema: &str) -> Result<Vec<StatisticsDescriptor>>;

    /// Load identity columns of a table.
    async fn identity_columns(&mut self, schema: &str, table: &str) -> Result<Vec<IdentityDescriptor>>;

    /// Load view, function, or procedure definitions of a schema.
    async fn module_definitions(&mut self, schema: &str, kind: ModuleKind) -> Result<Vec<ModuleDefinition>>;
}

/// Execute statements against one database engine.
#[async_trait]
pub trait DdlExecutor: Send {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a parameterized statement with positional parameters.
    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Execute a query and return the first column of the first row.
    ///
    /// Returns [`SqlValue::Null`] when the query yields no rows.
    async fn execute_scalar(&mut self, sql: &str) -> Result<SqlValue>;

    /// Open a forward-only cursor over the rows of a query.
    async fn open_cursor<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>>;

    /// Start a transaction.
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;
}
