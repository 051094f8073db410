//! In-memory source and target used by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pgsql_migrate::core::schema::{
    AbstractType, ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IdentityDescriptor,
    IndexDescriptor, ModuleDefinition, ModuleKind, SchemaDescriptor, StatisticsDescriptor,
};
use pgsql_migrate::core::{DdlExecutor, MetadataSource, RowStream, SqlValue};
use pgsql_migrate::{MigrateError, Result};

// =============================================================================
// Source
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<SqlValue>>,
    pub primary_key: Option<ConstraintDescriptor>,
    pub unique_keys: Vec<ConstraintDescriptor>,
    pub foreign_keys: Vec<ConstraintDescriptor>,
    pub defaults: Vec<ConstraintDescriptor>,
    pub identities: Vec<IdentityDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeSchema {
    pub name: String,
    pub tables: Vec<FakeTable>,
    pub indexes: Vec<IndexDescriptor>,
    pub statistics: Vec<StatisticsDescriptor>,
    pub modules: Vec<ModuleDefinition>,
}

/// Catalog and row data served from memory.
#[derive(Debug, Default)]
pub struct FakeSource {
    pub schemas: Vec<FakeSchema>,

    /// Queries passed to `open_cursor`, in order.
    pub cursors: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    pub fn new(schemas: Vec<FakeSchema>) -> Self {
        Self {
            schemas,
            cursors: Arc::default(),
        }
    }

    fn schema(&self, schema: &str) -> Option<&FakeSchema> {
        self.schemas.iter().find(|s| s.name == schema)
    }

    fn table(&self, schema: &str, table: &str) -> Option<&FakeTable> {
        self.schema(schema)?.tables.iter().find(|t| t.name == table)
    }

    /// The table a generated source query reads from.
    fn table_for_query(&self, sql: &str) -> Option<&FakeTable> {
        self.schemas.iter().find_map(|schema| {
            schema
                .tables
                .iter()
                .find(|t| sql.ends_with(&format!("FROM [{}].[{}]", schema.name, t.name)))
        })
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn list_schemas(&mut self) -> Result<Vec<SchemaDescriptor>> {
        Ok(self
            .schemas
            .iter()
            .map(|s| SchemaDescriptor {
                name: s.name.clone(),
                owner: Some("dbo".to_string()),
            })
            .collect())
    }

    async fn is_schema_empty(&mut self, schema: &str) -> Result<bool> {
        Ok(self
            .schema(schema)
            .map_or(true, |s| s.tables.is_empty() && s.modules.is_empty()))
    }

    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(schema)
            .map(|s| s.tables.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_columns(&mut self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table(schema, table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn primary_key(&mut self, schema: &str, table: &str) -> Result<Option<ConstraintDescriptor>> {
        Ok(self.table(schema, table).and_then(|t| t.primary_key.clone()))
    }

    async fn unique_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>> {
        Ok(self.table(schema, table).map(|t| t.unique_keys.clone()).unwrap_or_default())
    }

    async fn foreign_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>> {
        Ok(self.table(schema, table).map(|t| t.foreign_keys.clone()).unwrap_or_default())
    }

    async fn default_constraints(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Vec<ConstraintDescriptor>> {
        Ok(self
            .table(schema, table)
            .map(|t| {
                t.defaults
                    .iter()
                    .filter(|d| d.fields.first().map(String::as_str) == Some(column))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn indexes_per_table(&mut self, schema: &str, table: &str) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .schema(schema)
            .map(|s| s.indexes.iter().filter(|i| i.table_name == table).cloned().collect())
            .unwrap_or_default())
    }

    async fn indexes_per_schema(&mut self, schema: &str) -> Result<Vec<IndexDescriptor>> {
        Ok(self.schema(schema).map(|s| s.indexes.clone()).unwrap_or_default())
    }

    async fn auto_generated_statistics(&mut self, schema: &str) -> Result<Vec<StatisticsDescriptor>> {
        Ok(self.schema(schema).map(|s| s.statistics.clone()).unwrap_or_default())
    }

    async fn identity_columns(&mut self, schema: &str, table: &str) -> Result<Vec<IdentityDescriptor>> {
        Ok(self.table(schema, table).map(|t| t.identities.clone()).unwrap_or_default())
    }

    async fn module_definitions(&mut self, schema: &str, kind: ModuleKind) -> Result<Vec<ModuleDefinition>> {
        Ok(self
            .schema(schema)
            .map(|s| s.modules.iter().filter(|m| m.kind == kind).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DdlExecutor for FakeSource {
    async fn execute(&mut self, _sql: &str) -> Result<u64> {
        Ok(0)
    }

    async fn execute_params(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
        Ok(0)
    }

    async fn execute_scalar(&mut self, sql: &str) -> Result<SqlValue> {
        Ok(self
            .table_for_query(sql)
            .map_or(SqlValue::Null, |t| SqlValue::I64(t.rows.len() as i64)))
    }

    async fn open_cursor<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>> {
        self.cursors.lock().unwrap().push(sql.to_string());
        let rows = self.table_for_query(sql).map(|t| t.rows.clone()).unwrap_or_default();
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake-mssql"
    }
}

/// A source serving `count` generated single-column rows.
pub struct GeneratedRows {
    pub count: u64,
}

#[async_trait]
impl DdlExecutor for GeneratedRows {
    async fn execute(&mut self, _sql: &str) -> Result<u64> {
        Ok(0)
    }

    async fn execute_params(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
        Ok(0)
    }

    async fn execute_scalar(&mut self, _sql: &str) -> Result<SqlValue> {
        Ok(SqlValue::I64(self.count as i64))
    }

    async fn open_cursor<'a>(&'a mut self, _sql: &'a str) -> Result<RowStream<'a>> {
        Ok(stream::iter(0..self.count)
            .map(|i| Ok(vec![SqlValue::I64(i as i64 + 1)]))
            .boxed())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "generated"
    }
}

// =============================================================================
// Target
// =============================================================================

/// Everything a [`FakeTarget`] was asked to do.
#[derive(Debug, Default)]
pub struct TargetLog {
    /// Statements passed to `execute`, in order.
    pub statements: Vec<String>,

    /// Inserted rows whose transaction was committed, with their statement.
    pub committed: Vec<(String, Vec<SqlValue>)>,

    /// Inserted rows of the open transaction.
    pub pending: Vec<(String, Vec<SqlValue>)>,

    pub begins: u64,
    pub commits: u64,
    pub inserts: u64,
}

impl TargetLog {
    pub fn committed_rows(&self) -> Vec<Vec<SqlValue>> {
        self.committed.iter().map(|(_, row)| row.clone()).collect()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.statements.iter().position(|s| s.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.statements.iter().filter(|s| s.starts_with(prefix)).count()
    }
}

/// Records statements and emulates transactions.
///
/// Rows inserted after the last commit are never committed, as if the
/// connection dropped when the run failed.
#[derive(Debug, Clone, Default)]
pub struct FakeTarget {
    pub log: Arc<Mutex<TargetLog>>,

    /// Fail the n-th insert (1-based).
    pub fail_on_insert: Option<u64>,

    /// Fail every statement containing this text.
    pub fail_statements_containing: Option<String>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DdlExecutor for FakeTarget {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        if let Some(needle) = &self.fail_statements_containing {
            if sql.contains(needle.as_str()) {
                return Err(MigrateError::execution(sql, "syntax error at or near \"[\""));
            }
        }
        self.log.lock().unwrap().statements.push(sql.to_string());
        Ok(0)
    }

    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut log = self.log.lock().unwrap();
        log.inserts += 1;
        if self.fail_on_insert == Some(log.inserts) {
            return Err(MigrateError::execution(sql, "duplicate key value violates unique constraint"));
        }
        log.pending.push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    async fn execute_scalar(&mut self, _sql: &str) -> Result<SqlValue> {
        Ok(SqlValue::Null)
    }

    async fn open_cursor<'a>(&'a mut self, _sql: &'a str) -> Result<RowStream<'a>> {
        Ok(stream::empty::<Result<Vec<SqlValue>>>().boxed())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.log.lock().unwrap().begins += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        let pending = std::mem::take(&mut log.pending);
        log.committed.extend(pending);
        log.commits += 1;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake-postgres"
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn column(name: &str, abstract_type: AbstractType, type_name: &str, size: Option<u32>) -> ColumnDescriptor {
    let mut column = ColumnDescriptor::new(name, abstract_type, type_name);
    column.size = size;
    column
}

pub fn constraint(schema: &str, table: &str, name: &str, kind: ConstraintKind, fields: &[&str]) -> ConstraintDescriptor {
    let mut constraint = ConstraintDescriptor::new(schema, table, name, kind);
    constraint.fields = fields.iter().map(|f| f.to_string()).collect();
    constraint
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}
