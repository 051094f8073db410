//! Migration orchestrator - main workflow coordinator.
//!
//! [`Migrator`] walks the source catalog one schema and one table at a time,
//! translates every object through the renaming and type engines, runs the
//! generated DDL on the target and copies table data with the
//! [`TransferEngine`]. Every renaming event is folded into one [`Ledger`],
//! which the module rewriter reads at the end of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::schema::{ColumnDescriptor, IndexDescriptor, ModuleDefinition, ModuleKind};
use crate::core::traits::{DdlExecutor, MetadataSource};
use crate::ddl::{self, ColumnDefinition};
use crate::drivers::{MssqlSource, PostgresTarget};
use crate::error::{MigrateError, Result};
use crate::naming::{resolve_index_collisions, Ledger, RenamingRecord, Renamer};
use crate::rewrite;
use crate::transfer::{ProgressSample, TransferEngine, TransferJob};
use crate::typemap::{postgres_type_map, TypeMap};

/// Migration driver over one source and one target connection.
pub struct Migrator<S, T> {
    config: MigrationConfig,
    source: S,
    target: T,
    renamer: Renamer,
    type_map: TypeMap,
    transfer: TransferEngine,
    ledger: Ledger,
}

/// Rows copied for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Translated schema name.
    pub schema: String,

    /// Translated table name.
    pub table: String,

    /// Rows copied; `None` when data was skipped for this table.
    pub rows: Option<u64>,
}

/// A view, function or procedure that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedModule {
    /// Source schema name.
    pub schema: String,
    pub name: String,
    pub kind: ModuleKind,
    pub reason: String,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Translated names of the schemas created on the target.
    pub schemas: Vec<String>,

    pub tables: Vec<TableReport>,

    pub skipped_modules: Vec<SkippedModule>,

    /// Every name translation of the run, sorted by schema, kind and old name.
    pub renamings: Vec<RenamingRecord>,
}

impl MigrationReport {
    /// Total rows copied across all tables.
    pub fn rows_transferred(&self) -> u64 {
        self.tables.iter().filter_map(|t| t.rows).sum()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A source schema and the name it was created under on the target.
struct MigratedSchema {
    source: String,
    target: String,
}

impl Migrator<MssqlSource, PostgresTarget> {
    /// Validate `config` and open one connection to each database.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let timeout = config.migration.statement_timeout();

        let source = MssqlSource::connect(&config.source, timeout).await?;
        let target = PostgresTarget::connect(&config.target, timeout).await?;

        Ok(Self::new(config.migration, source, target))
    }
}

impl<S, T> Migrator<S, T>
where
    S: MetadataSource + DdlExecutor,
    T: DdlExecutor,
{
    /// Create a migrator over already-open connections.
    pub fn new(config: MigrationConfig, source: S, target: T) -> Self {
        Self {
            renamer: Renamer::new(config.naming_policy),
            type_map: postgres_type_map(config.use_citext),
            transfer: TransferEngine::new(),
            ledger: Ledger::new(),
            config,
            source,
            target,
        }
    }

    /// Send a [`ProgressSample`] to `tx` at every batch commit.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ProgressSample>) -> Self {
        self.transfer = TransferEngine::new().with_progress(tx);
        self
    }

    /// Run the migration.
    ///
    /// Any error aborts the run, except module failures when
    /// `skip_failed_modules` is set. Nothing is rolled back: objects and
    /// committed batches created before the failure stay on the target.
    pub async fn run(mut self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        info!(
            "Starting migration ({:?} naming, schema_only={})",
            self.config.naming_policy, self.config.schema_only
        );

        info!("Phase 1: Schemas, tables and data");
        let mut schemas = Vec::new();
        let mut tables = Vec::new();
        let mut foreign_keys = Vec::new();

        for schema in self.source.list_schemas().await? {
            if self.source.is_schema_empty(&schema.name).await? {
                debug!("Schema {} is empty, skipping", schema.name);
                continue;
            }

            let target_schema = self
                .renamer
                .translate_schema(&schema.name)?
                .record_into(&mut self.ledger)?;
            info!("Schema {} -> {}", schema.name, target_schema);
            self.target.execute(&ddl::create_schema(&target_schema)?).await?;

            for table in self.source.list_tables(&schema.name).await? {
                tables.push(self.migrate_table(&schema.name, &target_schema, &table).await?);
                foreign_keys.extend(self.source.foreign_keys(&schema.name, &table).await?);
            }

            self.migrate_indexes(&schema.name).await?;
            schemas.push(MigratedSchema {
                source: schema.name,
                target: target_schema,
            });
        }

        info!("Phase 2: Creating {} foreign keys", foreign_keys.len());
        for fk in &foreign_keys {
            let translated = self.renamer.translate_constraint(fk)?.record_into(&mut self.ledger)?;
            self.target.execute(&ddl::add_foreign_key(&translated)?).await?;
        }

        info!("Phase 3: Views, functions and procedures");
        let skipped_modules = self.migrate_modules(&schemas).await?;

        let completed_at = Utc::now();
        let report = MigrationReport {
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            schemas: schemas.into_iter().map(|s| s.target).collect(),
            tables,
            skipped_modules,
            renamings: self.ledger.to_records(),
        };

        info!(
            "Migration complete: {} tables, {} rows, {} renamings, {} modules skipped",
            report.tables.len(),
            report.rows_transferred(),
            report.renamings.len(),
            report.skipped_modules.len()
        );
        Ok(report)
    }

    /// Recreate one table, copy its rows and add its table-level constraints.
    async fn migrate_table(&mut self, schema: &str, target_schema: &str, table: &str) -> Result<TableReport> {
        let columns = self.source.list_columns(schema, table).await?;
        let target_table = self
            .renamer
            .translate_table(schema, table)?
            .record_into(&mut self.ledger)?;

        let mut definitions = Vec::with_capacity(columns.len());
        for column in &columns {
            definitions.push(self.column_definition(schema, table, column)?);
        }

        self.target.execute(&ddl::drop_table(target_schema, &target_table)?).await?;
        self.target
            .execute(&ddl::create_table(target_schema, &target_table, &definitions)?)
            .await?;
        debug!("{}.{}: created with {} columns", target_schema, target_table, definitions.len());

        let rows = if self.config.copies_data_for(schema, table) {
            Some(
                self.copy_rows(schema, table, target_schema, &target_table, &columns, &definitions)
                    .await?,
            )
        } else {
            info!("{}.{}: skipping data", schema, table);
            None
        };

        if let Some(pk) = self.source.primary_key(schema, table).await? {
            let pk = self.renamer.translate_constraint(&pk)?.record_into(&mut self.ledger)?;
            self.target.execute(&ddl::add_primary_key(&pk)?).await?;
        }

        for uq in self.source.unique_keys(schema, table).await? {
            let uq = self.renamer.translate_constraint(&uq)?.record_into(&mut self.ledger)?;
            self.target.execute(&ddl::add_unique_key(&uq)?).await?;
        }

        for (column, definition) in columns.iter().zip(&definitions) {
            for default in self.source.default_constraints(schema, table, &column.name).await? {
                let default = self.renamer.translate_constraint(&default)?.record_into(&mut self.ledger)?;
                let expression =
                    ddl::translate_default(default.definition.as_deref().unwrap_or_default(), default.value_type)
                        .map_err(|e| MigrateError::column(schema, table, &column.name, e))?;
                self.target
                    .execute(&ddl::set_default(target_schema, &target_table, &definition.name, &expression)?)
                    .await?;
            }
        }

        for identity in self.source.identity_columns(schema, table).await? {
            let identity = self.renamer.translate_identity(&identity)?.record_into(&mut self.ledger)?;
            self.target.execute(&ddl::add_identity(&identity)?).await?;
        }

        Ok(TableReport {
            schema: target_schema.to_string(),
            table: target_table,
            rows,
        })
    }

    fn column_definition(&mut self, schema: &str, table: &str, column: &ColumnDescriptor) -> Result<ColumnDefinition> {
        let name = self
            .renamer
            .translate_column(schema, &column.name)?
            .record_into(&mut self.ledger)?;
        let type_literal = ddl::column_type(&self.type_map, column)
            .map_err(|e| MigrateError::column(schema, table, &column.name, e))?;

        Ok(ColumnDefinition {
            name,
            type_literal,
            is_nullable: column.is_nullable,
        })
    }

    async fn copy_rows(
        &mut self,
        schema: &str,
        table: &str,
        target_schema: &str,
        target_table: &str,
        columns: &[ColumnDescriptor],
        definitions: &[ColumnDefinition],
    ) -> Result<u64> {
        let estimated_rows = self
            .source
            .execute_scalar(&ddl::count_rows(schema, table)?)
            .await?
            .as_i64()
            .unwrap_or(0)
            .max(0) as u64;

        let source_columns: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let job = TransferJob {
            table: format!("{}.{}", target_schema, target_table),
            source_query: ddl::select_rows(schema, table, &source_columns)?,
            insert_statement: ddl::insert_row(target_schema, target_table, definitions)?,
            columns: definitions.iter().map(|d| d.name.clone()).collect(),
            estimated_rows,
        };

        let stats = self.transfer.copy(&mut self.source, &mut self.target, &job).await?;
        Ok(stats.rows)
    }

    /// Create every index and auto-created statistic of a schema.
    ///
    /// Names are translated as one batch so that names colliding at schema
    /// scope can be suffixed.
    async fn migrate_indexes(&mut self, schema: &str) -> Result<()> {
        let mut batch = self.source.indexes_per_schema(schema).await?;
        batch.extend(
            self.source
                .auto_generated_statistics(schema)
                .await?
                .into_iter()
                .map(IndexDescriptor::from),
        );

        let mut translated = Vec::with_capacity(batch.len());
        for index in &batch {
            translated.push(self.renamer.translate_index(index)?.record_into(&mut self.ledger)?);
        }

        let indexes = resolve_index_collisions(translated);
        info!("Schema {}: creating {} indexes", schema, indexes.len());
        for index in &indexes {
            self.target.execute(&ddl::create_index(index)?).await?;
        }
        Ok(())
    }

    async fn migrate_modules(&mut self, schemas: &[MigratedSchema]) -> Result<Vec<SkippedModule>> {
        let reserved: Vec<String> = schemas.iter().map(|s| s.target.clone()).collect();
        let mut skipped = Vec::new();

        for schema in schemas {
            for kind in ModuleKind::ALL {
                for module in self.source.module_definitions(&schema.source, kind).await? {
                    match self.migrate_module(&schema.target, &module, &reserved).await {
                        Ok(()) => debug!("{:?} {}.{} migrated", kind, module.schema, module.name),
                        Err(e) if self.config.skip_failed_modules && is_skippable(&e) => {
                            warn!("Skipping {:?} {}.{}: {}", kind, module.schema, module.name, e);
                            debug!("{}", e.format_detailed());
                            skipped.push(SkippedModule {
                                schema: module.schema,
                                name: module.name,
                                kind,
                                reason: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(skipped)
    }

    async fn migrate_module(&mut self, target_schema: &str, module: &ModuleDefinition, reserved: &[String]) -> Result<()> {
        let name = self
            .renamer
            .translate(&module.schema, module.kind.object_kind(), &module.name)?
            .record_into(&mut self.ledger)?;

        if module.kind == ModuleKind::View {
            self.target.execute(&ddl::drop_view(target_schema, &name)?).await?;
        }

        let definition = rewrite::rewrite(&module.definition, &self.ledger, reserved)?;
        self.target.execute(&definition).await?;
        Ok(())
    }

    /// The renaming ledger built so far.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// Ambiguous mappings abort the run even when failed modules are skipped.
fn is_skippable(err: &MigrateError) -> bool {
    !matches!(err, MigrateError::AmbiguousMapping { .. })
}
