//! Microsoft SQL Server driver.
//!
//! [`MssqlSource`] reads catalog metadata from `sys.*` and
//! `INFORMATION_SCHEMA` views and streams table rows through a forward-only
//! result set. It also implements [`DdlExecutor`] so the transfer engine can
//! open cursors on it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::{StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::with_timeout;
use crate::config::SourceConfig;
use crate::core::schema::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IdentityDescriptor, IndexDescriptor,
    ModuleDefinition, ModuleKind, SchemaDescriptor, StatisticsDescriptor,
};
use crate::core::traits::{DdlExecutor, MetadataSource, RowStream};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};
use crate::typemap::{sql_server_type_map, TypeMap};

/// SQL Server source connection.
pub struct MssqlSource {
    client: Client<Compat<TcpStream>>,
    type_map: TypeMap,
    timeout: Duration,
}

fn build_config(config: &SourceConfig) -> Config {
    let mut tds = Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));

    if config.encrypt {
        if config.trust_server_cert {
            tds.trust_cert();
        }
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::NotSupported);
    }
    tds
}

impl MssqlSource {
    /// Connect to SQL Server.
    pub async fn connect(config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let tds = build_config(config);
        let addr = tds.get_addr();

        let client = with_timeout(timeout, "connect", async {
            let tcp = TcpStream::connect(&addr).await?;
            tcp.set_nodelay(true)?;
            Ok(Client::connect(tds, tcp.compat_write()).await?)
        })
        .await?;

        info!(
            "Connected to MSSQL: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self::from_client(client, timeout))
    }

    /// Wrap an already-open client.
    pub fn from_client(client: Client<Compat<TcpStream>>, timeout: Duration) -> Self {
        Self {
            client,
            type_map: sql_server_type_map(),
            timeout,
        }
    }

    /// Run a catalog query with string parameters bound as `@P1`, `@P2`, ...
    async fn query(&mut self, sql: &str, params: &[Option<&str>]) -> Result<Vec<Row>> {
        let mut query = Query::new(sql);
        for param in params {
            query.bind(*param);
        }

        let client = &mut self.client;
        with_timeout(self.timeout, sql, async move {
            let stream = query.query(client).await?;
            Ok(stream.into_first_result().await?)
        })
        .await
    }

    fn column(&self, row: &Row) -> Result<ColumnDescriptor> {
        let name = get_string(row, 0)?;
        let data_type = get_string(row, 2)?;
        let precision = row.try_get::<i32, _>(3)?;
        let scale = row.try_get::<i32, _>(4)?;
        let max_length = row.try_get::<i32, _>(5)?;

        // -1 marks (MAX) columns
        let size = match max_length {
            Some(len) if len < 0 => None,
            Some(len) => Some(len as u32),
            None => precision.map(|p| p as u32),
        };

        Ok(ColumnDescriptor {
            name,
            is_nullable: get_string(row, 1)?.eq_ignore_ascii_case("yes"),
            abstract_type: self.type_map.classify(&data_type),
            dialect_type_name: data_type,
            size,
            precision: scale.map(|s| s as u32),
            is_user_defined_type: row.try_get::<i32, _>(6)?.unwrap_or(0) == 1,
        })
    }

    async fn load_key_constraints(
        &mut self,
        schema: &str,
        table: &str,
        kind: ConstraintKind,
    ) -> Result<Vec<ConstraintDescriptor>> {
        let type_code = match kind {
            ConstraintKind::PrimaryKey => "PK",
            _ => "UQ",
        };
        let rows = self
            .query(KEY_CONSTRAINTS_QUERY, &[Some(schema), Some(table), Some(type_code)])
            .await?;

        let mut constraints: Vec<ConstraintDescriptor> = Vec::new();
        for row in rows {
            let name = get_string(&row, 0)?;
            let column = get_string(&row, 1)?;
            match constraints.last_mut() {
                Some(last) if last.constraint_name == name => last.fields.push(column),
                _ => {
                    let mut constraint = ConstraintDescriptor::new(schema, table, name, kind);
                    constraint.fields.push(column);
                    constraints.push(constraint);
                }
            }
        }
        Ok(constraints)
    }

    async fn load_indexes(&mut self, schema: &str, table: Option<&str>) -> Result<Vec<IndexDescriptor>> {
        let rows = self.query(INDEXES_QUERY, &[Some(schema), table]).await?;

        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        for row in rows {
            let table_name = get_string(&row, 0)?;
            let index_name = get_string(&row, 1)?;
            let is_unique = row.try_get::<bool, _>(2)?.unwrap_or(false);
            let column = get_string(&row, 3)?;
            let is_included = row.try_get::<bool, _>(4)?.unwrap_or(false);

            let continues = matches!(
                indexes.last(),
                Some(last) if last.table_name == table_name && last.index_name == index_name
            );
            if !continues {
                indexes.push(IndexDescriptor {
                    schema: schema.to_string(),
                    table_name,
                    index_name,
                    key_columns: Vec::new(),
                    included_columns: Vec::new(),
                    is_unique,
                });
            }
            let Some(index) = indexes.last_mut() else {
                continue;
            };
            if is_included {
                index.included_columns.push(column);
            } else {
                index.key_columns.push(column);
            }
        }
        Ok(indexes)
    }
}

const SCHEMAS_QUERY: &str = r#"
    SELECT s.name, p.name
    FROM sys.schemas s
    LEFT JOIN sys.database_principals p ON p.principal_id = s.principal_id
    WHERE s.name NOT IN ('sys', 'INFORMATION_SCHEMA')
    ORDER BY s.name
"#;

const SCHEMA_OBJECT_COUNT_QUERY: &str = r#"
    SELECT COUNT(*)
    FROM sys.objects o
    JOIN sys.schemas s ON s.schema_id = o.schema_id
    WHERE s.name = @P1 AND o.is_ms_shipped = 0
"#;

const TABLES_QUERY: &str = r#"
    SELECT t.name
    FROM sys.tables t
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    WHERE s.name = @P1 AND t.is_ms_shipped = 0
    ORDER BY t.name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        COLUMN_NAME,
        IS_NULLABLE,
        DATA_TYPE,
        CAST(NUMERIC_PRECISION AS INT),
        CAST(NUMERIC_SCALE AS INT),
        CHARACTER_MAXIMUM_LENGTH,
        CASE WHEN DOMAIN_NAME IS NULL THEN 0 ELSE 1 END
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
    ORDER BY ORDINAL_POSITION
"#;

const KEY_CONSTRAINTS_QUERY: &str = r#"
    SELECT kc.name, c.name
    FROM sys.key_constraints kc
    JOIN sys.tables t ON t.object_id = kc.parent_object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.index_columns ic ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id
    JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE s.name = @P1 AND t.name = @P2 AND kc.type = @P3
    ORDER BY kc.name, ic.key_ordinal
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        fk.name,
        pc.name,
        rs.name,
        rt.name,
        rc.name,
        fk.delete_referential_action_desc,
        fk.update_referential_action_desc
    FROM sys.foreign_keys fk
    JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
    JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
    JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
    JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
    JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
    JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
    JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
    WHERE ps.name = @P1 AND pt.name = @P2
    ORDER BY fk.name, fkc.constraint_column_id
"#;

const DEFAULTS_QUERY: &str = r#"
    SELECT d.name, d.definition, TYPE_NAME(c.system_type_id)
    FROM sys.default_constraints d
    JOIN sys.tables t ON t.object_id = d.parent_object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.columns c ON c.object_id = t.object_id AND c.column_id = d.parent_column_id
    WHERE s.name = @P1 AND t.name = @P2 AND c.name = @P3
    ORDER BY d.name
"#;

// Without @P2 every table of the schema is listed.
const INDEXES_QUERY: &str = r#"
    SELECT t.name, i.name, i.is_unique, c.name, ic.is_included_column
    FROM sys.indexes i
    JOIN sys.tables t ON t.object_id = i.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
    JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE s.name = @P1
      AND (@P2 IS NULL OR t.name = @P2)
      AND i.is_primary_key = 0
      AND i.is_unique_constraint = 0
      AND i.is_hypothetical = 0
      AND i.type > 0
    ORDER BY t.name, i.name, ic.is_included_column, ic.key_ordinal, ic.index_column_id
"#;

const STATISTICS_QUERY: &str = r#"
    SELECT t.name, st.name, c.name
    FROM sys.stats st
    JOIN sys.tables t ON t.object_id = st.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.stats_columns sc ON sc.object_id = st.object_id AND sc.stats_id = st.stats_id
    JOIN sys.columns c ON c.object_id = sc.object_id AND c.column_id = sc.column_id
    WHERE s.name = @P1 AND st.auto_created = 1
    ORDER BY t.name, st.name, sc.stats_column_id
"#;

const IDENTITY_QUERY: &str = r#"
    SELECT
        c.name,
        CAST(c.seed_value AS BIGINT),
        CAST(c.increment_value AS BIGINT),
        CAST(c.last_value AS BIGINT)
    FROM sys.identity_columns c
    JOIN sys.tables t ON t.object_id = c.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    WHERE s.name = @P1 AND t.name = @P2
    ORDER BY c.column_id
"#;

const MODULES_QUERY: &str = r#"
    SELECT o.name, m.definition
    FROM sys.sql_modules m
    JOIN sys.objects o ON o.object_id = m.object_id
    JOIN sys.schemas s ON s.schema_id = o.schema_id
    WHERE s.name = @P1 AND o.type = @P2 AND o.is_ms_shipped = 0
    ORDER BY o.name
"#;

fn module_type_code(kind: ModuleKind) -> &'static str {
    match kind {
        ModuleKind::View => "V",
        ModuleKind::ScalarFunction => "FN",
        ModuleKind::TableFunction => "TF",
        ModuleKind::InlineTableFunction => "IF",
        ModuleKind::StoredProcedure => "P",
    }
}

fn get_string(row: &Row, idx: usize) -> Result<String> {
    Ok(row.try_get::<&str, _>(idx)?.unwrap_or_default().to_string())
}

#[async_trait]
impl MetadataSource for MssqlSource {
    async fn list_schemas(&mut self) -> Result<Vec<SchemaDescriptor>> {
        let rows = self.query(SCHEMAS_QUERY, &[]).await?;
        rows.iter()
            .map(|row| {
                Ok(SchemaDescriptor {
                    name: get_string(row, 0)?,
                    owner: row.try_get::<&str, _>(1)?.map(String::from),
                })
            })
            .collect()
    }

    async fn is_schema_empty(&mut self, schema: &str) -> Result<bool> {
        let rows = self.query(SCHEMA_OBJECT_COUNT_QUERY, &[Some(schema)]).await?;
        let count = match rows.first() {
            Some(row) => row.try_get::<i32, _>(0)?.unwrap_or(0),
            None => 0,
        };
        Ok(count == 0)
    }

    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>> {
        let rows = self.query(TABLES_QUERY, &[Some(schema)]).await?;
        rows.iter().map(|row| get_string(row, 0)).collect()
    }

    async fn list_columns(&mut self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = self.query(COLUMNS_QUERY, &[Some(schema), Some(table)]).await?;
        let columns = rows.iter().map(|row| self.column(row)).collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn primary_key(&mut self, schema: &str, table: &str) -> Result<Option<ConstraintDescriptor>> {
        let mut keys = self
            .load_key_constraints(schema, table, ConstraintKind::PrimaryKey)
            .await?;
        Ok(keys.pop())
    }

    async fn unique_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>> {
        self.load_key_constraints(schema, table, ConstraintKind::UniqueKey).await
    }

    async fn foreign_keys(&mut self, schema: &str, table: &str) -> Result<Vec<ConstraintDescriptor>> {
        let rows = self.query(FOREIGN_KEYS_QUERY, &[Some(schema), Some(table)]).await?;

        let mut keys: Vec<ConstraintDescriptor> = Vec::new();
        for row in rows {
            let name = get_string(&row, 0)?;
            let column = get_string(&row, 1)?;
            let referenced_column = get_string(&row, 4)?;

            match keys.last_mut() {
                Some(last) if last.constraint_name == name => {
                    last.fields.push(column);
                    last.referenced_fields.push(referenced_column);
                }
                _ => {
                    let mut fk = ConstraintDescriptor::new(schema, table, name, ConstraintKind::ForeignKey);
                    fk.fields.push(column);
                    fk.referenced_schema = Some(get_string(&row, 2)?);
                    fk.referenced_table = Some(get_string(&row, 3)?);
                    fk.referenced_fields.push(referenced_column);
                    fk.on_delete_action = Some(get_string(&row, 5)?);
                    fk.on_update_action = Some(get_string(&row, 6)?);
                    keys.push(fk);
                }
            }
        }

        debug!("Loaded {} foreign keys for {}.{}", keys.len(), schema, table);
        Ok(keys)
    }

    async fn default_constraints(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Vec<ConstraintDescriptor>> {
        let rows = self
            .query(DEFAULTS_QUERY, &[Some(schema), Some(table), Some(column)])
            .await?;

        rows.iter()
            .map(|row| {
                let mut constraint =
                    ConstraintDescriptor::new(schema, table, get_string(row, 0)?, ConstraintKind::Default);
                constraint.fields.push(column.to_string());
                constraint.definition = Some(get_string(row, 1)?);
                constraint.value_type = self.type_map.classify(&get_string(row, 2)?);
                Ok(constraint)
            })
            .collect()
    }

    async fn indexes_per_table(&mut self, schema: &str, table: &str) -> Result<Vec<IndexDescriptor>> {
        self.load_indexes(schema, Some(table)).await
    }

    async fn indexes_per_schema(&mut self, schema: &str) -> Result<Vec<IndexDescriptor>> {
        let indexes = self.load_indexes(schema, None).await?;
        debug!("Loaded {} indexes for schema {}", indexes.len(), schema);
        Ok(indexes)
    }

    async fn auto_generated_statistics(&mut self, schema: &str) -> Result<Vec<StatisticsDescriptor>> {
        let rows = self.query(STATISTICS_QUERY, &[Some(schema)]).await?;

        let mut stats: Vec<StatisticsDescriptor> = Vec::new();
        for row in rows {
            let table_name = get_string(&row, 0)?;
            let name = get_string(&row, 1)?;
            let column = get_string(&row, 2)?;
            match stats.last_mut() {
                Some(last) if last.table_name == table_name && last.name == name => last.columns.push(column),
                _ => stats.push(StatisticsDescriptor {
                    schema: schema.to_string(),
                    table_name,
                    name,
                    columns: vec![column],
                }),
            }
        }
        Ok(stats)
    }

    async fn identity_columns(&mut self, schema: &str, table: &str) -> Result<Vec<IdentityDescriptor>> {
        let rows = self.query(IDENTITY_QUERY, &[Some(schema), Some(table)]).await?;
        rows.iter()
            .map(|row| {
                Ok(IdentityDescriptor {
                    schema: schema.to_string(),
                    table_name: table.to_string(),
                    column_name: get_string(row, 0)?,
                    seed_value: row.try_get::<i64, _>(1)?.unwrap_or(1),
                    seed_increment: row.try_get::<i64, _>(2)?.unwrap_or(1),
                    last_observed_value: row.try_get::<i64, _>(3)?,
                })
            })
            .collect()
    }

    async fn module_definitions(&mut self, schema: &str, kind: ModuleKind) -> Result<Vec<ModuleDefinition>> {
        let rows = self
            .query(MODULES_QUERY, &[Some(schema), Some(module_type_code(kind))])
            .await?;

        let mut modules = Vec::with_capacity(rows.len());
        for row in rows {
            let name = get_string(&row, 0)?;
            match row.try_get::<&str, _>(1)? {
                Some(definition) => modules.push(ModuleDefinition {
                    schema: schema.to_string(),
                    name,
                    definition: definition.to_string(),
                    kind,
                }),
                // encrypted modules have no readable definition
                None => warn!("{:?} {}.{} has no definition, skipping", kind, schema, name),
            }
        }
        Ok(modules)
    }
}

/// Convert one decoded cell into an owned value.
fn convert_column(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match &data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(v as i16)),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| SqlValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v.as_ref().map(|b| SqlValue::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(x.clone().into_owned().into_string())),
        ColumnData::Numeric(_) => Decimal::from_sql(&data)?.map(SqlValue::Decimal),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map(SqlValue::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map(SqlValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map(SqlValue::Time),
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(&data)?.map(SqlValue::DateTimeOffset)
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn convert_row(row: Row) -> Result<Vec<SqlValue>> {
    row.into_iter().map(convert_column).collect()
}

/// Bind one value as the next positional parameter.
fn bind_value<'a>(query: &mut Query<'a>, value: &'a SqlValue) {
    match value {
        SqlValue::Null => query.bind(Option::<&str>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(tiberius::numeric::Numeric::new_with_scale(
            v.mantissa(),
            v.scale() as u8,
        )),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
    }
}

#[async_trait]
impl DdlExecutor for MssqlSource {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let client = &mut self.client;
        with_timeout(self.timeout, sql, async move {
            let result = client.execute(sql, &[]).await?;
            Ok(result.total())
        })
        .await
    }

    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut query = Query::new(sql);
        for value in params {
            bind_value(&mut query, value);
        }

        let client = &mut self.client;
        with_timeout(self.timeout, sql, async move {
            let result = query.execute(client).await?;
            Ok(result.total())
        })
        .await
    }

    async fn execute_scalar(&mut self, sql: &str) -> Result<SqlValue> {
        let client = &mut self.client;
        let row = with_timeout(self.timeout, sql, async move {
            let stream = client.query(sql, &[]).await?;
            Ok(stream.into_row().await?)
        })
        .await?;

        match row.and_then(|row| row.into_iter().next()) {
            Some(data) => convert_column(data),
            None => Ok(SqlValue::Null),
        }
    }

    async fn open_cursor<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>> {
        let client = &mut self.client;
        let stream = with_timeout(self.timeout, sql, async move { Ok(client.query(sql, &[]).await?) }).await?;

        Ok(stream
            .into_row_stream()
            .map_err(MigrateError::from)
            .and_then(|row| async move { convert_row(row) })
            .boxed())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.execute("BEGIN TRANSACTION").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT TRANSACTION").await.map(|_| ())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }
}
