//! PostgreSQL driver.
//!
//! [`PostgresTarget`] runs generated DDL and the per-row inserts of the
//! transfer engine over a single tokio-postgres connection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::{StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row, SimpleQueryMessage, Statement};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::tls::SslMode;
use super::{preview, with_timeout};
use crate::config::TargetConfig;
use crate::core::traits::{DdlExecutor, RowStream};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target connection.
pub struct PostgresTarget {
    client: Client,
    statements: HashMap<String, Statement>,
    timeout: Duration,
}

fn build_config(config: &TargetConfig) -> PgConfig {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(&config.database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);

    pg_config.keepalives(true);
    pg_config.keepalives_idle(Duration::from_secs(30));
    pg_config.connect_timeout(CONNECT_TIMEOUT);
    pg_config
}

impl PostgresTarget {
    /// Connect to PostgreSQL.
    pub async fn connect(config: &TargetConfig, timeout: Duration) -> Result<Self> {
        let pg_config = build_config(config);

        let client = match SslMode::parse(&config.ssl_mode)?.connector()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, connection) = pg_config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
            Some(tls) => {
                let (client, connection) = pg_config.connect(tls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
        };

        client.simple_query("SELECT 1").await?;
        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            client,
            statements: HashMap::new(),
            timeout,
        })
    }

    /// Prepare `sql` with every parameter typed as text, reusing earlier preparations.
    async fn prepare_text(&mut self, sql: &str, param_count: usize) -> Result<Statement> {
        if let Some(statement) = self.statements.get(sql) {
            return Ok(statement.clone());
        }

        let types = vec![Type::TEXT; param_count];
        let client = &self.client;
        let statement = with_timeout(self.timeout, sql, async move {
            Ok(client.prepare_typed(sql, &types).await?)
        })
        .await?;

        debug!("Prepared statement ({} cached)", self.statements.len() + 1);
        self.statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }
}

fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(rows) => *rows,
            _ => 0,
        })
        .sum()
}

fn first_cell(messages: &[SimpleQueryMessage]) -> SqlValue {
    messages
        .iter()
        .find_map(|message| match message {
            SimpleQueryMessage::Row(row) => Some(row.get(0).map(String::from).into()),
            _ => None,
        })
        .unwrap_or(SqlValue::Null)
}

/// Convert one cell by its declared column type.
fn convert_column(row: &Row, idx: usize) -> Result<SqlValue> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.map(SqlValue::Decimal),
        Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.map(SqlValue::Uuid),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeOffset),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(idx)?.map(SqlValue::Time),
        // text, varchar, bpchar, name, citext
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|e| MigrateError::execution(format!("column {} ({})", idx, ty.name()), e))?
            .map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn convert_row(row: &Row) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|idx| convert_column(row, idx)).collect()
}

#[async_trait]
impl DdlExecutor for PostgresTarget {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let client = &self.client;
        let messages = with_timeout(self.timeout, sql, async move {
            client
                .simple_query(sql)
                .await
                .map_err(|e| MigrateError::execution(preview(sql), e))
        })
        .await?;
        Ok(affected_rows(&messages))
    }

    async fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let statement = self.prepare_text(sql, params.len()).await?;
        let texts: Vec<Option<String>> = params.iter().map(SqlValue::to_pg_text).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = texts.iter().map(|t| t as &(dyn ToSql + Sync)).collect();

        let client = &self.client;
        with_timeout(self.timeout, sql, async move {
            Ok(client.execute(&statement, &refs).await?)
        })
        .await
    }

    async fn execute_scalar(&mut self, sql: &str) -> Result<SqlValue> {
        let client = &self.client;
        let messages = with_timeout(self.timeout, sql, async move {
            client
                .simple_query(sql)
                .await
                .map_err(|e| MigrateError::execution(preview(sql), e))
        })
        .await?;
        Ok(first_cell(&messages))
    }

    async fn open_cursor<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>> {
        let client = &self.client;
        let stream = with_timeout(self.timeout, sql, async move {
            Ok(client
                .query_raw(sql, std::iter::empty::<&(dyn ToSql + Sync)>())
                .await?)
        })
        .await?;

        Ok(stream
            .map_err(MigrateError::from)
            .and_then(|row| async move { convert_row(&row) })
            .boxed())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.execute("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}
