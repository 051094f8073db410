//! PostgreSQL statement builder.
//!
//! Every function takes already-translated descriptors and returns one SQL
//! statement. Names are always double-quoted on the target, so translated
//! names are used exactly as the ledger recorded them.
//!
//! The two statements that run against the source, [`select_rows`] and
//! [`count_rows`], use the original names and SQL Server bracket quoting.

pub mod defaults;

use crate::core::identifier::{qualify_mssql, qualify_pg, quote_mssql, quote_pg};
use crate::core::schema::{ColumnDescriptor, ConstraintDescriptor, IdentityDescriptor, IndexDescriptor};
use crate::error::{MigrateError, Result};
use crate::typemap::TypeMap;

pub use defaults::translate_default;

/// A target column: translated name plus resolved type literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_literal: String,
    pub is_nullable: bool,
}

/// Resolve the target type literal of a source column.
///
/// Columns with an abstract type, alias types included, go through
/// [`TypeMap::resolve`]. Unclassified types go through
/// [`TypeMap::resolve_custom`] using the source type name.
pub fn column_type(type_map: &TypeMap, column: &ColumnDescriptor) -> Result<String> {
    match column.abstract_type {
        Some(abstract_type) => type_map.resolve(abstract_type, column.size, column.precision),
        None => type_map.resolve_custom(&column.dialect_type_name, column.size, column.precision),
    }
}

pub fn create_schema(schema: &str) -> Result<String> {
    Ok(format!("CREATE SCHEMA IF NOT EXISTS {}", quote_pg(schema)?))
}

pub fn drop_table(schema: &str, table: &str) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", qualify_pg(schema, table)?))
}

/// Generate `CREATE TABLE` with one line per column.
pub fn create_table(schema: &str, table: &str, columns: &[ColumnDefinition]) -> Result<String> {
    if columns.is_empty() {
        return Err(MigrateError::Config(format!(
            "Table {}.{} has no columns",
            schema, table
        )));
    }

    let mut ddl = format!("CREATE TABLE {} (\n", qualify_pg(schema, table)?);
    for (i, col) in columns.iter().enumerate() {
        let nullability = if col.is_nullable { "NULL" } else { "NOT NULL" };
        ddl.push_str(&format!(
            "    {} {} {}",
            quote_pg(&col.name)?,
            col.type_literal,
            nullability
        ));
        ddl.push_str(if i < columns.len() - 1 { ",\n" } else { "\n" });
    }
    ddl.push(')');
    Ok(ddl)
}

fn column_list(columns: &[String]) -> Result<String> {
    let quoted = columns.iter().map(|c| quote_pg(c)).collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

fn require_fields(constraint: &ConstraintDescriptor) -> Result<()> {
    if constraint.fields.is_empty() {
        return Err(MigrateError::Config(format!(
            "Constraint {} on {} has no columns",
            constraint.constraint_name,
            constraint.full_table_name()
        )));
    }
    Ok(())
}

pub fn add_primary_key(pk: &ConstraintDescriptor) -> Result<String> {
    require_fields(pk)?;
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
        qualify_pg(&pk.schema, &pk.table_name)?,
        quote_pg(&pk.constraint_name)?,
        column_list(&pk.fields)?
    ))
}

pub fn add_unique_key(uq: &ConstraintDescriptor) -> Result<String> {
    require_fields(uq)?;
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        qualify_pg(&uq.schema, &uq.table_name)?,
        quote_pg(&uq.constraint_name)?,
        column_list(&uq.fields)?
    ))
}

/// Map a SQL Server referential action (`sys.foreign_keys` spelling) to PostgreSQL.
pub fn referential_action(action: &str) -> &'static str {
    match action.trim().to_ascii_uppercase().replace(' ', "_").as_str() {
        "CASCADE" => "CASCADE",
        "SET_NULL" => "SET NULL",
        "SET_DEFAULT" => "SET DEFAULT",
        _ => "NO ACTION",
    }
}

pub fn add_foreign_key(fk: &ConstraintDescriptor) -> Result<String> {
    require_fields(fk)?;
    let referenced_table = fk.referenced_table.as_deref().ok_or_else(|| {
        MigrateError::Config(format!(
            "Foreign key {} on {} has no referenced table",
            fk.constraint_name,
            fk.full_table_name()
        ))
    })?;
    if fk.referenced_fields.len() != fk.fields.len() {
        return Err(MigrateError::Config(format!(
            "Foreign key {} on {} references {} columns with {}",
            fk.constraint_name,
            fk.full_table_name(),
            fk.referenced_fields.len(),
            fk.fields.len()
        )));
    }
    let referenced_schema = fk.referenced_schema.as_deref().unwrap_or(&fk.schema);

    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        qualify_pg(&fk.schema, &fk.table_name)?,
        quote_pg(&fk.constraint_name)?,
        column_list(&fk.fields)?,
        qualify_pg(referenced_schema, referenced_table)?,
        column_list(&fk.referenced_fields)?,
        referential_action(fk.on_delete_action.as_deref().unwrap_or("NO_ACTION")),
        referential_action(fk.on_update_action.as_deref().unwrap_or("NO_ACTION")),
    ))
}

/// Generate `CREATE INDEX`; covering columns go into `INCLUDE`.
///
/// PostgreSQL index names live in the schema namespace, so the index is
/// created in the table's schema under its unqualified name.
pub fn create_index(index: &IndexDescriptor) -> Result<String> {
    if index.key_columns.is_empty() {
        return Err(MigrateError::Config(format!(
            "Index {} on {}.{} has no key columns",
            index.index_name, index.schema, index.table_name
        )));
    }

    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        quote_pg(&index.index_name)?,
        qualify_pg(&index.schema, &index.table_name)?,
        column_list(&index.key_columns)?
    );
    if !index.included_columns.is_empty() {
        sql.push_str(&format!(" INCLUDE ({})", column_list(&index.included_columns)?));
    }
    Ok(sql)
}

/// Turn an existing column into an identity column continuing the source sequence.
pub fn add_identity(identity: &IdentityDescriptor) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} ADD GENERATED BY DEFAULT AS IDENTITY (START WITH {} INCREMENT BY {})",
        qualify_pg(&identity.schema, &identity.table_name)?,
        quote_pg(&identity.column_name)?,
        identity.start_value(),
        identity.seed_increment
    ))
}

/// `expression` must already be a PostgreSQL expression (see [`translate_default`]).
pub fn set_default(schema: &str, table: &str, column: &str, expression: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
        qualify_pg(schema, table)?,
        quote_pg(column)?,
        expression
    ))
}

pub fn drop_view(schema: &str, view: &str) -> Result<String> {
    Ok(format!("DROP VIEW IF EXISTS {}", qualify_pg(schema, view)?))
}

/// Source query reading every column of a table in the given order.
pub fn select_rows(schema: &str, table: &str, columns: &[String]) -> Result<String> {
    let quoted = columns.iter().map(|c| quote_mssql(c)).collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "SELECT {} FROM {}",
        quoted.join(", "),
        qualify_mssql(schema, table)?
    ))
}

/// Source query counting the rows of a table.
pub fn count_rows(schema: &str, table: &str) -> Result<String> {
    Ok(format!("SELECT COUNT_BIG(1) FROM {}", qualify_mssql(schema, table)?))
}

/// Parameterized insert with one `$n` per column.
///
/// Parameters are bound as text, so each one is cast to its column type.
pub fn insert_row(schema: &str, table: &str, columns: &[ColumnDefinition]) -> Result<String> {
    let names = columns.iter().map(|c| quote_pg(&c.name)).collect::<Result<Vec<_>>>()?;
    let params: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("${}::{}", i + 1, c.type_literal))
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify_pg(schema, table)?,
        names.join(", "),
        params.join(", ")
    ))
}
