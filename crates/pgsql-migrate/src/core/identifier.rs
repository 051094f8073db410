//! Identifier validation and quoting for generated SQL.
//!
//! Identifiers cannot be bound as statement parameters, so every name that
//! reaches generated DDL or DML passes through one of the quoting functions
//! here. Values (string literals in default expressions) go through
//! [`quote_pg_literal`].

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted before quoting.
///
/// SQL Server allows 128 characters; the PostgreSQL limit of 63 is enforced
/// by the naming policy, not here.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is embedded in SQL.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding [`MAX_IDENTIFIER_LENGTH`] characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a PostgreSQL object name with its schema.
pub fn qualify_pg(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(name)?))
}

/// Qualify a SQL Server object name with its schema.
pub fn qualify_mssql(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(name)?))
}

/// Quote a PostgreSQL string literal.
pub fn quote_pg_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether a name can be written into PostgreSQL SQL without quotes.
///
/// True for names that start with a lowercase letter or underscore and
/// continue with lowercase letters, digits, underscores or `$`. Such names
/// are not case-folded by the server.
pub fn is_bare_pg_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
}

/// Render a PostgreSQL identifier bare when possible, quoted otherwise.
pub fn render_pg(name: &str) -> Result<String> {
    if is_bare_pg_identifier(name) {
        validate_identifier(name)?;
        Ok(name.to_string())
    } else {
        quote_pg(name)
    }
}
