//! Error types for the migration library.

use thiserror::Error;

use crate::core::schema::ObjectKind;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The same raw name resolved to two different translated names.
    #[error(
        "Ambiguous mapping. Found multiple values for {kind} with name `{name}` in schema `{schema}`: \
         `{existing}` and `{conflicting}`"
    )]
    AmbiguousMapping {
        schema: String,
        kind: String,
        name: String,
        existing: String,
        conflicting: String,
    },

    /// A canonicalized name still exceeds the target identifier length.
    #[error(
        "Failed to normalize name '{name}' (length = {length}), result of normalization: \
         '{normalized}' (length = {normalized_length}). Max length is {max_length}"
    )]
    NormalizationFailure {
        name: String,
        length: usize,
        normalized: String,
        normalized_length: usize,
        max_length: usize,
    },

    /// No type template matches the requested abstract type and size.
    #[error("Unsupported type {abstract_type} (size = {size:?}, precision = {precision:?}) in profile `{profile}`")]
    UnsupportedType {
        abstract_type: String,
        size: Option<u32>,
        precision: Option<u32>,
        profile: String,
    },

    /// A dialect-specific type definition has no mapping.
    #[error("Custom data type `{definition}` is not supported by `{profile}`")]
    UnsupportedCustomType { definition: String, profile: String },

    /// A default-value expression has no target equivalent.
    #[error("Default expression `{definition}` is not supported")]
    UnsupportedDefault { definition: String },

    /// A SQL fragment could not be lexed.
    #[error("Failed to tokenize SQL at offset {position}: {message}")]
    Tokenize { position: usize, message: String },

    /// A column-level failure (type or default), located by table and column.
    #[error("Column {schema}.{table}.{column}: {source}")]
    Column {
        schema: String,
        table: String,
        column: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// A constraint arrived without a name.
    #[error("Constraint on {schema}.{table} must have a name")]
    MissingConstraintName { schema: String, table: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table} at row {row}: {message}")]
    Transfer {
        table: String,
        row: u64,
        message: String,
    },

    /// A statement was rejected by one of the engines.
    #[error("Statement failed: {message}\n  Statement: {statement}")]
    Execution { statement: String, message: String },

    /// A statement exceeded the per-statement timeout.
    #[error("Statement timed out after {seconds}s\n  Statement: {statement}")]
    Timeout { statement: String, seconds: u64 },

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create an AmbiguousMapping error.
    pub fn ambiguous(
        schema: impl Into<String>,
        kind: Option<ObjectKind>,
        name: impl Into<String>,
        existing: impl Into<String>,
        conflicting: impl Into<String>,
    ) -> Self {
        MigrateError::AmbiguousMapping {
            schema: schema.into(),
            kind: kind.map_or_else(|| "unknown".to_string(), |k| k.to_string()),
            name: name.into(),
            existing: existing.into(),
            conflicting: conflicting.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, row: u64, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            row,
            message: message.into(),
        }
    }

    /// Create an Execution error
    pub fn execution(statement: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Execution {
            statement: statement.into(),
            message: message.to_string(),
        }
    }

    /// Attach the location of a column to an error.
    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        source: MigrateError,
    ) -> Self {
        MigrateError::Column {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            source: Box::new(source),
        }
    }

    /// Create a Tokenize error
    pub fn tokenize(position: usize, message: impl Into<String>) -> Self {
        MigrateError::Tokenize {
            position,
            message: message.into(),
        }
    }

    /// Whether the error only affects the single module definition being rewritten.
    pub fn is_definition_scoped(&self) -> bool {
        matches!(self, MigrateError::Tokenize { .. })
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
