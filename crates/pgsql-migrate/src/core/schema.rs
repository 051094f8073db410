//! Schema and metadata descriptors for schemas, tables, columns, indexes, and constraints.
//!
//! Descriptors are read-only snapshots produced by a [`MetadataSource`](super::MetadataSource).
//! Translation never mutates them; it always produces a new descriptor carrying the
//! translated names and types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of database object being renamed.
///
/// Used as a discriminant in the renaming ledger so that the same raw string
/// used for, e.g., a table and an index does not collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Schema,
    Table,
    Column,
    Index,
    PrimaryKey,
    UniqueKey,
    ForeignKey,
    DefaultConstraint,
    View,
    ScalarFunction,
    TableFunction,
    InlineTableFunction,
    StoredProcedure,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Dialect-neutral column type classification.
///
/// This is the key into a [`TypeMap`](crate::typemap::TypeMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbstractType {
    AnsiString,
    AnsiStringFixedLength,
    Binary,
    Boolean,
    Byte,
    Currency,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    Single,
    String,
    StringFixedLength,
    Time,
    Xml,
}

impl AbstractType {
    /// Whether the `size` of a column of this type is meaningful to the type map.
    ///
    /// Fixed-width types ignore any size the catalog reports (e.g. the numeric
    /// precision of an `int`).
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            AbstractType::AnsiString
                | AbstractType::AnsiStringFixedLength
                | AbstractType::Binary
                | AbstractType::Decimal
                | AbstractType::String
                | AbstractType::StringFixedLength
                | AbstractType::DateTimeOffset
        )
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Schema metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Schema name.
    pub name: String,

    /// Owning principal, when the catalog reports one.
    pub owner: Option<String>,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Abstract type; absent for dialect-specific or user-defined types.
    pub abstract_type: Option<AbstractType>,

    /// Type name as reported by the source catalog (e.g. "nvarchar", "geometry").
    pub dialect_type_name: String,

    /// Length for string/binary types, precision for decimals. `None` means unbounded.
    pub size: Option<u32>,

    /// Scale for decimals.
    pub precision: Option<u32>,

    /// Whether the type is a user-defined alias or CLR type.
    pub is_user_defined_type: bool,
}

impl ColumnDescriptor {
    /// Create a column with an abstract type and no size information.
    pub fn new(name: impl Into<String>, abstract_type: AbstractType, dialect_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_nullable: true,
            abstract_type: Some(abstract_type),
            dialect_type_name: dialect_type_name.into(),
            size: None,
            precision: None,
            is_user_defined_type: false,
        }
    }

    /// Set the size (builder style).
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the precision (builder style).
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set nullability (builder style).
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }
}

/// Constraint kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    UniqueKey,
    ForeignKey,
    Default,
}

impl ConstraintKind {
    /// The renaming discriminant for a constraint of this kind.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            ConstraintKind::PrimaryKey => ObjectKind::PrimaryKey,
            ConstraintKind::UniqueKey => ObjectKind::UniqueKey,
            ConstraintKind::ForeignKey => ObjectKind::ForeignKey,
            ConstraintKind::Default => ObjectKind::DefaultConstraint,
        }
    }
}

/// Constraint metadata (primary, unique, foreign key, or default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    /// Schema name.
    pub schema: String,

    /// Owning table name.
    pub table_name: String,

    /// Constraint name.
    pub constraint_name: String,

    /// Constraint kind.
    pub kind: ConstraintKind,

    /// Constrained columns, in key order.
    pub fields: Vec<String>,

    /// Referenced schema (foreign keys).
    pub referenced_schema: Option<String>,

    /// Referenced table (foreign keys).
    pub referenced_table: Option<String>,

    /// Referenced columns, in key order (foreign keys).
    pub referenced_fields: Vec<String>,

    /// ON UPDATE action as reported by the source, e.g. "NO_ACTION" (foreign keys).
    pub on_update_action: Option<String>,

    /// ON DELETE action as reported by the source (foreign keys).
    pub on_delete_action: Option<String>,

    /// Default expression text (defaults).
    pub definition: Option<String>,

    /// Declared type of the defaulted column (defaults).
    pub value_type: Option<AbstractType>,
}

impl ConstraintDescriptor {
    /// Create a constraint with no fields.
    pub fn new(
        schema: impl Into<String>,
        table_name: impl Into<String>,
        constraint_name: impl Into<String>,
        kind: ConstraintKind,
    ) -> Self {
        Self {
            schema: schema.into(),
            table_name: table_name.into(),
            constraint_name: constraint_name.into(),
            kind,
            fields: Vec::new(),
            referenced_schema: None,
            referenced_table: None,
            referenced_fields: Vec::new(),
            on_update_action: None,
            on_delete_action: None,
            definition: None,
            value_type: None,
        }
    }

    /// Get the fully qualified owning table name.
    pub fn full_table_name(&self) -> String {
        format!("{}.{}", self.schema, self.table_name)
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Schema name.
    pub schema: String,

    /// Indexed table name.
    pub table_name: String,

    /// Index name.
    pub index_name: String,

    /// Key columns, in key order.
    pub key_columns: Vec<String>,

    /// Non-key covering columns.
    pub included_columns: Vec<String>,

    /// Whether the index enforces uniqueness.
    pub is_unique: bool,
}

/// Auto-created statistics metadata; recreated on the target as an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsDescriptor {
    pub schema: String,
    pub table_name: String,
    pub name: String,
    pub columns: Vec<String>,
}

impl From<StatisticsDescriptor> for IndexDescriptor {
    fn from(stats: StatisticsDescriptor) -> Self {
        IndexDescriptor {
            schema: stats.schema,
            table_name: stats.table_name,
            index_name: stats.name,
            key_columns: stats.columns,
            included_columns: Vec::new(),
            is_unique: false,
        }
    }
}

/// Identity (auto-increment) column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    pub schema: String,
    pub table_name: String,
    pub column_name: String,
    pub seed_value: i64,
    pub seed_increment: i64,

    /// Last value handed out by the source sequence, if any row was ever inserted.
    pub last_observed_value: Option<i64>,
}

impl IdentityDescriptor {
    /// First value the recreated sequence must produce.
    ///
    /// Starts after the last observed value so that already-copied rows are
    /// never collided with.
    pub fn start_value(&self) -> i64 {
        match self.last_observed_value {
            Some(last) => last.saturating_add(self.seed_increment),
            None => self.seed_value,
        }
    }
}

/// Kind of SQL module definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    View,
    ScalarFunction,
    TableFunction,
    InlineTableFunction,
    StoredProcedure,
}

impl ModuleKind {
    /// All module kinds, in migration order.
    pub const ALL: [ModuleKind; 5] = [
        ModuleKind::View,
        ModuleKind::ScalarFunction,
        ModuleKind::TableFunction,
        ModuleKind::InlineTableFunction,
        ModuleKind::StoredProcedure,
    ];

    /// The renaming discriminant for a module of this kind.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            ModuleKind::View => ObjectKind::View,
            ModuleKind::ScalarFunction => ObjectKind::ScalarFunction,
            ModuleKind::TableFunction => ObjectKind::TableFunction,
            ModuleKind::InlineTableFunction => ObjectKind::InlineTableFunction,
            ModuleKind::StoredProcedure => ObjectKind::StoredProcedure,
        }
    }
}

/// Textual source of a view, function, or procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub schema: String,
    pub name: String,
    pub definition: String,
    pub kind: ModuleKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_kind_maps_to_object_kind() {
        assert_eq!(ConstraintKind::PrimaryKey.object_kind(), ObjectKind::PrimaryKey);
        assert_eq!(ConstraintKind::UniqueKey.object_kind(), ObjectKind::UniqueKey);
        assert_eq!(ConstraintKind::ForeignKey.object_kind(), ObjectKind::ForeignKey);
        assert_eq!(ConstraintKind::Default.object_kind(), ObjectKind::DefaultConstraint);
    }

    #[test]
    fn test_identity_starts_after_last_value() {
        let identity = IdentityDescriptor {
            schema: "dbo".into(),
            table_name: "Orders".into(),
            column_name: "Id".into(),
            seed_value: 1,
            seed_increment: 5,
            last_observed_value: Some(100),
        };
        assert_eq!(identity.start_value(), 105);
    }

    #[test]
    fn test_identity_without_rows_starts_at_seed() {
        let identity = IdentityDescriptor {
            schema: "dbo".into(),
            table_name: "Orders".into(),
            column_name: "Id".into(),
            seed_value: 1000,
            seed_increment: 1,
            last_observed_value: None,
        };
        assert_eq!(identity.start_value(), 1000);
    }

    #[test]
    fn test_statistics_become_non_unique_index() {
        let stats = StatisticsDescriptor {
            schema: "dbo".into(),
            table_name: "Orders".into(),
            name: "_WA_Sys_00000002".into(),
            columns: vec!["CustomerId".into()],
        };
        let index = IndexDescriptor::from(stats);
        assert_eq!(index.index_name, "_WA_Sys_00000002");
        assert_eq!(index.key_columns, vec!["CustomerId".to_string()]);
        assert!(index.included_columns.is_empty());
        assert!(!index.is_unique);
    }

    #[test]
    fn test_object_kind_order_is_declaration_order() {
        assert!(ObjectKind::Schema < ObjectKind::Table);
        assert!(ObjectKind::Table < ObjectKind::Column);
        assert!(ObjectKind::View < ObjectKind::StoredProcedure);
    }
}
