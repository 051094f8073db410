//! Core abstractions shared by the translation engines and the drivers.
//!
//! - [`schema`]: Descriptors for schemas, tables, columns, constraints, and modules
//! - [`value`]: Row cell representation used by the transfer engine
//! - [`traits`]: Contracts for the metadata source and statement executors
//! - [`identifier`]: Identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use schema::{
    AbstractType, ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IdentityDescriptor,
    IndexDescriptor, ModuleDefinition, ModuleKind, ObjectKind, SchemaDescriptor,
    StatisticsDescriptor,
};
pub use traits::{DdlExecutor, MetadataSource, RowStream};
pub use value::SqlValue;
