//! PostgreSQL type profile.

use crate::core::schema::AbstractType;

use super::TypeMap;

/// Widest precision accepted by `decimal(p,s)`.
const DECIMAL_CAPACITY: u32 = 1000;

/// Widest length accepted by `varchar(n)`.
const MAX_VARCHAR_SIZE: u32 = 10_485_760;

/// Largest size SQL Server reports for a bounded column.
const MAX_REPORTED_SIZE: u32 = i32::MAX as u32;

/// Build the PostgreSQL profile.
///
/// With `use_citext`, every character template becomes `citext`, which keeps
/// SQL Server's case-insensitive comparisons.
pub fn postgres_type_map(use_citext: bool) -> TypeMap {
    let text = |template: &'static str| if use_citext { "citext" } else { template };

    TypeMap::builder(if use_citext { "postgres (citext)" } else { "postgres" })
        .catch_all(AbstractType::Binary, "bytea")
        .bounded(AbstractType::Binary, MAX_REPORTED_SIZE, "bytea")
        .catch_all(AbstractType::Boolean, "boolean")
        // no single-byte unsigned integer
        .catch_all(AbstractType::Byte, "smallint")
        .catch_all(AbstractType::Currency, "money")
        .catch_all(AbstractType::Date, "date")
        .catch_all(AbstractType::DateTime, "timestamp")
        .catch_all(AbstractType::DateTime2, "timestamp")
        .catch_all(AbstractType::DateTimeOffset, "timestamptz")
        .catch_all(AbstractType::Decimal, "decimal(19,5)")
        .bounded(AbstractType::Decimal, DECIMAL_CAPACITY, "decimal($size,$precision)")
        .catch_all(AbstractType::Double, "float8")
        .catch_all(AbstractType::Guid, "uuid")
        .catch_all(AbstractType::Int16, "smallint")
        .catch_all(AbstractType::Int32, "integer")
        .catch_all(AbstractType::Int64, "bigint")
        .catch_all(AbstractType::Single, "float4")
        .catch_all(AbstractType::Time, "time")
        .catch_all(AbstractType::Xml, "xml")
        .catch_all(AbstractType::AnsiStringFixedLength, text("char(255)"))
        .bounded(AbstractType::AnsiStringFixedLength, MAX_REPORTED_SIZE, text("char($size)"))
        .catch_all(AbstractType::AnsiString, text("text"))
        .bounded(AbstractType::AnsiString, MAX_VARCHAR_SIZE, text("varchar($size)"))
        .bounded(AbstractType::AnsiString, MAX_REPORTED_SIZE, text("text"))
        .catch_all(AbstractType::StringFixedLength, text("char(255)"))
        .bounded(AbstractType::StringFixedLength, MAX_REPORTED_SIZE, text("char($size)"))
        .catch_all(AbstractType::String, text("text"))
        .bounded(AbstractType::String, MAX_VARCHAR_SIZE, text("varchar($size)"))
        .bounded(AbstractType::String, MAX_REPORTED_SIZE, text("text"))
        .custom("geometry", "citext")
        .custom("geography", "citext")
        .build()
}
