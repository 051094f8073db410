//! SQL Server 2008 type profile.
//!
//! The migration never emits SQL Server DDL; this profile exists so that
//! column type names reported by the SQL Server catalog can be classified
//! into abstract types through [`TypeMap::classify`].

use crate::core::schema::AbstractType;

use super::TypeMap;

const MAX_ANSI_SIZE: u32 = 8000;
const MAX_UNICODE_SIZE: u32 = 4000;
const MAX_LOB_SIZE: u32 = i32::MAX as u32;
const MAX_DECIMAL_PRECISION: u32 = 38;
const MAX_FRACTIONAL_SECONDS: u32 = 7;

/// Build the SQL Server 2008 profile.
pub fn sql_server_type_map() -> TypeMap {
    TypeMap::builder("sqlserver2008")
        .catch_all(AbstractType::AnsiStringFixedLength, "CHAR(255)")
        .bounded(AbstractType::AnsiStringFixedLength, MAX_ANSI_SIZE, "CHAR($size)")
        .catch_all(AbstractType::AnsiString, "VARCHAR(255)")
        .bounded(AbstractType::AnsiString, MAX_ANSI_SIZE, "VARCHAR($size)")
        .bounded(AbstractType::AnsiString, MAX_LOB_SIZE, "VARCHAR(MAX)")
        .catch_all(AbstractType::Binary, "VARBINARY(8000)")
        .bounded(AbstractType::Binary, MAX_ANSI_SIZE, "VARBINARY($size)")
        .bounded(AbstractType::Binary, MAX_LOB_SIZE, "VARBINARY(MAX)")
        .catch_all(AbstractType::Boolean, "BIT")
        .catch_all(AbstractType::Byte, "TINYINT")
        .catch_all(AbstractType::Currency, "MONEY")
        .catch_all(AbstractType::Date, "DATE")
        .catch_all(AbstractType::DateTime, "DATETIME")
        .catch_all(AbstractType::DateTime2, "DATETIME2")
        .catch_all(AbstractType::DateTimeOffset, "DATETIMEOFFSET")
        .bounded(AbstractType::DateTimeOffset, MAX_FRACTIONAL_SECONDS, "DATETIMEOFFSET($size)")
        .catch_all(AbstractType::Decimal, "DECIMAL(19,5)")
        .bounded(AbstractType::Decimal, MAX_DECIMAL_PRECISION, "DECIMAL($size,$precision)")
        .catch_all(AbstractType::Double, "FLOAT")
        .catch_all(AbstractType::Guid, "UNIQUEIDENTIFIER")
        .catch_all(AbstractType::Int16, "SMALLINT")
        .catch_all(AbstractType::Int32, "INT")
        .catch_all(AbstractType::Int64, "BIGINT")
        .catch_all(AbstractType::Single, "REAL")
        .catch_all(AbstractType::StringFixedLength, "NCHAR(255)")
        .bounded(AbstractType::StringFixedLength, MAX_UNICODE_SIZE, "NCHAR($size)")
        .catch_all(AbstractType::String, "NVARCHAR(255)")
        .bounded(AbstractType::String, MAX_UNICODE_SIZE, "NVARCHAR($size)")
        .bounded(AbstractType::String, MAX_LOB_SIZE, "NVARCHAR(MAX)")
        .catch_all(AbstractType::Time, "TIME")
        .catch_all(AbstractType::Xml, "XML")
        // catalog names no template emits
        .alias("numeric", AbstractType::Decimal)
        .alias("text", AbstractType::AnsiString)
        .alias("ntext", AbstractType::String)
        .alias("binary", AbstractType::Binary)
        .alias("image", AbstractType::Binary)
        .alias("timestamp", AbstractType::Binary)
        .alias("rowversion", AbstractType::Binary)
        .alias("smalldatetime", AbstractType::DateTime)
        .alias("smallmoney", AbstractType::Currency)
        .alias("sysname", AbstractType::String)
        .build()
}
