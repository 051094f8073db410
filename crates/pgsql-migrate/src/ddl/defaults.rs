//! Default-expression translation.
//!
//! SQL Server stores default constraints as expression text such as
//! `((0))`, `(N'abc')` or `(getdate())`. Only a closed set of forms is
//! translated; anything else fails with [`MigrateError::UnsupportedDefault`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::identifier::quote_pg_literal;
use crate::core::schema::AbstractType;
use crate::error::{MigrateError, Result};
use crate::rewrite::{tokenize, TokenKind};

static NUMERIC_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("static regex"));

/// Translate a SQL Server default expression into PostgreSQL.
///
/// `value_type` is the abstract type of the defaulted column; it decides how
/// bit literals are rendered.
pub fn translate_default(definition: &str, value_type: Option<AbstractType>) -> Result<String> {
    let unsupported = || MigrateError::UnsupportedDefault {
        definition: definition.to_string(),
    };

    let inner = strip_parentheses(definition.trim());
    if inner.is_empty() {
        return Err(unsupported());
    }

    if inner.eq_ignore_ascii_case("null") {
        return Ok("NULL".to_string());
    }

    if NUMERIC_LITERAL.is_match(inner) {
        if value_type == Some(AbstractType::Boolean) {
            return match inner {
                "0" => Ok("false".to_string()),
                "1" => Ok("true".to_string()),
                _ => Err(unsupported()),
            };
        }
        return Ok(inner.to_string());
    }

    if let Some(literal) = string_literal(inner) {
        return Ok(literal);
    }

    let call: String = inner
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match call.as_str() {
        "getdate()" | "sysdatetime()" | "current_timestamp" | "sysdatetimeoffset()" => Ok("now()".to_string()),
        "getutcdate()" | "sysutcdatetime()" => Ok("(now() at time zone 'utc')".to_string()),
        "newid()" | "newsequentialid()" => Ok("gen_random_uuid()".to_string()),
        _ => Err(unsupported()),
    }
}

/// Render the expression as a PostgreSQL literal if it is exactly one string literal.
fn string_literal(expression: &str) -> Option<String> {
    let tokens = tokenize(expression).ok()?;
    let mut significant = tokens.iter().filter(|t| !t.is_trivia());
    match (significant.next(), significant.next()) {
        (Some(token), None) if token.kind == TokenKind::StringLiteral => {
            Some(quote_pg_literal(&token.string_value()))
        }
        _ => None,
    }
}

/// Remove every pair of parentheses that wraps the whole expression.
fn strip_parentheses(mut expression: &str) -> &str {
    while expression.starts_with('(') && expression.ends_with(')') && wraps_whole(expression) {
        expression = expression[1..expression.len() - 1].trim();
    }
    expression
}

/// Whether the opening parenthesis at index 0 closes at the last character.
fn wraps_whole(expression: &str) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let last = expression.len() - 1;

    for (i, c) in expression.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }
    false
}
