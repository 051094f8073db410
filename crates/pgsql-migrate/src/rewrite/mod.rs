//! SQL token rewriter.
//!
//! Module bodies (views, functions, procedures) are copied as text. Before
//! they run on the target, every identifier in them is replaced with its
//! translated name from the [`Ledger`], and string literals used as column
//! aliases (`AS 'Total'`) become quoted identifiers. All other text, including
//! whitespace and comments, is kept byte for byte.

pub mod lexer;

use std::ops::Range;

use crate::core::identifier::{quote_pg, render_pg};
use crate::error::{MigrateError, Result};
use crate::naming::{canonicalize, Ledger};

pub use lexer::{tokenize, Token, TokenKind};

/// A planned substitution: a byte range of the original text and its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub range: Range<usize>,
    pub text: String,
}

/// Rewrite identifiers and alias literals in `sql`.
///
/// Identifiers take the translation recorded in the ledger for that raw name
/// across all schemas and kinds. An identifier the ledger never saw is taken
/// as one of `reserved_schema_names` when it matches one ignoring case, and
/// rendered with that spelling; otherwise the canonicalizing policy is
/// applied directly.
///
/// Fails with [`MigrateError::Tokenize`] when the text cannot be lexed and
/// with [`MigrateError::AmbiguousMapping`] when a raw name has more than one
/// recorded translation.
pub fn rewrite(sql: &str, ledger: &Ledger, reserved_schema_names: &[String]) -> Result<String> {
    let tokens = tokenize(sql)?;
    let replacements = plan(&tokens, ledger, reserved_schema_names)?;
    Ok(splice(sql, &replacements))
}

/// Compute replacements for a token sequence, ordered by position.
pub fn plan(tokens: &[Token<'_>], ledger: &Ledger, reserved_schema_names: &[String]) -> Result<Vec<Replacement>> {
    let mut replacements = Vec::new();
    let mut previous: Option<&Token<'_>> = None;

    for token in tokens {
        if token.is_identifier() {
            let name = token.identifier_name();
            let translated = match resolve_name(ledger, &name)? {
                Some(translated) => translated,
                None => match reserved_schema_names.iter().find(|s| s.eq_ignore_ascii_case(&name)) {
                    Some(schema) => schema.clone(),
                    None => canonicalize(&name)?.name,
                },
            };

            let text = render_pg(&translated)?;
            if text != token.text {
                replacements.push(Replacement {
                    range: token.range.clone(),
                    text,
                });
            }
        } else if token.kind == TokenKind::StringLiteral
            && previous.is_some_and(|p| p.is_keyword("as"))
        {
            replacements.push(Replacement {
                range: token.range.clone(),
                text: quote_pg(&token.string_value())?,
            });
        }

        if !token.is_trivia() {
            previous = Some(token);
        }
    }

    Ok(replacements)
}

fn resolve_name(ledger: &Ledger, raw: &str) -> Result<Option<String>> {
    let mut candidates: Vec<&str> = Vec::new();
    for record in ledger.find_by_raw_name(raw) {
        if !candidates.contains(&record.new_name.as_str()) {
            candidates.push(&record.new_name);
        }
    }

    match candidates.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(single.to_string())),
        [first, second, ..] => Err(MigrateError::ambiguous("", None, raw, *first, *second)),
    }
}

/// Apply replacements in one forward pass over the original text.
///
/// Ranges always refer to `sql`, never to partially rewritten output, and
/// must be sorted and non-overlapping.
pub fn splice(sql: &str, replacements: &[Replacement]) -> String {
    let growth: isize = replacements
        .iter()
        .map(|r| r.text.len() as isize - r.range.len() as isize)
        .sum();
    let mut out = String::with_capacity((sql.len() as isize + growth).max(0) as usize);

    let mut cursor = 0;
    for replacement in replacements {
        debug_assert!(replacement.range.start >= cursor, "replacements overlap");
        out.push_str(&sql[cursor..replacement.range.start]);
        out.push_str(&replacement.text);
        cursor = replacement.range.end;
    }
    out.push_str(&sql[cursor..]);

    debug_assert_eq!(out.len() as isize, sql.len() as isize + growth);
    out
}
