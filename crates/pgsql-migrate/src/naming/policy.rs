//! Naming policies: how a raw source identifier becomes a target identifier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::schema::ObjectKind;
use crate::error::{MigrateError, Result};

/// PostgreSQL NAMEDATALEN - 1.
pub const PG_MAX_IDENTIFIER_LENGTH: usize = 63;

/// Default schema of the source engine.
pub const SOURCE_DEFAULT_SCHEMA: &str = "dbo";

/// Default schema of the target engine.
pub const TARGET_DEFAULT_SCHEMA: &str = "public";

// A word that starts with an uppercase letter followed by lowercase letters,
// preceded by anything: "HTMLParser" -> "HTML_Parser".
static CAPITALIZED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"));

// Lowercase or digit followed by uppercase: "userID" -> "user_ID".
static LOWER_UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

static REPEATED_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("static regex"));

/// Strategy used to derive target identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Keep names unchanged, apart from the default schema alias.
    Identity,

    /// Rewrite names into lowercase snake_case bounded by the PostgreSQL identifier limit.
    #[default]
    Canonicalizing,
}

/// A translated name plus whether canonicalization did more than lowercase it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyName {
    pub name: String,
    pub normalized: bool,
}

impl NamingPolicy {
    /// Apply the policy to a raw name of the given kind.
    pub fn apply(&self, kind: ObjectKind, raw: &str) -> Result<PolicyName> {
        let aliased = if kind == ObjectKind::Schema {
            alias_schema(raw)
        } else {
            raw
        };

        match self {
            NamingPolicy::Identity => Ok(PolicyName {
                name: aliased.to_string(),
                normalized: false,
            }),
            NamingPolicy::Canonicalizing => canonicalize(aliased),
        }
    }
}

/// Map the source default schema to the target default schema.
pub fn alias_schema(raw: &str) -> &str {
    if raw.eq_ignore_ascii_case(SOURCE_DEFAULT_SCHEMA) {
        TARGET_DEFAULT_SCHEMA
    } else {
        raw
    }
}

/// Convert a name to lowercase snake_case within the PostgreSQL identifier limit.
///
/// Word boundaries are a capitalized word preceded by any character, and a
/// lowercase letter or digit followed by an uppercase letter. Runs of
/// separators collapse to one.
pub fn canonicalize(raw: &str) -> Result<PolicyName> {
    let split = CAPITALIZED_WORD.replace_all(raw, "${1}_${2}");
    let split = LOWER_UPPER.replace_all(&split, "${1}_${2}");
    let lowered = split.to_lowercase();
    let name = REPEATED_SEPARATOR.replace_all(&lowered, "_").into_owned();

    let normalized_length = name.chars().count();
    if normalized_length > PG_MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::NormalizationFailure {
            name: raw.to_string(),
            length: raw.chars().count(),
            normalized: name,
            normalized_length,
            max_length: PG_MAX_IDENTIFIER_LENGTH,
        });
    }

    let normalized = name != raw.to_lowercase();
    Ok(PolicyName { name, normalized })
}
